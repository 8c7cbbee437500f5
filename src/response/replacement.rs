//! Completion future of a replacement.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::sync::oneshot;

use crate::error::{LiveError, LiveResult};

/// Resolves once the replacement's cycle finishes.
///
/// `Ok(true)`: the cycle won and its frames stand. `Ok(false)`: a newer
/// replacement or a disconnect abandoned it. `Err`: production failed and
/// the instance retired.
#[must_use = "a replacement reports whether it won only when awaited"]
pub struct Replacement {
    rx: oneshot::Receiver<LiveResult<bool>>,
}

impl Replacement {
    pub(crate) fn new(rx: oneshot::Receiver<LiveResult<bool>>) -> Self {
        Self { rx }
    }
}

impl Future for Replacement {
    type Output = LiveResult<bool>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|received| received.unwrap_or(Err(LiveError::Detached)))
    }
}
