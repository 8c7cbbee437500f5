//! Frame notification streams.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures_util::future::FutureExt;
use futures_util::Stream;
use tokio::sync::mpsc;
use tokio_util::sync::{CancellationToken, WaitForCancellationFutureOwned};

use crate::engine::Commit;
use crate::frame::ResponseFrame;

/// Committed frames in commit order.
///
/// Ends when the instance reaches `done` or the subscription's signal is
/// cancelled.
pub struct FrameSubscription {
    first: Option<ResponseFrame>,
    rx: mpsc::UnboundedReceiver<Commit>,
    cancelled: Pin<Box<WaitForCancellationFutureOwned>>,
}

impl FrameSubscription {
    pub(crate) fn new(
        first: Option<ResponseFrame>,
        rx: mpsc::UnboundedReceiver<Commit>,
        signal: CancellationToken,
    ) -> Self {
        Self {
            first,
            rx,
            cancelled: Box::pin(signal.cancelled_owned()),
        }
    }

    /// Next frame, or `None` once the subscription ended.
    pub async fn recv(&mut self) -> Option<ResponseFrame> {
        futures_util::future::poll_fn(|cx| Pin::new(&mut *self).poll_next(cx)).await
    }
}

impl Stream for FrameSubscription {
    type Item = ResponseFrame;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<ResponseFrame>> {
        if let Some(frame) = self.first.take() {
            return Poll::Ready(Some(frame));
        }
        if self.cancelled.poll_unpin(cx).is_ready() {
            self.rx.close();
            return Poll::Ready(None);
        }
        self.rx
            .poll_recv(cx)
            .map(|commit| commit.map(|commit| commit.frame))
    }
}
