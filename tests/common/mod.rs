//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use live_response::port::PortError;
use live_response::{Input, LiveResponse, Port, PortMessage, PortUrl, ProductionError, ResponseFrame};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

/// A port that records everything posted on it and lets the test inject
/// inbound messages.
pub struct RecordingPort {
    url: Option<PortUrl>,
    sent: Mutex<Vec<PortMessage>>,
    inbound: broadcast::Sender<PortMessage>,
    parked: Mutex<Option<broadcast::Receiver<PortMessage>>>,
    closed: CancellationToken,
}

impl RecordingPort {
    pub fn new() -> Arc<Self> {
        Self::build(None)
    }

    pub fn with_url(url: &str) -> Arc<Self> {
        Self::build(Some(url.parse().unwrap()))
    }

    fn build(url: Option<PortUrl>) -> Arc<Self> {
        let (inbound, parked) = broadcast::channel(64);
        Arc::new(Self {
            url,
            sent: Mutex::new(Vec::new()),
            inbound,
            parked: Mutex::new(Some(parked)),
            closed: CancellationToken::new(),
        })
    }

    /// Everything posted so far.
    pub fn sent(&self) -> Vec<PortMessage> {
        self.sent.lock().unwrap().clone()
    }

    /// Deliver a message as if the other side had posted it.
    pub fn deliver(&self, message: PortMessage) {
        let _ = self.inbound.send(message);
    }
}

impl Port for RecordingPort {
    fn url(&self) -> Option<&PortUrl> {
        self.url.as_ref()
    }

    fn post_message(&self, message: PortMessage) -> Result<(), PortError> {
        if self.closed.is_cancelled() {
            return Err(PortError::Closed);
        }
        self.sent.lock().unwrap().push(message);
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<PortMessage> {
        self.parked
            .lock()
            .unwrap()
            .take()
            .unwrap_or_else(|| self.inbound.subscribe())
    }

    fn close_signal(&self) -> CancellationToken {
        self.closed.clone()
    }
}

/// A pending input resolving to `value` after `ms` milliseconds.
pub fn delayed(value: &'static str, ms: u64) -> Input {
    Input::pending(async move {
        tokio::time::sleep(Duration::from_millis(ms)).await;
        Ok::<_, ProductionError>(value)
    })
}

/// A pending input that never resolves.
pub fn never() -> Input {
    Input::pending(std::future::pending::<Result<&'static str, ProductionError>>())
}

/// Let spawned production tasks run.
pub async fn settle() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}

/// Wait until `condition` holds, failing the test after two seconds.
pub async fn eventually(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(2), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

/// Text bodies of `frames`, in order.
pub fn texts(frames: &[ResponseFrame]) -> Vec<String> {
    frames
        .iter()
        .map(|frame| frame.body().as_text().unwrap_or_default().to_string())
        .collect()
}

/// Current text body of `live`.
pub fn text(live: &LiveResponse) -> String {
    live.body().as_text().unwrap_or_default().to_string()
}
