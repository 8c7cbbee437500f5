//! Ready-state machine and its awaitable gates.
//!
//! # States
//! - Waiting: no frame has ever committed
//! - Live: at least one frame committed, replacements still accepted
//! - Done: terminal, replacements rejected
//!
//! # State Transitions
//! ```text
//! Waiting → Live: first commit (sync for immediate inputs)
//! Live → Live:    every later commit (an event, not a state change)
//! Live → Done:    winning cycle completes without `done: false`
//! Waiting → Done: winning cycle completes without ever committing
//! ```

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};
use std::task::{Context, Poll};

use serde::{Deserialize, Serialize};

use crate::error::LiveError;
use crate::frame::ResponseFrame;
use crate::lifecycle::gate::{Gate, GateWait};

/// Lifecycle position of a live response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadyState {
    Waiting,
    Live,
    Done,
}

impl fmt::Display for ReadyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ReadyState::Waiting => "waiting",
            ReadyState::Live => "live",
            ReadyState::Done => "done",
        })
    }
}

/// Gate names accepted by `ready_state_change`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReadyGate {
    /// First commit of the instance.
    Live,
    /// First frame reached by the cycle in flight at call time.
    Now,
    /// The instance retired.
    Done,
}

/// Per-instance gates. `live` and `done` resolve once for the lifetime of
/// the instance; `now` is replaced whenever a cycle starts.
pub(crate) struct ReadyStateRegistry {
    live: Gate<()>,
    done: Gate<()>,
    now: Mutex<Arc<Gate<ResponseFrame>>>,
}

impl ReadyStateRegistry {
    pub fn new() -> Self {
        Self {
            live: Gate::new(),
            done: Gate::new(),
            now: Mutex::new(Arc::new(Gate::new())),
        }
    }

    pub fn resolve_live(&self) -> bool {
        self.live.resolve(())
    }

    pub fn resolve_done(&self) -> bool {
        self.done.resolve(())
    }

    pub fn is_done(&self) -> bool {
        self.done.is_resolved()
    }

    /// Install a fresh `now` gate for a new cycle and return it.
    pub fn refresh_now(&self) -> Arc<Gate<ResponseFrame>> {
        let gate = Arc::new(Gate::new());
        *self.now.lock().unwrap_or_else(PoisonError::into_inner) = gate.clone();
        gate
    }

    pub fn now(&self) -> Arc<Gate<ResponseFrame>> {
        self.now
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn wait(&self, which: ReadyGate) -> ReadyStateChange {
        let inner = match which {
            ReadyGate::Live => GateKind::Unit(self.live.wait()),
            ReadyGate::Done => GateKind::Unit(self.done.wait()),
            ReadyGate::Now => GateKind::Frame(self.now().wait()),
        };
        ReadyStateChange { inner }
    }
}

enum GateKind {
    Unit(GateWait<()>),
    Frame(GateWait<ResponseFrame>),
}

/// Future returned by `ready_state_change`.
pub struct ReadyStateChange {
    inner: GateKind,
}

impl Future for ReadyStateChange {
    type Output = Result<(), LiveError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let ready = match &mut self.inner {
            GateKind::Unit(wait) => Pin::new(wait).poll(cx).map(|r| r.is_ok()),
            GateKind::Frame(wait) => Pin::new(wait).poll(cx).map(|r| r.is_ok()),
        };
        ready.map(|ok| if ok { Ok(()) } else { Err(LiveError::Detached) })
    }
}

/// Future returned by `now`: the first frame reached by a cycle, whether or
/// not that cycle wins.
pub struct NowFrame {
    wait: GateWait<ResponseFrame>,
}

impl NowFrame {
    pub(crate) fn new(gate: &Gate<ResponseFrame>) -> Self {
        Self { wait: gate.wait() }
    }
}

impl Future for NowFrame {
    type Output = Result<ResponseFrame, LiveError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.wait)
            .poll(cx)
            .map(|r| r.map_err(|_| LiveError::Detached))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::FrameFields;

    #[test]
    fn test_state_order() {
        assert!(ReadyState::Waiting < ReadyState::Live);
        assert!(ReadyState::Live < ReadyState::Done);
        assert_eq!(ReadyState::Done.to_string(), "done");
    }

    #[tokio::test]
    async fn test_refresh_now_detaches_previous_waiters() {
        let registry = ReadyStateRegistry::new();
        let first = registry.now();
        let waiter = NowFrame::new(&first);

        let second = registry.refresh_now();
        assert!(!Arc::ptr_eq(&first, &second));

        first.resolve(ResponseFrame::new(1, FrameFields::default()));
        assert_eq!(waiter.await.unwrap().seq(), 1);
    }

    #[tokio::test]
    async fn test_done_gate_resolves_once() {
        let registry = ReadyStateRegistry::new();
        let wait = registry.wait(ReadyGate::Done);
        assert!(registry.resolve_done());
        assert!(!registry.resolve_done());
        assert!(registry.is_done());
        wait.await.unwrap();
    }
}
