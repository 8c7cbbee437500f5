//! Mutable engine state, guarded by the engine lock.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::ProductionError;
use crate::frame::ResponseFrame;
use crate::lifecycle::cycle::CycleToken;
use crate::lifecycle::ReadyState;
use crate::port::Port;

/// A committed frame as seen by notification listeners.
#[derive(Clone)]
pub(crate) struct Commit {
    pub frame: ResponseFrame,
    /// Concurrency scope in effect when the frame committed. Projections
    /// of the frame's body stop when it is cancelled.
    pub scope: CancellationToken,
}

/// One registered listener. Dropped once its signal is cancelled or its
/// receiver goes away.
pub(crate) struct Subscriber {
    pub tx: mpsc::UnboundedSender<Commit>,
    pub signal: CancellationToken,
}

impl Subscriber {
    /// Deliver `commit`. Returns false if the subscriber should be dropped.
    pub fn notify(&self, commit: &Commit) -> bool {
        !self.signal.is_cancelled() && self.tx.send(commit.clone()).is_ok()
    }
}

pub(crate) struct EngineState {
    pub frame: Option<ResponseFrame>,
    pub ready_state: ReadyState,
    pub failure: Option<ProductionError>,
    pub cycle: Option<CycleToken>,
    pub next_cycle: u64,
    pub next_seq: u64,
    pub concurrency: CancellationToken,
    pub subscribers: Vec<Subscriber>,
    pub port: Option<Arc<dyn Port>>,
}

impl EngineState {
    pub fn new() -> Self {
        Self {
            frame: None,
            ready_state: ReadyState::Waiting,
            failure: None,
            cycle: None,
            next_cycle: 1,
            next_seq: 1,
            concurrency: CancellationToken::new(),
            subscribers: Vec::new(),
            port: None,
        }
    }

    /// Cancel every projection scoped to the current concurrency token and
    /// start a fresh scope.
    pub fn refresh_concurrency(&mut self) {
        self.concurrency.cancel();
        self.concurrency = CancellationToken::new();
    }

    pub fn current_commit(&self) -> Option<Commit> {
        self.frame.as_ref().map(|frame| Commit {
            frame: frame.clone(),
            scope: self.concurrency.clone(),
        })
    }
}
