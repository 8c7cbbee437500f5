//! Production cycles and their abandonment scopes.
//!
//! # Scopes
//! - Disconnect scope: one token per cycle, cancelled the instant a newer
//!   cycle starts or `disconnect` is called
//! - Concurrency scope: shared by every projection started since the last
//!   non-concurrent replacement; cancelled only by a non-concurrent
//!   replacement or `disconnect(dispose = true)`

use std::sync::Arc;

use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};

use crate::frame::{CycleOptions, ResponseFrame};
use crate::lifecycle::gate::Gate;

/// Handle on one production run.
///
/// Cloned into every task working for the cycle. Abandonment only
/// suppresses commits; it never stops the work itself.
#[derive(Clone)]
pub(crate) struct CycleToken {
    id: u64,
    abandon: CancellationToken,
    now: Arc<Gate<ResponseFrame>>,
    options: Arc<CycleOptions>,
}

impl CycleToken {
    pub fn new(id: u64, now: Arc<Gate<ResponseFrame>>, options: CycleOptions) -> Self {
        Self {
            id,
            abandon: CancellationToken::new(),
            now,
            options: Arc::new(options),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn options(&self) -> &CycleOptions {
        &self.options
    }

    pub fn is_abandoned(&self) -> bool {
        self.abandon.is_cancelled()
    }

    pub fn abandon(&self) {
        self.abandon.cancel();
    }

    pub fn abandoned(&self) -> WaitForCancellationFuture<'_> {
        self.abandon.cancelled()
    }

    /// Record the first frame this cycle reached. Later frames are ignored.
    pub fn reach(&self, frame: &ResponseFrame) {
        self.now.resolve(frame.clone());
    }

    /// Production is over. A `now` gate nothing reached fails its waiters.
    pub fn close_now(&self) {
        if self.now.close() {
            tracing::debug!(cycle = self.id, "Cycle reached no frame");
        }
    }
}

/// Outcome of a finished cycle, as reported to the replace caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    Won,
    Abandoned,
    Failed,
}

impl CycleOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            CycleOutcome::Won => "won",
            CycleOutcome::Abandoned => "abandoned",
            CycleOutcome::Failed => "failed",
        }
    }
}
