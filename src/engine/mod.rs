//! Frame cycle engine.
//!
//! # Responsibilities
//! - Own the current frame and the fields it exposes
//! - Start cycles, abandoning whichever cycle was in flight
//! - Apply commits from the winning cycle, suppress the rest
//! - Finish cycles and drive the ready state to `done`
//! - Notify subscribers of every applied commit, in registration order
//!
//! # Data Flow
//! ```text
//! start(options)
//!     → abandon previous cycle, refresh concurrency scope unless concurrent
//!     → fresh `now` gate → CycleToken
//!
//! commit(cycle, fields)
//!     → frame built, cycle's `now` gate resolved (abandoned or not)
//!     → abandoned? stop here
//!     → headers refilled, frame stored, Waiting → Live
//!     → subscribers notified with the frame and its concurrency scope
//!
//! finish(cycle, result)
//!     → abandoned: Ok(false), failure discarded
//!     → won: Ok(true), retire if `done`
//!     → failed: Err, retire with the failure
//! ```
//!
//! # Design Decisions
//! - One `std::sync::Mutex` guards all state and is never held across an
//!   await, so every transition is serialized
//! - Subscribers are notified under the lock, which totally orders commits
//! - Starting a cycle abandons the previous one immediately, not when the
//!   new one first commits

pub mod settings;
pub(crate) mod state;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::{LiveError, LiveResult, ProductionError};
use crate::frame::{CycleOptions, FrameFields, ResponseFrame, SharedHeaders};
use crate::lifecycle::cycle::{CycleOutcome, CycleToken};
use crate::lifecycle::ready_state::ReadyStateRegistry;
use crate::lifecycle::ReadyState;
use crate::observability::metrics;
use crate::port::Port;

pub use settings::EngineSettings;
pub(crate) use state::Commit;
use state::{EngineState, Subscriber};

pub(crate) struct Engine {
    state: Mutex<EngineState>,
    headers: SharedHeaders,
    gates: ReadyStateRegistry,
    settings: EngineSettings,
}

impl Engine {
    pub fn new(settings: EngineSettings) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(EngineState::new()),
            headers: SharedHeaders::new(),
            gates: ReadyStateRegistry::new(),
            settings,
        })
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn headers(&self) -> &SharedHeaders {
        &self.headers
    }

    pub fn gates(&self) -> &ReadyStateRegistry {
        &self.gates
    }

    fn lock(&self) -> MutexGuard<'_, EngineState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn read<T>(&self, f: impl FnOnce(&EngineState) -> T) -> T {
        f(&self.lock())
    }

    pub fn ready_state(&self) -> ReadyState {
        self.lock().ready_state
    }

    pub fn frame(&self) -> Option<ResponseFrame> {
        self.lock().frame.clone()
    }

    /// Start a cycle for a replacement. Fails once the instance is done.
    pub fn start(&self, options: CycleOptions) -> LiveResult<CycleToken> {
        let mut state = self.lock();
        if state.ready_state == ReadyState::Done {
            return Err(LiveError::AlreadyDone);
        }
        Ok(self.open_cycle(&mut state, options))
    }

    /// Start the first cycle of a fresh instance.
    pub fn begin(&self, options: CycleOptions) -> CycleToken {
        let mut state = self.lock();
        self.open_cycle(&mut state, options)
    }

    fn open_cycle(&self, state: &mut EngineState, options: CycleOptions) -> CycleToken {
        if let Some(previous) = state.cycle.take() {
            if !previous.is_abandoned() {
                previous.abandon();
                tracing::debug!(cycle = previous.id(), "Cycle superseded");
            }
        }
        if !options.concurrent {
            state.refresh_concurrency();
        }
        state.port = None;

        let id = state.next_cycle;
        state.next_cycle += 1;
        let cycle = CycleToken::new(id, self.gates.refresh_now(), options);
        state.cycle = Some(cycle.clone());
        tracing::debug!(
            cycle = id,
            done = cycle.options().done,
            concurrent = cycle.options().concurrent,
            "Cycle started"
        );
        cycle
    }

    /// Commit `fields` on behalf of `cycle`.
    ///
    /// The cycle's `now` gate sees the frame even when the cycle was
    /// abandoned; only a live cycle changes the instance. Returns the
    /// applied commit, if any.
    pub fn commit(&self, cycle: &CycleToken, fields: FrameFields) -> Option<Commit> {
        let mut state = self.lock();
        let frame = ResponseFrame::new(state.next_seq, fields);
        state.next_seq += 1;
        cycle.reach(&frame);

        if cycle.is_abandoned() || state.ready_state == ReadyState::Done {
            tracing::debug!(cycle = cycle.id(), seq = frame.seq(), "Commit suppressed");
            return None;
        }

        self.headers.refill(frame.headers());
        state.frame = Some(frame.clone());
        if state.ready_state == ReadyState::Waiting {
            state.ready_state = ReadyState::Live;
            self.gates.resolve_live();
        }

        let commit = Commit {
            frame,
            scope: state.concurrency.clone(),
        };
        state.subscribers.retain(|subscriber| subscriber.notify(&commit));

        metrics::record_commit();
        tracing::debug!(
            cycle = cycle.id(),
            seq = commit.frame.seq(),
            status = commit.frame.status(),
            "Frame committed"
        );
        Some(commit)
    }

    /// Record the end of `cycle`'s production and report whether it won.
    pub fn finish(&self, cycle: &CycleToken, result: Result<(), ProductionError>) -> LiveResult<bool> {
        let mut state = self.lock();

        if let Some(frame) = &state.frame {
            // A cycle that produced nothing answers `now` with what stands.
            cycle.reach(frame);
        }
        cycle.close_now();

        if cycle.is_abandoned() {
            if let Err(e) = result {
                tracing::debug!(cycle = cycle.id(), error = %e, "Failure of abandoned cycle discarded");
            }
            metrics::record_cycle(CycleOutcome::Abandoned);
            tracing::debug!(cycle = cycle.id(), "Cycle abandoned");
            return Ok(false);
        }

        match result {
            Ok(()) => {
                if cycle.options().done {
                    self.retire(&mut state, None);
                }
                metrics::record_cycle(CycleOutcome::Won);
                tracing::debug!(cycle = cycle.id(), ready_state = %state.ready_state, "Cycle won");
                Ok(true)
            }
            Err(e) => {
                tracing::warn!(cycle = cycle.id(), error = %e, "Cycle failed");
                self.retire(&mut state, Some(e.clone()));
                metrics::record_cycle(CycleOutcome::Failed);
                Err(e.into())
            }
        }
    }

    fn retire(&self, state: &mut EngineState, failure: Option<ProductionError>) {
        if state.ready_state == ReadyState::Done {
            return;
        }
        state.ready_state = ReadyState::Done;
        state.failure = failure;
        // Dropping the senders ends every subscription stream.
        state.subscribers.clear();
        self.gates.resolve_live();
        self.gates.resolve_done();
    }

    /// Record the port a cycle bound to, unless the cycle lost already.
    pub fn bind_port(&self, cycle: &CycleToken, port: Arc<dyn Port>) {
        let mut state = self.lock();
        if !cycle.is_abandoned() {
            state.port = Some(port);
        }
    }

    pub fn concurrency_scope(&self) -> CancellationToken {
        self.lock().concurrency.clone()
    }

    /// The current commit plus a receiver for every later one. The receiver
    /// ends when the instance reaches `done` or `signal` is cancelled.
    pub fn subscribe(
        &self,
        signal: CancellationToken,
    ) -> (Option<Commit>, mpsc::UnboundedReceiver<Commit>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut state = self.lock();
        let current = state.current_commit();
        if state.ready_state != ReadyState::Done && !signal.is_cancelled() {
            state.subscribers.push(Subscriber { tx, signal });
        }
        (current, rx)
    }

    /// Abandon the cycle in flight. With `dispose`, concurrent projections
    /// are torn down as well.
    pub fn disconnect(&self, dispose: bool) {
        let mut state = self.lock();
        if let Some(cycle) = &state.cycle {
            if !cycle.is_abandoned() {
                cycle.abandon();
                tracing::debug!(cycle = cycle.id(), "Cycle disconnected");
            }
        }
        if dispose {
            state.refresh_concurrency();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{Body, ResponseOptions};

    fn options() -> CycleOptions {
        ResponseOptions::new().normalize().unwrap()
    }

    fn fields(text: &str) -> FrameFields {
        options().fields_for(Body::from(text))
    }

    #[tokio::test]
    async fn test_commit_goes_live() {
        let engine = Engine::new(EngineSettings::default());
        let cycle = engine.begin(options());
        assert_eq!(engine.ready_state(), ReadyState::Waiting);

        let commit = engine.commit(&cycle, fields("a")).unwrap();
        assert_eq!(commit.frame.seq(), 1);
        assert_eq!(engine.ready_state(), ReadyState::Live);
        assert_eq!(engine.frame().unwrap().body().as_text(), Some("a"));
    }

    #[tokio::test]
    async fn test_superseded_cycle_cannot_commit() {
        let engine = Engine::new(EngineSettings::default());
        let first = engine.begin(options());
        let now = engine.gates().now();
        let second = engine.start(options()).unwrap();
        assert!(first.is_abandoned());

        assert!(engine.commit(&first, fields("late")).is_none());
        assert!(engine.frame().is_none());
        assert_eq!(now.wait().await.unwrap().body().as_text(), Some("late"));

        assert!(engine.commit(&second, fields("b")).is_some());
        assert_eq!(engine.finish(&first, Ok(())), Ok(false));
        assert_eq!(engine.finish(&second, Ok(())), Ok(true));
        assert_eq!(engine.ready_state(), ReadyState::Done);
    }

    #[tokio::test]
    async fn test_failure_retires_instance() {
        let engine = Engine::new(EngineSettings::default());
        let cycle = engine.begin(options());
        let err = ProductionError::rejected("nope");

        assert_eq!(
            engine.finish(&cycle, Err(err.clone())),
            Err(LiveError::Production(err.clone()))
        );
        assert_eq!(engine.ready_state(), ReadyState::Done);
        assert_eq!(engine.read(|state| state.failure.clone()), Some(err));
        assert!(matches!(engine.start(options()), Err(LiveError::AlreadyDone)));
    }

    #[tokio::test]
    async fn test_abandoned_failure_is_discarded() {
        let engine = Engine::new(EngineSettings::default());
        let cycle = engine.begin(options());
        engine.disconnect(false);
        assert_eq!(engine.finish(&cycle, Err(ProductionError::sequence("x"))), Ok(false));
        assert_eq!(engine.ready_state(), ReadyState::Waiting);
    }

    #[tokio::test]
    async fn test_headers_refilled_in_place() {
        use http::HeaderValue;

        let engine = Engine::new(EngineSettings::default());
        let held = engine.headers().clone();
        let cycle = engine.begin(options());

        let mut first = fields("a");
        first.headers.append("x-step", HeaderValue::from_static("1"));
        engine.commit(&cycle, first);
        assert_eq!(held.get("x-step").as_deref(), Some("1"));

        let mut second = fields("b");
        second.headers.append("x-other", HeaderValue::from_static("2"));
        engine.commit(&cycle, second);
        assert!(held.ptr_eq(engine.headers()));
        assert!(!held.contains("X-Step"));
        assert_eq!(held.get("X-Other").as_deref(), Some("2"));
    }

    #[tokio::test]
    async fn test_subscribers_end_at_done() {
        let engine = Engine::new(EngineSettings::default());
        let cycle = engine.begin(options());
        let (current, mut rx) = engine.subscribe(CancellationToken::new());
        assert!(current.is_none());

        engine.commit(&cycle, fields("a"));
        engine.finish(&cycle, Ok(())).unwrap();

        assert_eq!(rx.recv().await.unwrap().frame.body().as_text(), Some("a"));
        assert!(rx.recv().await.is_none());

        let (current, mut late) = engine.subscribe(CancellationToken::new());
        assert_eq!(current.unwrap().frame.seq(), 1);
        assert!(late.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_concurrency_scope_refresh() {
        let engine = Engine::new(EngineSettings::default());
        let _first = engine.begin(options());
        let scope = engine.concurrency_scope();

        let concurrent = ResponseOptions::new().concurrent(true).normalize().unwrap();
        engine.start(concurrent).unwrap();
        assert!(!scope.is_cancelled());

        engine.start(options()).unwrap();
        assert!(scope.is_cancelled());

        let scope = engine.concurrency_scope();
        engine.disconnect(true);
        assert!(scope.is_cancelled());
    }
}
