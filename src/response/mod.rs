//! The live response façade.
//!
//! # Responsibilities
//! - Expose the fields of the last committed frame, response-style
//! - Accept replacements and report whether they won
//! - Surface the ready-state gates and frame notifications
//! - Convert to a plain response-like value, optionally publishing later
//!   replacements over a port
//!
//! # Design Decisions
//! - Handles are cheap clones sharing one engine
//! - Header reads go through one `SharedHeaders` for the life of the
//!   instance, refilled on every commit
//! - Protocol violations are returned from the call itself, never through
//!   the completion future

mod like;
mod publish;
mod replacement;
mod subscription;

use std::fmt;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::dispatch::{self, Input};
use crate::engine::{Engine, EngineSettings};
use crate::error::{LiveError, LiveResult, ProductionError};
use crate::frame::{
    headers, Body, CycleOptions, FrameFields, ResponseFrame, ResponseOptions, ResponseType,
    SharedHeaders,
};
use crate::lifecycle::{NowFrame, ReadyGate, ReadyState, ReadyStateChange};
use crate::port::Port;

pub use like::ResponseLike;
pub use publish::ToResponseOptions;
pub use replacement::Replacement;
pub use subscription::FrameSubscription;

/// A response whose body, status and headers can be replaced in place.
///
/// Must be created inside a Tokio runtime. Immediate inputs commit before
/// the constructor returns; the instance reaches `done` once the winning
/// cycle finishes, unless it was started with `done: false`.
#[derive(Clone)]
pub struct LiveResponse {
    engine: Arc<Engine>,
}

impl LiveResponse {
    pub fn new(input: impl Into<Input>) -> Self {
        Self::start(input.into(), CycleOptions::default(), EngineSettings::default())
    }

    pub fn with_options(input: impl Into<Input>, options: ResponseOptions) -> LiveResult<Self> {
        Self::with_settings(input, options, EngineSettings::default())
    }

    pub fn with_settings(
        input: impl Into<Input>,
        options: ResponseOptions,
        settings: EngineSettings,
    ) -> LiveResult<Self> {
        let options = options.normalize()?;
        Ok(Self::start(input.into(), options, settings))
    }

    fn start(input: Input, options: CycleOptions, settings: EngineSettings) -> Self {
        let engine = Engine::new(settings);
        let cycle = engine.begin(options);
        // The first cycle's outcome shows through ready_state and error.
        let _ = dispatch::run(engine.clone(), cycle, input);
        Self { engine }
    }

    pub(crate) fn engine(&self) -> &Arc<Engine> {
        &self.engine
    }

    fn with_fields<T>(&self, f: impl FnOnce(&FrameFields) -> T) -> T {
        self.engine.read(|state| match &state.frame {
            Some(frame) => f(frame.fields()),
            None => f(&FrameFields::default()),
        })
    }

    pub fn body(&self) -> Body {
        self.with_fields(|fields| fields.body.clone())
    }

    pub fn status(&self) -> u16 {
        self.with_fields(|fields| fields.status)
    }

    pub fn status_text(&self) -> String {
        self.with_fields(|fields| fields.status_text.clone())
    }

    /// The instance's header map. The same map is refilled on every commit,
    /// so a held handle always reads the current headers.
    pub fn headers(&self) -> SharedHeaders {
        self.engine.headers().clone()
    }

    pub fn response_type(&self) -> ResponseType {
        self.with_fields(|fields| fields.response_type)
    }

    pub fn redirected(&self) -> bool {
        self.with_fields(|fields| fields.redirected)
    }

    pub fn url(&self) -> String {
        self.with_fields(|fields| fields.url.clone())
    }

    pub fn concurrent(&self) -> bool {
        self.with_fields(|fields| fields.concurrent)
    }

    pub fn ok(&self) -> bool {
        self.with_fields(FrameFields::ok)
    }

    /// True once any frame has committed.
    pub fn body_used(&self) -> bool {
        self.engine.read(|state| state.frame.is_some())
    }

    /// Port bound by the current cycle, if any.
    pub fn port(&self) -> Option<Arc<dyn Port>> {
        self.engine.read(|state| state.port.clone())
    }

    pub fn ready_state(&self) -> ReadyState {
        self.engine.ready_state()
    }

    /// Last committed frame.
    pub fn frame(&self) -> Option<ResponseFrame> {
        self.engine.frame()
    }

    /// Failure that retired the instance, if any.
    pub fn error(&self) -> Option<ProductionError> {
        self.engine.read(|state| state.failure.clone())
    }

    /// Start a new cycle producing `input`.
    ///
    /// The cycle in flight, if any, is abandoned immediately. Fails with
    /// `AlreadyDone` once the instance retired, with `InvalidStatus` for a
    /// status outside `200..=599` and with `InvalidHeader` for a header that
    /// is not a valid HTTP token.
    pub fn replace_with(
        &self,
        input: impl Into<Input>,
        options: ResponseOptions,
    ) -> LiveResult<Replacement> {
        if self.engine.ready_state() == ReadyState::Done {
            return Err(LiveError::AlreadyDone);
        }
        let options = options.normalize()?;
        let cycle = self.engine.start(options)?;
        Ok(dispatch::run(self.engine.clone(), cycle, input.into()))
    }

    /// First frame reached by the cycle in flight right now, whether or not
    /// that cycle ends up winning.
    pub fn now(&self) -> NowFrame {
        NowFrame::new(&self.engine.gates().now())
    }

    pub fn ready_state_change(&self, which: ReadyGate) -> ReadyStateChange {
        self.engine.gates().wait(which)
    }

    /// Abandon the cycle in flight. With `dispose`, concurrent mutation
    /// projections stop too. The ready state is left as is.
    pub fn disconnect(&self, dispose: bool) {
        self.engine.disconnect(dispose);
    }

    /// Frames committed from now on, until `done` or until `signal` is
    /// cancelled.
    pub fn subscribe(&self, signal: CancellationToken) -> FrameSubscription {
        let (_, rx) = self.engine.subscribe(signal.clone());
        FrameSubscription::new(None, rx, signal)
    }

    /// The current frame followed by every later one, ending at `done`.
    pub fn to_stream(&self) -> FrameSubscription {
        let signal = CancellationToken::new();
        let (current, rx) = self.engine.subscribe(signal.clone());
        FrameSubscription::new(current.map(|commit| commit.frame), rx, signal)
    }

    /// Encode the current state as a plain response.
    ///
    /// With a port, later replacements are forwarded over it and observed
    /// bodies are projected until `signal` is cancelled. An addressable
    /// port is advertised in the port header of the returned value.
    pub fn to_response(&self, options: ToResponseOptions) -> ResponseLike {
        let signal = options.signal.unwrap_or_default();
        let Some(port) = options.port else {
            return self
                .frame()
                .map(|frame| ResponseLike::new(frame.fields().clone()))
                .unwrap_or_default();
        };

        let (current, commits) = self.engine.subscribe(signal.clone());
        let response = match &current {
            Some(commit) => {
                let mut fields = commit.frame.fields().clone();
                if let Some(url) = port.url() {
                    let name = self.engine.settings().port_header.as_str();
                    if !headers::insert(&mut fields.headers, name, &url.to_string()) {
                        tracing::warn!(header = name, url = %url, "Port URL is not a valid header value");
                    }
                }
                let response = ResponseLike::new(fields);
                match publish::projection_of(&commit.frame) {
                    Some(projection) => response.with_projection(projection),
                    None => response,
                }
            }
            None => ResponseLike::default(),
        };

        if let Some(commit) = &current {
            publish::project(&port, commit, &signal);
        }
        publish::spawn_publisher(port, commits, signal);
        response
    }
}

impl fmt::Debug for LiveResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LiveResponse")
            .field("ready_state", &self.ready_state())
            .field("frame", &self.frame())
            .finish()
    }
}
