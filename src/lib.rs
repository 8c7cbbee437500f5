//! Live responses: response objects whose body, status and headers can be
//! replaced in place, any number of times, locally or across a port.
//!
//! # Architecture Overview
//!
//! ```text
//!   replace_with(input)                       remote publisher
//!          │                                         │
//!          ▼                                         ▼ response.replace / mutate / done
//!   ┌─────────────┐   frames   ┌──────────────┐    ┌──────┐
//!   │  dispatch   │──────────▶│    engine    │◀───│ port │
//!   │ (Input tag) │            │ commit/finish│    └──────┘
//!   └─────────────┘            └──────┬───────┘        ▲
//!                                     │ commits        │ to_response publisher
//!                                     ▼                │
//!                         ┌───────────────────────┐    │
//!                         │ response (LiveResponse)│───┘
//!                         │ gates · subscriptions  │
//!                         └───────────────────────┘
//! ```
//!
//! - `frame`: immutable frames, bodies, headers, options
//! - `lifecycle`: ready state, gates, cycle tokens
//! - `engine`: the frame cycle engine
//! - `dispatch`: input classification and production strategies
//! - `response`: the public façade and its conversions
//! - `port`, `observe`: transports and mutation observation
//! - `config`, `observability`, `resilience`: ambient concerns

// Core
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod frame;
pub mod lifecycle;
pub mod response;

// Collaborators
pub mod observe;
pub mod port;

// Cross-cutting concerns
pub mod config;
pub mod observability;
pub mod resilience;

pub use config::LiveConfig;
pub use dispatch::Input;
pub use engine::EngineSettings;
pub use error::{LiveError, LiveResult, ProductionError};
pub use frame::{Body, HeaderMap, ResponseFrame, ResponseOptions, ResponseType, SharedHeaders};
pub use lifecycle::{ReadyGate, ReadyState};
pub use observe::{Mutation, ObservedValue};
pub use port::{Port, PortMessage, PortUrl};
pub use response::{FrameSubscription, LiveResponse, Replacement, ResponseLike, ToResponseOptions};
