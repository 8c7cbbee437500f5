//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! construct / replace_with:
//!     abandon previous cycle → new CycleToken → fresh `now` gate
//!
//! commit (engine):
//!     first commit → resolve `live` gate, Waiting → Live
//!     every commit → resolve the cycle's `now` gate (first frame only)
//!
//! cycle completes (engine):
//!     winner + done → resolve `done` gate, Live → Done
//!     abandoned     → outcome `false`, state untouched
//! ```
//!
//! # Design Decisions
//! - Gates are single-resolution and shared, so repeated waits never
//!   register duplicate waiters
//! - Abandonment suppresses commits instead of stopping work

pub(crate) mod cycle;
pub mod gate;
pub mod ready_state;

pub use cycle::CycleOutcome;
pub use gate::Gate;
pub use ready_state::{NowFrame, ReadyGate, ReadyState, ReadyStateChange};
