//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Socket port connect:
//!     → tokio timeout per attempt
//!     → On failure: Backoff::delay (doubling, capped, jittered)
//!     → next attempt until `connect_attempts` is exhausted
//! ```
//!
//! # Design Decisions
//! - Every connect has a deadline
//! - Jittered backoff avoids reconnect stampedes when a publisher restarts
//! - Production failures are never retried; only transport setup is

pub mod backoff;
