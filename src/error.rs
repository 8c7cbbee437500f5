//! Error definitions shared across the engine.
//!
//! # Taxonomy
//! - Protocol violations (`AlreadyDone`, `InvalidStatus`): returned
//!   synchronously from construct/replace, never retried
//! - Production failures (`ProductionError`): a pending input rejected or a
//!   sequence raised; fail the cycle and retire the instance
//! - Transport failures: a bound port closing is an implicit `done`, so
//!   `PortError` only surfaces from explicit port operations

use thiserror::Error;

/// Errors returned by the live response surface.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LiveError {
    /// The instance already reached `done` and cannot be replaced.
    #[error("live response is already done")]
    AlreadyDone,

    /// A status outside `200..=599` was supplied.
    #[error("status {0} is outside the range 200..=599")]
    InvalidStatus(u16),

    /// A header name or value supplied in the options is not a valid
    /// HTTP token.
    #[error("invalid header {0:?}")]
    InvalidHeader(String),

    /// The cycle failed while producing frames.
    #[error(transparent)]
    Production(#[from] ProductionError),

    /// The awaited signal can no longer resolve: the engine went away, or
    /// the cycle finished without reaching a frame.
    #[error("signal can no longer resolve")]
    Detached,
}

/// Failure of a production cycle.
///
/// Cloneable because the same failure is handed to the replace caller and
/// stored on the instance as the reason it retired.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProductionError {
    /// A pending input resolved to an error.
    #[error("pending input rejected: {0}")]
    Rejected(String),

    /// A sequence-producing input raised an error between pulls.
    #[error("sequence failed: {0}")]
    Sequence(String),

    /// A flattened upstream live response retired with a failure.
    #[error("upstream failed: {0}")]
    Upstream(String),

    /// A transform closure failed.
    #[error("transform failed: {0}")]
    Transform(String),

    /// The advertised port could not be bound.
    #[error("port binding failed: {0}")]
    Binding(String),
}

impl ProductionError {
    /// Convenience constructor for rejected pending values.
    pub fn rejected(reason: impl std::fmt::Display) -> Self {
        Self::Rejected(reason.to_string())
    }

    /// Convenience constructor for failing sequences.
    pub fn sequence(reason: impl std::fmt::Display) -> Self {
        Self::Sequence(reason.to_string())
    }
}

/// Result type for live response operations.
pub type LiveResult<T> = Result<T, LiveError>;
