//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (capacities > 0, backoff bounds ordered)
//! - Check the port header is a usable header name
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: LiveConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::fmt;

use crate::config::schema::LiveConfig;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate a parsed configuration.
pub fn validate_config(config: &LiveConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.engine.port_capacity == 0 {
        errors.push(ValidationError::new("engine.port_capacity", "must be greater than 0"));
    }
    if config.engine.mutation_capacity == 0 {
        errors.push(ValidationError::new(
            "engine.mutation_capacity",
            "must be greater than 0",
        ));
    }

    let header = &config.transport.port_header;
    if http::HeaderName::from_bytes(header.as_bytes()).is_err() {
        errors.push(ValidationError::new(
            "transport.port_header",
            format!("{header:?} is not a valid header name"),
        ));
    }
    if config.transport.connect_timeout_ms == 0 {
        errors.push(ValidationError::new(
            "transport.connect_timeout_ms",
            "must be greater than 0",
        ));
    }
    if config.transport.connect_attempts == 0 {
        errors.push(ValidationError::new(
            "transport.connect_attempts",
            "must be at least 1",
        ));
    }
    if config.transport.backoff_base_ms > config.transport.backoff_max_ms {
        errors.push(ValidationError::new(
            "transport.backoff_base_ms",
            "must not exceed transport.backoff_max_ms",
        ));
    }

    if config.metrics.enabled && config.metrics.address.parse::<std::net::SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "metrics.address",
            format!("{:?} is not a socket address", config.metrics.address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
