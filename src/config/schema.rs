//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for live
//! responses, their transports and the binary's ambient services.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

use crate::port::{DEFAULT_PORT_CAPACITY, DEFAULT_PORT_HEADER};

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct LiveConfig {
    /// Engine buffers.
    pub engine: EngineConfig,

    /// Port header and socket connection settings.
    pub transport: TransportConfig,

    /// Log output settings.
    pub logging: LoggingConfig,

    /// Prometheus exporter settings.
    pub metrics: MetricsConfig,
}

/// Engine configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Capacity of each port's inbound queue.
    pub port_capacity: usize,

    /// Capacity of the mutation channel of mirror values.
    pub mutation_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            port_capacity: DEFAULT_PORT_CAPACITY,
            mutation_capacity: crate::observe::DEFAULT_MUTATION_CAPACITY,
        }
    }
}

/// Transport configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Header advertising a live port (`<scheme>://<id>`).
    pub port_header: String,

    /// Socket connect timeout in milliseconds.
    pub connect_timeout_ms: u64,

    /// Socket connect attempts before giving up.
    pub connect_attempts: u32,

    /// Base delay for exponential backoff in milliseconds.
    pub backoff_base_ms: u64,

    /// Maximum delay for exponential backoff in milliseconds.
    pub backoff_max_ms: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            port_header: DEFAULT_PORT_HEADER.to_string(),
            connect_timeout_ms: 5_000,
            connect_attempts: 3,
            backoff_base_ms: 100,
            backoff_max_ms: 2_000,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error) or a full filter directive.
    pub level: String,

    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// Metrics configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Install the Prometheus exporter.
    pub enabled: bool,

    /// Exporter listen address.
    pub address: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            address: "127.0.0.1:9464".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config: LiveConfig = toml::from_str("").unwrap();
        assert_eq!(config.transport.port_header, "X-Message-Port");
        assert_eq!(config.engine.port_capacity, 256);
        assert!(!config.metrics.enabled);
    }

    #[test]
    fn test_partial_section() {
        let config: LiveConfig = toml::from_str(
            r#"
            [transport]
            connect_attempts = 5

            [logging]
            json = true
            "#,
        )
        .unwrap();
        assert_eq!(config.transport.connect_attempts, 5);
        assert_eq!(config.transport.connect_timeout_ms, 5_000);
        assert!(config.logging.json);
        assert_eq!(config.logging.level, "info");
    }
}
