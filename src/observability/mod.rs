//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! engine, dispatcher, ports produce:
//!     → tracing events (commits, abandonment, bindings, projections)
//!     → metrics.rs (counters, gauges)
//!
//! Consumers:
//!     → logging.rs subscriber (stdout, human or JSON)
//!     → Prometheus exporter (installed by the binary)
//! ```
//!
//! # Design Decisions
//! - Library code only emits; the binary decides where output goes
//! - Metrics are cheap (atomic increments) and safe to record with no
//!   recorder installed

pub mod logging;
pub mod metrics;
