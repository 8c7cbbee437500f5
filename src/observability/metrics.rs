//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define engine metrics (commits, cycle outcomes, port traffic)
//! - Expose Prometheus-compatible metrics endpoint
//!
//! # Metrics
//! - `live_response_commits_total` (counter): frames committed
//! - `live_response_cycles_total` (counter): finished cycles by outcome
//! - `live_response_port_messages_total` (counter): by direction, type
//! - `live_response_active_projections` (gauge): running projections
//!
//! # Design Decisions
//! - Low-overhead metric updates (atomic operations)
//! - Labels are static strings, so cardinality stays fixed

use std::net::SocketAddr;

use metrics::{counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::lifecycle::CycleOutcome;

/// Install the Prometheus exporter. Must be called inside a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_commit() {
    counter!("live_response_commits_total").increment(1);
}

pub fn record_cycle(outcome: CycleOutcome) {
    counter!("live_response_cycles_total", "outcome" => outcome.as_str()).increment(1);
}

pub fn record_port_message(direction: &'static str, kind: &'static str) {
    counter!(
        "live_response_port_messages_total",
        "direction" => direction,
        "type" => kind
    )
    .increment(1);
}

pub fn record_projection_started() {
    gauge!("live_response_active_projections").increment(1.0);
}

pub fn record_projection_stopped() {
    gauge!("live_response_active_projections").decrement(1.0);
}
