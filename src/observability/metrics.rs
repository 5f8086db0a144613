//! Metrics collection and exposition.
//!
//! # Metrics
//! - `control_auth_decisions_total` (counter): authorization decisions by outcome
//! - `control_loop_transitions_total` (counter): published loop statuses by loop
//!
//! Without an installed recorder every call is a no-op.

use std::net::SocketAddr;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Serve Prometheus metrics on `addr`. Must run inside a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

pub fn record_auth_decision(granted: bool) {
    let outcome = if granted { "granted" } else { "denied" };
    metrics::counter!("control_auth_decisions_total", "outcome" => outcome).increment(1);
}

pub fn record_loop_transition(loop_name: &str, status: crate::lifecycle::LoopStatus) {
    metrics::counter!(
        "control_loop_transitions_total",
        "loop" => loop_name.to_string(),
        "status" => status.as_str()
    )
    .increment(1);
}
