//! Metrics collection and exposition.
//!
//! # Metrics
//! - `bridge_sessions_total` (counter): finished sessions by outcome
//! - `bridge_admission_rejected_total` (counter): connections dropped at the limit
//! - `bridge_active_sessions` (gauge): sessions currently running
//! - `bridge_session_duration_seconds` (histogram): accept to close
//! - `bridge_response_bytes_total` (counter): bytes written to clients
//!
//! Without an installed recorder every call here is a no-op.

use std::net::SocketAddr;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

use crate::session::SessionReport;

/// Serve Prometheus metrics on `addr`. Must run inside a Tokio runtime.
pub fn install_exporter(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

pub fn record_session(report: &SessionReport) {
    metrics::counter!("bridge_sessions_total", "outcome" => report.label()).increment(1);
    metrics::histogram!("bridge_session_duration_seconds").record(report.duration.as_secs_f64());
    metrics::counter!("bridge_response_bytes_total").increment(report.bytes_to_client);
}

pub fn record_admission_rejected() {
    metrics::counter!("bridge_admission_rejected_total").increment(1);
}

pub fn set_active_sessions(count: usize) {
    metrics::gauge!("bridge_active_sessions").set(count as f64);
}
