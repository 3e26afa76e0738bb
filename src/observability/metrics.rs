//! Metrics collection and exposition.
//!
//! # Metrics
//! - `addhandler_builds_total` (counter): builds by outcome
//! - `addhandler_build_duration_seconds` (histogram): compiler wall time
//! - `addhandler_loads_total` (counter): artifact loads by outcome
//! - `addhandler_handlers_registered` (gauge): live routes
//! - `addhandler_dispatch_total` (counter): dispatched requests by status
//! - `addhandler_dispatch_duration_seconds` (histogram): handler latency
//!
//! # Design Decisions
//! - Outcome labels are the short error kinds, never error text

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter listening on `addr`.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_build(outcome: &'static str, started: Instant) {
    counter!("addhandler_builds_total", "outcome" => outcome).increment(1);
    histogram!("addhandler_build_duration_seconds", "outcome" => outcome)
        .record(started.elapsed().as_secs_f64());
}

pub fn record_load(outcome: &'static str) {
    counter!("addhandler_loads_total", "outcome" => outcome).increment(1);
}

pub fn set_handlers_registered(count: usize) {
    gauge!("addhandler_handlers_registered").set(count as f64);
}

pub fn record_dispatch(status: u16, started: Instant) {
    counter!("addhandler_dispatch_total", "status" => status.to_string()).increment(1);
    histogram!("addhandler_dispatch_duration_seconds").record(started.elapsed().as_secs_f64());
}
