//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define service metrics (requests, downstream calls, fallbacks, circuit state)
//! - Expose Prometheus-compatible metrics endpoint
//!
//! # Metrics
//! - `aloha_requests_total` (counter): inbound requests by method, status
//! - `aloha_request_duration_seconds` (histogram): inbound latency
//! - `aloha_downstream_calls_total` (counter): outbound calls by target, outcome
//! - `aloha_downstream_duration_seconds` (histogram): outbound latency by target
//! - `aloha_fallbacks_total` (counter): fallback responses by target, reason
//! - `aloha_circuit_state` (gauge): 0=closed, 1=half-open, 2=open
//! - `aloha_dispatch_in_flight` (gauge): downstream calls running on workers
//!
//! # Design Decisions
//! - Recording is a no-op until an exporter is installed
//! - Labels for target, outcome, status code

use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::Instant;

use crate::resilience::circuit_breaker::CircuitState;

/// Install the Prometheus exporter with an HTTP listener on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(method: &str, status: u16, start: Instant) {
    metrics::counter!(
        "aloha_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    metrics::histogram!("aloha_request_duration_seconds").record(start.elapsed().as_secs_f64());
}

pub fn record_downstream_call(target: &str, outcome: &'static str, start: Instant) {
    metrics::counter!(
        "aloha_downstream_calls_total",
        "target" => target.to_string(),
        "outcome" => outcome
    )
    .increment(1);
    metrics::histogram!("aloha_downstream_duration_seconds", "target" => target.to_string())
        .record(start.elapsed().as_secs_f64());
}

pub fn record_fallback(target: &str, reason: &'static str) {
    metrics::counter!(
        "aloha_fallbacks_total",
        "target" => target.to_string(),
        "reason" => reason
    )
    .increment(1);
}

pub fn record_circuit_state(target: &str, state: CircuitState) {
    let value = match state {
        CircuitState::Closed => 0.0,
        CircuitState::HalfOpen => 1.0,
        CircuitState::Open => 2.0,
    };
    metrics::gauge!("aloha_circuit_state", "target" => target.to_string()).set(value);
}

pub fn record_dispatch_in_flight(in_flight: usize) {
    metrics::gauge!("aloha_dispatch_in_flight").set(in_flight as f64);
}
