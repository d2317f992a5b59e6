//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_sessions_total` (counter, port): sessions accepted
//! - `gateway_sessions_active` (gauge, port): live sessions per listener
//! - `gateway_backend_clients` (gauge, backend): clients assigned per backend
//! - `gateway_packets_framed_total` (counter): packets split from client streams
//! - `gateway_malformed_packets_total` (counter): unresolvable packet headers
//! - `gateway_no_backend_total` (counter, port): accepts rejected for an empty pool
//! - `gateway_reputation_lookups_total` (counter, result): cached / fetched / error

use std::net::SocketAddr;

use metrics::{counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;

pub const SESSIONS_TOTAL: &str = "gateway_sessions_total";
pub const SESSIONS_ACTIVE: &str = "gateway_sessions_active";
pub const BACKEND_CLIENTS: &str = "gateway_backend_clients";
pub const PACKETS_FRAMED_TOTAL: &str = "gateway_packets_framed_total";
pub const MALFORMED_PACKETS_TOTAL: &str = "gateway_malformed_packets_total";
pub const NO_BACKEND_TOTAL: &str = "gateway_no_backend_total";
pub const REPUTATION_LOOKUPS_TOTAL: &str = "gateway_reputation_lookups_total";

/// Install the Prometheus recorder and its HTTP listener on `addr`.
///
/// Must run inside a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_session_opened(port: u16) {
    counter!(SESSIONS_TOTAL, "port" => port.to_string()).increment(1);
}

pub fn record_active_sessions(port: u16, active: usize) {
    gauge!(SESSIONS_ACTIVE, "port" => port.to_string()).set(active as f64);
}

pub fn record_backend_clients(backend: &str, clients: usize) {
    gauge!(BACKEND_CLIENTS, "backend" => backend.to_string()).set(clients as f64);
}

pub fn record_packets_framed(count: usize) {
    if count > 0 {
        counter!(PACKETS_FRAMED_TOTAL).increment(count as u64);
    }
}

pub fn record_malformed_packet() {
    counter!(MALFORMED_PACKETS_TOTAL).increment(1);
}

pub fn record_no_backend(port: u16) {
    counter!(NO_BACKEND_TOTAL, "port" => port.to_string()).increment(1);
}

pub fn record_reputation_lookup(result: &'static str) {
    counter!(REPUTATION_LOOKUPS_TOTAL, "result" => result).increment(1);
}
