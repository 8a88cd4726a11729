//! Metrics collection and Prometheus exporter for vless-rs.
//!
//! Covers session counts per transport, handshake failures, dial attempts
//! and bytes relayed in each direction.

use std::net::SocketAddr;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Initialize Prometheus metrics exporter.
///
/// Starts an HTTP server on the given address to expose metrics.
/// Returns an error message if binding fails.
pub fn init_prometheus(listen: &str) -> Result<(), String> {
    let addr: SocketAddr = listen
        .parse()
        .map_err(|e| format!("invalid metrics listen address: {}", e))?;

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| format!("failed to install prometheus exporter: {}", e))?;

    Ok(())
}

// ============================================================================
// Metric Names
// ============================================================================

/// Total number of sessions accepted, by transport.
pub const SESSIONS_TOTAL: &str = "vless_sessions_total";
/// Number of currently active sessions.
pub const SESSIONS_ACTIVE: &str = "vless_sessions_active";
/// Session duration histogram (seconds).
pub const SESSION_DURATION_SECONDS: &str = "vless_session_duration_seconds";
/// Total number of failed handshakes, by reason.
pub const HANDSHAKE_FAILURES_TOTAL: &str = "vless_handshake_failures_total";
/// Total number of outbound dial attempts, by kind and result.
pub const DIAL_ATTEMPTS_TOTAL: &str = "vless_dial_attempts_total";
/// Bytes relayed from clients to remotes.
pub const UPLOAD_BYTES_TOTAL: &str = "vless_upload_bytes_total";
/// Bytes relayed from remotes to clients.
pub const DOWNLOAD_BYTES_TOTAL: &str = "vless_download_bytes_total";
/// Bytes discarded while draining rejected clients.
pub const DRAINED_BYTES_TOTAL: &str = "vless_drained_bytes_total";
/// Total number of errors by type.
pub const ERRORS_TOTAL: &str = "vless_errors_total";
/// Total number of DoH requests forwarded, by upstream status class.
pub const DOH_REQUESTS_TOTAL: &str = "vless_doh_requests_total";

// ============================================================================
// Metric Recording Functions
// ============================================================================

/// Record a new session accepted on `transport` ("ws" or "xhttp").
#[inline]
pub fn record_session_accepted(transport: &'static str) {
    counter!(SESSIONS_TOTAL, "transport" => transport).increment(1);
    gauge!(SESSIONS_ACTIVE).increment(1.0);
}

/// Record a session closed.
#[inline]
pub fn record_session_closed(duration_secs: f64) {
    gauge!(SESSIONS_ACTIVE).decrement(1.0);
    histogram!(SESSION_DURATION_SECONDS).record(duration_secs);
}

/// Record a failed handshake with a stable reason label.
#[inline]
pub fn record_handshake_failure(reason: &'static str) {
    counter!(HANDSHAKE_FAILURES_TOTAL, "reason" => reason).increment(1);
}

/// Record one dial attempt (kind: "direct" or "fallback").
#[inline]
pub fn record_dial_attempt(kind: &'static str, success: bool) {
    let result = if success { "success" } else { "failure" };
    counter!(DIAL_ATTEMPTS_TOTAL, "kind" => kind, "result" => result).increment(1);
}

/// Record bytes relayed from client to remote.
#[inline]
pub fn record_upload_bytes(bytes: u64) {
    counter!(UPLOAD_BYTES_TOTAL).increment(bytes);
}

/// Record bytes relayed from remote to client.
#[inline]
pub fn record_download_bytes(bytes: u64) {
    counter!(DOWNLOAD_BYTES_TOTAL).increment(bytes);
}

/// Record bytes discarded from a rejected client.
#[inline]
pub fn record_drained_bytes(bytes: u64) {
    counter!(DRAINED_BYTES_TOTAL).increment(bytes);
}

/// Record an error by type.
#[inline]
pub fn record_error(error_type: &'static str) {
    counter!(ERRORS_TOTAL, "type" => error_type).increment(1);
}

/// Record a forwarded DoH request.
#[inline]
pub fn record_doh_request(status: u16) {
    let class = match status {
        200..=299 => "2xx",
        400..=499 => "4xx",
        500..=599 => "5xx",
        _ => "other",
    };
    counter!(DOH_REQUESTS_TOTAL, "status" => class).increment(1);
}
