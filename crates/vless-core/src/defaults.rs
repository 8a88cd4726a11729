//! Default configuration values.
//!
//! Centralized default constants for use across all crates.

// ============================================================================
// Listener Defaults
// ============================================================================

/// Default HTTP listen address.
pub const DEFAULT_LISTEN: &str = "0.0.0.0:8080";
/// Default TCP listener backlog.
pub const DEFAULT_CONNECTION_BACKLOG: u32 = 1024;
/// Default graceful shutdown timeout in seconds.
pub const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 30;

// ============================================================================
// Dial Defaults
// ============================================================================

/// Budget for a single outbound connection attempt, in milliseconds.
pub const DEFAULT_DIAL_TIMEOUT_MS: u64 = 8000;
/// Default TCP_NODELAY for outbound sockets.
pub const DEFAULT_TCP_NO_DELAY: bool = true;
/// Default TCP socket send buffer size (0 = OS default).
pub const DEFAULT_TCP_SEND_BUFFER: usize = 0;
/// Default TCP socket receive buffer size (0 = OS default).
pub const DEFAULT_TCP_RECV_BUFFER: usize = 0;

// ============================================================================
// Buffer/Size Defaults
// ============================================================================

/// Default per-direction in-flight window in KiB (0 = one chunk in flight).
pub const DEFAULT_BUFFER_SIZE_KIB: usize = 32;
/// Read size used by the download loop when pulling from the remote.
pub const DEFAULT_READ_CHUNK_SIZE: usize = 16 * 1024;
/// Upper bound on how long a rejected client is drained, in seconds.
pub const DEFAULT_DRAIN_TIMEOUT_SECS: u64 = 30;

// ============================================================================
// Session Timeouts
// ============================================================================

/// Time allowed for a client to deliver its complete request header, in seconds.
pub const DEFAULT_HANDSHAKE_TIMEOUT_SECS: u64 = 10;
/// A piping session ends after this many seconds without traffic in either
/// direction (0 = never).
pub const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 600;

// ============================================================================
// Transport Defaults
// ============================================================================

/// Default WebSocket path (empty = transport disabled).
pub const DEFAULT_WS_PATH: &str = "";
/// Default max WebSocket frame size.
pub const DEFAULT_WS_MAX_FRAME_BYTES: usize = 1 << 20;
/// Default XHTTP path (empty = transport disabled).
pub const DEFAULT_XHTTP_PATH: &str = "";
/// Default length range of the `X-Padding` response header.
pub const DEFAULT_XPADDING_RANGE: &str = "100-1000";

// ============================================================================
// Auxiliary Endpoint Defaults
// ============================================================================

/// Default upstream DNS-over-HTTPS server.
pub const DEFAULT_UPSTREAM_DOH: &str = "https://dns.google/dns-query";
/// Default timeout for upstream DoH requests, in seconds.
pub const DEFAULT_DOH_TIMEOUT_SECS: u64 = 10;
