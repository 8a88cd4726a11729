//! Error type constants for metrics and logging.
//!
//! These constants provide consistent error classification across all crates.

/// Protocol parsing/validation error.
pub const ERROR_PROTOCOL: &str = "protocol";
/// Client identifier mismatch.
pub const ERROR_AUTH: &str = "auth";
/// I/O error.
pub const ERROR_IO: &str = "io";
/// Every dial candidate failed.
pub const ERROR_DIAL: &str = "dial";
/// Timeout error.
pub const ERROR_TIMEOUT: &str = "timeout";
/// Upstream HTTP error (DoH forwarding).
pub const ERROR_UPSTREAM: &str = "upstream";
/// Configuration error.
pub const ERROR_CONFIG: &str = "config";
