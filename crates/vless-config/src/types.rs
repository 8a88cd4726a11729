//! Configuration type definitions.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::defaults::*;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub websocket: WebSocketConfig,
    #[serde(default)]
    pub xhttp: XhttpConfig,
    #[serde(default)]
    pub doh: DohConfig,
    #[serde(default)]
    pub ip_query: IpQueryConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_listen")]
    pub listen: String,
    /// Client identifier in dashed hex form.
    #[serde(default)]
    pub uuid: String,
    /// Fallback hosts, separated by spaces, commas or newlines.
    #[serde(default)]
    pub proxy: String,
    /// Budget for each outbound connection attempt (milliseconds).
    #[serde(default = "default_dial_timeout_ms")]
    pub dial_timeout_ms: u64,
    /// Per-direction in-flight window in KiB. 0 keeps a single chunk in flight.
    #[serde(default = "default_buffer_size_kib")]
    pub buffer_size_kib: usize,
    /// Upper bound on draining a rejected client (seconds).
    #[serde(default = "default_drain_timeout_secs")]
    pub drain_timeout_secs: u64,
    /// Time allowed for the complete request header to arrive (seconds).
    #[serde(default = "default_handshake_timeout_secs")]
    pub handshake_timeout_secs: u64,
    /// End a session after this long without traffic (seconds, 0 = never).
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,
    /// TCP listener backlog (pending connections queue size).
    #[serde(default = "default_connection_backlog")]
    pub connection_backlog: u32,
    /// Time to wait for active sessions on shutdown (seconds).
    #[serde(default = "default_shutdown_timeout_secs")]
    pub shutdown_timeout_secs: u64,
    /// Outbound TCP socket options.
    #[serde(default)]
    pub tcp: TcpConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            uuid: String::new(),
            proxy: String::new(),
            dial_timeout_ms: default_dial_timeout_ms(),
            buffer_size_kib: default_buffer_size_kib(),
            drain_timeout_secs: default_drain_timeout_secs(),
            handshake_timeout_secs: default_handshake_timeout_secs(),
            idle_timeout_secs: default_idle_timeout_secs(),
            connection_backlog: default_connection_backlog(),
            shutdown_timeout_secs: default_shutdown_timeout_secs(),
            tcp: TcpConfig::default(),
        }
    }
}

impl ServerConfig {
    /// In-flight window in bytes.
    pub fn window_bytes(&self) -> usize {
        self.buffer_size_kib.saturating_mul(1024)
    }
}

/// TCP socket options applied to outbound connections.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TcpConfig {
    /// Disable Nagle's algorithm (TCP_NODELAY).
    #[serde(default = "default_tcp_no_delay")]
    pub no_delay: bool,
    /// SO_SNDBUF. If 0, uses OS default.
    #[serde(default = "default_tcp_send_buffer")]
    pub send_buffer: usize,
    /// SO_RCVBUF. If 0, uses OS default.
    #[serde(default = "default_tcp_recv_buffer")]
    pub recv_buffer: usize,
}

impl Default for TcpConfig {
    fn default() -> Self {
        Self {
            no_delay: default_tcp_no_delay(),
            send_buffer: default_tcp_send_buffer(),
            recv_buffer: default_tcp_recv_buffer(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebSocketConfig {
    /// Upgrade path; empty disables the transport.
    #[serde(default = "default_ws_path")]
    pub path: String,
    #[serde(default = "default_ws_max_frame_bytes")]
    pub max_frame_bytes: usize,
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        Self {
            path: default_ws_path(),
            max_frame_bytes: default_ws_max_frame_bytes(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct XhttpConfig {
    /// Stream-one path; empty disables the transport.
    #[serde(default = "default_xhttp_path")]
    pub path: String,
    /// `X-Padding` length range such as `100-1000`. Empty or `0` disables it.
    #[serde(default = "default_xpadding_range")]
    pub padding_range: String,
}

impl Default for XhttpConfig {
    fn default() -> Self {
        Self {
            path: default_xhttp_path(),
            padding_range: default_xpadding_range(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DohConfig {
    /// Forwarding path; empty disables DoH forwarding.
    #[serde(default)]
    pub path: String,
    #[serde(default = "default_upstream_doh")]
    pub upstream: String,
    #[serde(default = "default_doh_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for DohConfig {
    fn default() -> Self {
        Self {
            path: String::new(),
            upstream: default_upstream_doh(),
            timeout_secs: default_doh_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IpQueryConfig {
    /// Path of the caller-info endpoint; empty disables it.
    #[serde(default)]
    pub path: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Prometheus exporter listen address.
    pub listen: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error, off).
    pub level: Option<String>,
    /// Log format: json, pretty, or compact. Default: pretty.
    pub format: Option<String>,
    /// Output target: stdout or stderr. Default: stderr.
    pub output: Option<String>,
    /// Per-module log level filters (e.g., {"vless_server": "debug", "hyper": "warn"}).
    #[serde(default)]
    pub filters: HashMap<String, String>,
}
