//! CLI override definitions and application logic.

use clap::Parser;

use crate::Config;
use crate::env::normalize_log_level;

#[derive(Debug, Clone, Parser, Default)]
pub struct CliOverrides {
    /// Override HTTP listen address, e.g. 0.0.0.0:8080
    #[arg(long)]
    pub listen: Option<String>,
    /// Override client identifier (dashed hex)
    #[arg(long)]
    pub uuid: Option<String>,
    /// Override fallback host list (space, comma or newline separated)
    #[arg(long)]
    pub proxy: Option<String>,
    /// Override WebSocket path (empty disables)
    #[arg(long)]
    pub ws_path: Option<String>,
    /// Override XHTTP path (empty disables)
    #[arg(long)]
    pub xhttp_path: Option<String>,
    /// Override X-Padding length range, e.g. 100-1000
    #[arg(long)]
    pub xpadding_range: Option<String>,
    /// Override DoH forwarding path (empty disables)
    #[arg(long)]
    pub doh_path: Option<String>,
    /// Override upstream DoH server URL
    #[arg(long)]
    pub upstream_doh: Option<String>,
    /// Override IP info path (empty disables)
    #[arg(long)]
    pub ip_query_path: Option<String>,
    /// Per-direction in-flight window in KiB (0 = one chunk in flight)
    #[arg(long)]
    pub buffer_size_kib: Option<usize>,
    /// Per-attempt dial timeout (milliseconds)
    #[arg(long)]
    pub dial_timeout_ms: Option<u64>,
    /// Upper bound on draining rejected clients (seconds)
    #[arg(long)]
    pub drain_timeout_secs: Option<u64>,
    /// Deadline for the client to send its request header (seconds)
    #[arg(long)]
    pub handshake_timeout_secs: Option<u64>,
    /// Close sessions idle in both directions for this long (seconds, 0 = never)
    #[arg(long)]
    pub idle_timeout_secs: Option<u64>,
    /// TCP listener backlog size
    #[arg(long)]
    pub connection_backlog: Option<u32>,
    /// Graceful shutdown timeout (seconds)
    #[arg(long)]
    pub shutdown_timeout_secs: Option<u64>,
    /// Outbound TCP_NODELAY
    #[arg(long)]
    pub tcp_no_delay: Option<bool>,
    /// Outbound TCP send buffer size (SO_SNDBUF, 0 = OS default)
    #[arg(long)]
    pub tcp_send_buffer: Option<usize>,
    /// Outbound TCP receive buffer size (SO_RCVBUF, 0 = OS default)
    #[arg(long)]
    pub tcp_recv_buffer: Option<usize>,
    /// WebSocket max frame bytes
    #[arg(long)]
    pub ws_max_frame_bytes: Option<usize>,
    /// Override metrics listen address
    #[arg(long)]
    pub metrics_listen: Option<String>,
    /// Override log level (trace/debug/info/warn/error/none)
    #[arg(long)]
    pub log_level: Option<String>,
}

pub fn apply_overrides(config: &mut Config, overrides: &CliOverrides) {
    if let Some(v) = &overrides.listen {
        config.server.listen = v.clone();
    }
    if let Some(v) = &overrides.uuid {
        config.server.uuid = v.clone();
    }
    if let Some(v) = &overrides.proxy {
        config.server.proxy = v.clone();
    }
    if let Some(v) = &overrides.ws_path {
        config.websocket.path = v.clone();
    }
    if let Some(v) = &overrides.xhttp_path {
        config.xhttp.path = v.clone();
    }
    if let Some(v) = &overrides.xpadding_range {
        config.xhttp.padding_range = v.clone();
    }
    if let Some(v) = &overrides.doh_path {
        config.doh.path = v.clone();
    }
    if let Some(v) = &overrides.upstream_doh {
        config.doh.upstream = v.clone();
    }
    if let Some(v) = &overrides.ip_query_path {
        config.ip_query.path = v.clone();
    }
    if let Some(v) = overrides.buffer_size_kib {
        config.server.buffer_size_kib = v;
    }
    if let Some(v) = overrides.dial_timeout_ms {
        config.server.dial_timeout_ms = v;
    }
    if let Some(v) = overrides.drain_timeout_secs {
        config.server.drain_timeout_secs = v;
    }
    if let Some(v) = overrides.handshake_timeout_secs {
        config.server.handshake_timeout_secs = v;
    }
    if let Some(v) = overrides.idle_timeout_secs {
        config.server.idle_timeout_secs = v;
    }
    if let Some(v) = overrides.connection_backlog {
        config.server.connection_backlog = v;
    }
    if let Some(v) = overrides.shutdown_timeout_secs {
        config.server.shutdown_timeout_secs = v;
    }
    // TCP socket options
    if let Some(v) = overrides.tcp_no_delay {
        config.server.tcp.no_delay = v;
    }
    if let Some(v) = overrides.tcp_send_buffer {
        config.server.tcp.send_buffer = v;
    }
    if let Some(v) = overrides.tcp_recv_buffer {
        config.server.tcp.recv_buffer = v;
    }
    if let Some(v) = overrides.ws_max_frame_bytes {
        config.websocket.max_frame_bytes = v;
    }
    if let Some(v) = &overrides.metrics_listen {
        config.metrics.listen = Some(v.clone());
    }
    if let Some(v) = &overrides.log_level {
        config.logging.level = Some(normalize_log_level(v));
    }
}
