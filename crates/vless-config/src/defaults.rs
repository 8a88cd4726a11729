//! Default value functions for serde deserialization.
//!
//! These functions forward to constants defined in `vless_core::defaults`.

use vless_core::defaults;

/// Generate default value functions that forward to vless_core::defaults constants.
macro_rules! default_fns {
    // For Copy types (integers, bool, etc.)
    ($($fn_name:ident => $const_name:ident : $ty:ty),* $(,)?) => {
        $(
            pub(crate) fn $fn_name() -> $ty {
                defaults::$const_name
            }
        )*
    };
}

/// Generate default value functions that return String from &str constants.
macro_rules! default_string_fns {
    ($($fn_name:ident => $const_name:ident),* $(,)?) => {
        $(
            pub(crate) fn $fn_name() -> String {
                defaults::$const_name.to_string()
            }
        )*
    };
}

default_fns! {
    default_dial_timeout_ms       => DEFAULT_DIAL_TIMEOUT_MS: u64,
    default_buffer_size_kib       => DEFAULT_BUFFER_SIZE_KIB: usize,
    default_drain_timeout_secs    => DEFAULT_DRAIN_TIMEOUT_SECS: u64,
    default_handshake_timeout_secs => DEFAULT_HANDSHAKE_TIMEOUT_SECS: u64,
    default_idle_timeout_secs     => DEFAULT_IDLE_TIMEOUT_SECS: u64,
    default_connection_backlog    => DEFAULT_CONNECTION_BACKLOG: u32,
    default_shutdown_timeout_secs => DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64,
    default_ws_max_frame_bytes    => DEFAULT_WS_MAX_FRAME_BYTES: usize,
    default_doh_timeout_secs      => DEFAULT_DOH_TIMEOUT_SECS: u64,
    // TCP socket options
    default_tcp_no_delay          => DEFAULT_TCP_NO_DELAY: bool,
    default_tcp_send_buffer       => DEFAULT_TCP_SEND_BUFFER: usize,
    default_tcp_recv_buffer       => DEFAULT_TCP_RECV_BUFFER: usize,
}

default_string_fns! {
    default_listen          => DEFAULT_LISTEN,
    default_ws_path         => DEFAULT_WS_PATH,
    default_xhttp_path      => DEFAULT_XHTTP_PATH,
    default_xpadding_range  => DEFAULT_XPADDING_RANGE,
    default_upstream_doh    => DEFAULT_UPSTREAM_DOH,
}
