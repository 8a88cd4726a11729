//! Environment variable overlay.
//!
//! Variables use the upper-case deployment names (`UUID`, `PROXY`, ...).
//! Unset and empty variables leave the configured value untouched.

use crate::Config;
use crate::loader::ConfigError;

/// Map the `none` level to tracing's `off`; other names pass through.
pub fn normalize_log_level(level: &str) -> String {
    let level = level.trim().to_ascii_lowercase();
    if level == "none" { "off".to_string() } else { level }
}

/// Overlay environment values onto `config` using `lookup`.
pub fn apply_env<F>(config: &mut Config, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

    if let Some(v) = get("UUID") {
        config.server.uuid = v.trim().to_string();
    }
    if let Some(v) = get("PROXY") {
        config.server.proxy = v;
    }
    if let Some(v) = get("WS_PATH") {
        config.websocket.path = v.trim().to_string();
    }
    if let Some(v) = get("XHTTP_PATH") {
        config.xhttp.path = v.trim().to_string();
    }
    if let Some(v) = get("XPADDING_RANGE") {
        config.xhttp.padding_range = v.trim().to_string();
    }
    if let Some(v) = get("DOH_QUERY_PATH") {
        config.doh.path = v.trim().to_string();
    }
    if let Some(v) = get("UPSTREAM_DOH") {
        config.doh.upstream = v.trim().to_string();
    }
    if let Some(v) = get("IP_QUERY_PATH") {
        config.ip_query.path = v.trim().to_string();
    }
    if let Some(v) = get("BUFFER_SIZE") {
        config.server.buffer_size_kib = v.trim().parse().map_err(|_| ConfigError::Env {
            name: "BUFFER_SIZE",
            value: v.clone(),
        })?;
    }
    if let Some(v) = get("LOG_LEVEL") {
        config.logging.level = Some(normalize_log_level(&v));
    }
    Ok(())
}
