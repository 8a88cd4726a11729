//! Configuration validation logic.

use std::net::SocketAddr;

use vless_proto::UserId;

use crate::Config;
use crate::loader::ConfigError;

pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.listen.parse::<SocketAddr>().is_err() {
        return Err(ConfigError::Validation(format!(
            "server.listen is not a socket address: {:?}",
            config.server.listen
        )));
    }
    if config.server.uuid.trim().is_empty() {
        return Err(ConfigError::Validation(
            "server.uuid is empty (run `vless-rs example` for a generated one)".into(),
        ));
    }
    if let Err(e) = UserId::parse(&config.server.uuid) {
        return Err(ConfigError::Validation(format!("server.uuid: {e}")));
    }
    if config.websocket.path.is_empty() && config.xhttp.path.is_empty() {
        return Err(ConfigError::Validation(
            "at least one of websocket.path or xhttp.path must be set".into(),
        ));
    }
    if !config.websocket.path.is_empty() && config.websocket.path == config.xhttp.path {
        return Err(ConfigError::Validation(
            "websocket.path and xhttp.path must differ".into(),
        ));
    }
    if config.server.dial_timeout_ms == 0 {
        return Err(ConfigError::Validation(
            "server.dial_timeout_ms must be > 0".into(),
        ));
    }
    if config.server.drain_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "server.drain_timeout_secs must be > 0".into(),
        ));
    }
    if config.server.handshake_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "server.handshake_timeout_secs must be > 0".into(),
        ));
    }
    if config.server.buffer_size_kib > 64 * 1024 {
        return Err(ConfigError::Validation(
            "server.buffer_size_kib must be <= 65536".into(),
        ));
    }
    if config.server.connection_backlog == 0 {
        return Err(ConfigError::Validation(
            "server.connection_backlog must be > 0".into(),
        ));
    }
    if config.websocket.max_frame_bytes < 1024 {
        return Err(ConfigError::Validation(
            "websocket.max_frame_bytes must be >= 1024".into(),
        ));
    }
    if !config.doh.path.is_empty() {
        let upstream = config.doh.upstream.as_str();
        if !(upstream.starts_with("https://") || upstream.starts_with("http://")) {
            return Err(ConfigError::Validation(
                "doh.upstream must be an http(s) URL".into(),
            ));
        }
        if config.doh.timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "doh.timeout_secs must be > 0".into(),
            ));
        }
    }
    if let Some(listen) = &config.metrics.listen
        && listen.parse::<SocketAddr>().is_err()
    {
        return Err(ConfigError::Validation(format!(
            "metrics.listen is not a socket address: {listen:?}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> Config {
        let mut cfg = Config::default();
        cfg.server.uuid = "81c11ae9-28f3-4439-8812-d8dbf0904eae".into();
        cfg.websocket.path = "/ws/".into();
        cfg
    }

    fn reason(cfg: &Config) -> String {
        match validate_config(cfg) {
            Err(ConfigError::Validation(msg)) => msg,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn accepts_valid() {
        validate_config(&valid()).unwrap();
    }

    #[test]
    fn rejects_bad_uuid() {
        let mut cfg = valid();
        cfg.server.uuid = "not-a-uuid".into();
        assert!(reason(&cfg).contains("server.uuid"));
    }

    #[test]
    fn rejects_no_transport() {
        let mut cfg = valid();
        cfg.websocket.path.clear();
        assert!(reason(&cfg).contains("xhttp.path"));
    }

    #[test]
    fn rejects_zero_dial_timeout() {
        let mut cfg = valid();
        cfg.server.dial_timeout_ms = 0;
        assert!(reason(&cfg).contains("dial_timeout_ms"));
    }

    #[test]
    fn padding_range_never_rejected() {
        // Unparseable ranges disable padding at runtime instead of failing startup.
        let mut cfg = valid();
        for ok in ["", "0", "100-1000", "-1", "5 - 9", "px-5", "abc", "a-b"] {
            cfg.xhttp.padding_range = ok.into();
            validate_config(&cfg).unwrap();
        }
    }

    #[test]
    fn rejects_zero_handshake_timeout() {
        let mut cfg = valid();
        cfg.server.handshake_timeout_secs = 0;
        assert!(reason(&cfg).contains("handshake_timeout_secs"));
    }

    #[test]
    fn rejects_bad_listen() {
        let mut cfg = valid();
        cfg.server.listen = "localhost".into();
        assert!(reason(&cfg).contains("server.listen"));
    }
}
