//! Configuration file loading and error types.

use std::{fs, path::Path};

use crate::Config;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("yaml: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("toml: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("unsupported config format")]
    UnsupportedFormat,
    #[error("env {name}: invalid value {value:?}")]
    Env { name: &'static str, value: String },
    #[error("validation: {0}")]
    Validation(String),
}

pub fn load_config(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let data = fs::read_to_string(path)?;
    match path.extension().and_then(|s| s.to_str()).unwrap_or("") {
        "json" | "jsonc" => {
            let stripped = json_comments::StripComments::new(data.as_bytes());
            Ok(serde_json::from_reader(stripped)?)
        }
        "yaml" | "yml" => Ok(serde_yaml::from_str(&data)?),
        "toml" => Ok(toml::from_str(&data)?),
        _ => Err(ConfigError::UnsupportedFormat),
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn write_temp(suffix: &str, body: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(body.as_bytes()).unwrap();
        file
    }

    #[test]
    fn load_jsonc_with_comments() {
        let file = write_temp(
            ".jsonc",
            r#"{
                // identifier
                "server": { "uuid": "81c11ae9-28f3-4439-8812-d8dbf0904eae", "proxy": "a.example b.example" },
                /* transports */
                "xhttp": { "path": "/xh" }
            }"#,
        );
        let cfg = load_config(file.path()).unwrap();
        assert_eq!(cfg.server.proxy, "a.example b.example");
        assert_eq!(cfg.xhttp.path, "/xh");
        assert_eq!(cfg.xhttp.padding_range, "100-1000");
    }

    #[test]
    fn load_yaml() {
        let file = write_temp(
            ".yaml",
            "server:\n  listen: 127.0.0.1:9000\n  buffer_size_kib: 0\nwebsocket:\n  path: /ws\n",
        );
        let cfg = load_config(file.path()).unwrap();
        assert_eq!(cfg.server.listen, "127.0.0.1:9000");
        assert_eq!(cfg.server.buffer_size_kib, 0);
        assert_eq!(cfg.websocket.path, "/ws");
    }

    #[test]
    fn load_toml() {
        let file = write_temp(
            ".toml",
            "[server]\ndial_timeout_ms = 500\n[doh]\npath = \"/dns-query\"\n",
        );
        let cfg = load_config(file.path()).unwrap();
        assert_eq!(cfg.server.dial_timeout_ms, 500);
        assert_eq!(cfg.doh.path, "/dns-query");
        assert_eq!(cfg.doh.upstream, "https://dns.google/dns-query");
    }

    #[test]
    fn load_unknown_extension() {
        let file = write_temp(".ini", "listen=1");
        assert!(matches!(
            load_config(file.path()),
            Err(ConfigError::UnsupportedFormat)
        ));
    }
}
