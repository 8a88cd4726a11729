//! Configuration loading and CLI definitions.
//!
//! A configuration is resolved in layers: optional file, environment
//! overlay, CLI overrides, path normalisation and finally validation.

mod cli;
mod defaults;
mod env;
mod loader;
mod types;
mod validate;

use std::path::Path;

pub use cli::{CliOverrides, apply_overrides};
pub use env::{apply_env, normalize_log_level};
pub use loader::{ConfigError, load_config};
pub use types::*;
pub use validate::validate_config;

/// Append a trailing `/` unless one is already present.
///
/// An empty path stays empty; empty feature paths mean "disabled".
pub fn append_slash(path: &str) -> String {
    if path.is_empty() || path.ends_with('/') {
        path.to_string()
    } else {
        format!("{path}/")
    }
}

/// Normalise every feature path so suffix matching is unambiguous.
pub fn normalize_paths(config: &mut Config) {
    config.websocket.path = append_slash(&config.websocket.path);
    config.xhttp.path = append_slash(&config.xhttp.path);
    config.doh.path = append_slash(&config.doh.path);
    config.ip_query.path = append_slash(&config.ip_query.path);
}

/// Resolve the effective configuration from an optional file, an
/// environment lookup and CLI overrides.
pub fn resolve_config_with<F>(
    path: Option<&Path>,
    lookup: F,
    overrides: &CliOverrides,
) -> Result<Config, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = match path {
        Some(p) => load_config(p)?,
        None => Config::default(),
    };
    apply_env(&mut config, lookup)?;
    apply_overrides(&mut config, overrides);
    normalize_paths(&mut config);
    validate_config(&config)?;
    Ok(config)
}

/// [`resolve_config_with`] using the process environment.
pub fn resolve_config(
    path: Option<&Path>,
    overrides: &CliOverrides,
) -> Result<Config, ConfigError> {
    resolve_config_with(path, |k| std::env::var(k).ok(), overrides)
}

#[cfg(test)]
mod tests {
    use super::*;

    const UUID: &str = "81c11ae9-28f3-4439-8812-d8dbf0904eae";

    #[test]
    fn append_slash_rules() {
        assert_eq!(append_slash(""), "");
        assert_eq!(append_slash("/ws"), "/ws/");
        assert_eq!(append_slash("/ws/"), "/ws/");
    }

    #[test]
    fn resolve_layers_env_then_cli() {
        let env = |k: &str| match k {
            "UUID" => Some(UUID.to_string()),
            "WS_PATH" => Some("/env-ws".to_string()),
            "XHTTP_PATH" => Some("/env-xhttp".to_string()),
            _ => None,
        };
        let overrides = CliOverrides {
            ws_path: Some("/cli-ws".into()),
            ..Default::default()
        };
        let config = resolve_config_with(None, env, &overrides).unwrap();
        assert_eq!(config.server.uuid, UUID);
        assert_eq!(config.websocket.path, "/cli-ws/");
        assert_eq!(config.xhttp.path, "/env-xhttp/");
        assert_eq!(config.doh.path, "");
    }

    #[test]
    fn resolve_rejects_missing_uuid() {
        let env = |k: &str| (k == "WS_PATH").then(|| "/ws".to_string());
        let err = resolve_config_with(None, env, &CliOverrides::default()).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }
}
