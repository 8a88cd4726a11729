//! CLI module for vless-server.
//!
//! This module provides the command-line interface that can be used either
//! as a standalone binary or as a subcommand of the main vless-rs CLI.

use std::io;
use std::path::PathBuf;

use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};
use vless_config::{CliOverrides, LoggingConfig, resolve_config};

use crate::info::example_text;
use crate::{CancellationToken, run_with_shutdown};

/// VLESS server CLI arguments.
#[derive(Parser, Debug, Clone)]
#[command(name = "vless-server", version, about = "VLESS edge proxy over WebSocket and XHTTP")]
pub struct ServerArgs {
    /// Config file path (json/jsonc/yaml/toml). Environment variables and
    /// flags apply on top of it.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[command(flatten)]
    pub overrides: CliOverrides,
}

/// Arguments for printing a random settings example.
#[derive(Parser, Debug, Clone)]
#[command(name = "example", about = "Print a random settings example")]
pub struct ExampleArgs {
    /// Public origin the client will connect to.
    #[arg(long, default_value = "https://your.domain")]
    pub origin: String,
}

/// Run the vless server with the given arguments.
///
/// This is the main entry point for the server CLI, used by both the
/// standalone binary and the unified vless-rs CLI.
pub async fn run(args: ServerArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = resolve_config(args.config.as_deref(), &args.overrides)?;

    init_tracing(&config.logging);

    if let Some(listen) = &config.metrics.listen {
        match vless_metrics::init_prometheus(listen) {
            Ok(()) => info!("metrics exporter listening on {}", listen),
            Err(e) => warn!("failed to start metrics exporter: {}", e),
        }
    }

    // Set up graceful shutdown on SIGTERM/SIGINT
    let shutdown = CancellationToken::new();
    let shutdown_signal = shutdown.clone();

    tokio::spawn(async move {
        shutdown_signal_handler().await;
        info!("shutdown signal received");
        shutdown_signal.cancel();
    });

    run_with_shutdown(config, shutdown).await?;
    Ok(())
}

/// Print a random settings example to stdout.
pub fn run_example(args: &ExampleArgs) {
    print!("{}", example_text(&args.origin));
}

/// Wait for shutdown signals (SIGTERM, SIGINT).
async fn shutdown_signal_handler() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

/// Build the filter directive from the base level and per-module overrides.
fn filter_directive(config: &LoggingConfig) -> String {
    let mut directive = config.level.as_deref().unwrap_or("info").to_string();
    let mut filters: Vec<_> = config.filters.iter().collect();
    filters.sort();
    for (module, level) in filters {
        directive.push(',');
        directive.push_str(module);
        directive.push('=');
        directive.push_str(level);
    }
    directive
}

/// Initialize tracing subscriber with the given logging configuration.
///
/// Supports:
/// - `level`: Base log level (trace, debug, info, warn, error, off)
/// - `format`: Output format (json, pretty, compact). Default: pretty
/// - `output`: Output target (stdout, stderr). Default: stderr
/// - `filters`: Per-module log level overrides
fn init_tracing(config: &LoggingConfig) {
    let filter = EnvFilter::try_new(filter_directive(config))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let format = config.format.as_deref().unwrap_or("pretty");
    let output = config.output.as_deref().unwrap_or("stderr");

    match (format, output) {
        ("json", "stdout") => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json().with_writer(io::stdout))
                .init();
        }
        ("json", _) => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json().with_writer(io::stderr))
                .init();
        }
        ("compact", "stdout") => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().compact().with_writer(io::stdout))
                .init();
        }
        ("compact", _) => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().compact().with_writer(io::stderr))
                .init();
        }
        (_, "stdout") => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_writer(io::stdout))
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_writer(io::stderr))
                .init();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_directive_joins_modules() {
        let mut config = LoggingConfig {
            level: Some("warn".into()),
            ..Default::default()
        };
        assert_eq!(filter_directive(&config), "warn");
        config.filters.insert("vless_server".into(), "debug".into());
        config.filters.insert("hyper".into(), "off".into());
        assert_eq!(filter_directive(&config), "warn,hyper=off,vless_server=debug");
    }

    #[test]
    fn server_args_parse() {
        let args = ServerArgs::try_parse_from([
            "vless-server",
            "--config",
            "server.toml",
            "--uuid",
            "81c11ae9-28f3-4439-8812-d8dbf0904eae",
        ])
        .unwrap();
        assert_eq!(args.config, Some(PathBuf::from("server.toml")));
        assert!(args.overrides.uuid.is_some());
    }
}
