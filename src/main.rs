//! Unified vless-rs CLI.
//!
//! This binary provides a unified interface to the vless components:
//! - `vless-rs server` - Run the edge proxy server
//! - `vless-rs example` - Print a random settings example
//!
//! The server can also be run as the standalone `vless-server` binary.

use std::process::ExitCode;

use clap::{Parser, Subcommand};

/// vless-rs unified CLI.
#[derive(Parser)]
#[command(
    name = "vless-rs",
    version,
    about = "An edge proxy for the VLESS tunneling protocol",
    propagate_version = true
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the server.
    #[command(name = "server", alias = "serve")]
    Server(Box<vless_server::ServerArgs>),

    /// Print a randomly generated settings example.
    #[command(name = "example")]
    Example(vless_server::ExampleArgs),
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Server(args) => vless_server::cli::run(*args).await,
        Commands::Example(args) => {
            vless_server::cli::run_example(&args);
            Ok(())
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
