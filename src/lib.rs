//! # vless-rs
//!
//! An edge proxy for the VLESS tunneling protocol.
//!
//! Clients reach the server over WebSocket or XHTTP stream-one; each session
//! carries a VLESS request header followed by payload, which is relayed to
//! the requested TCP destination.
//!
//! ## Crates
//!
//! - [`vless_core`] - Defaults, chunk channels and the bidirectional pump
//! - [`vless_proto`] - Request header parsing and serialization
//! - [`vless_config`] - Configuration loading and validation
//! - [`vless_metrics`] - Prometheus-compatible metrics
//! - [`vless_server`] - HTTP front, transports and session handling

pub use vless_config as config;
pub use vless_core as core;
pub use vless_metrics as metrics;
pub use vless_proto as proto;
pub use vless_server as server;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use vless_config::{Config, load_config, resolve_config, validate_config};
    pub use vless_proto::{Address, Host, RequestHeader, UserId};
    pub use vless_server::{CancellationToken, ServerError, run, run_with_shutdown};
}
