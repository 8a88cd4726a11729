//! VLESS server library.
//!
//! This module exposes the server implementation for use by integration tests
//! and potential embedding scenarios.

pub mod cli;
mod dial;
mod doh;
mod error;
mod handler;
mod info;
mod padding;
mod router;
mod server;
mod state;
mod transport;
mod util;

pub use cli::{ExampleArgs, ServerArgs};
pub use dial::{Connector, DialKind, DialTarget, Dialer, FallbackHosts, TcpConnector};
pub use doh::DohForwarder;
pub use error::{DialError, HandshakeError, ServerError};
pub use handler::{SessionContext, SessionOutcome, SessionSettings, run_session};
pub use info::{ClientKind, IpInfo, client_config, example_text};
pub use padding::{PaddingSpec, random_padding};
pub use router::build_router;
pub use server::{run, run_with_shutdown, serve};
pub use state::ServerState;
pub use tokio_util::sync::CancellationToken;
