//! Transport adapters turning HTTP-level channels into [`ClientIo`] halves.
//!
//! [`ClientIo`]: vless_core::transport::ClientIo

mod ws;
mod xhttp;

pub use ws::WsTransport;
pub use xhttp::XhttpTransport;
