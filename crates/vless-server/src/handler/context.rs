//! Per-session identity.

use std::net::SocketAddr;
use std::time::Duration;

use rand::Rng;
use tokio::time::Instant;
use tracing::{Span, info_span};
use vless_metrics::{record_session_accepted, record_session_closed};

/// Lifecycle of one proxied connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Handshaking,
    Dialing,
    Piping,
    Closed,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Handshaking => "handshaking",
            SessionState::Dialing => "dialing",
            SessionState::Piping => "piping",
            SessionState::Closed => "closed",
        }
    }
}

/// Identity of one client connection, built once and passed explicitly.
///
/// Creating a context counts the session as accepted; dropping it records
/// the session as closed along with its duration.
#[derive(Debug)]
pub struct SessionContext {
    sid: u32,
    peer: SocketAddr,
    transport: &'static str,
    started: Instant,
    span: Span,
}

impl SessionContext {
    pub fn new(peer: SocketAddr, transport: &'static str) -> Self {
        let sid = rand::thread_rng().gen_range(10_000..=99_999);
        let span = info_span!("session", sid, peer = %peer, transport);
        record_session_accepted(transport);
        Self {
            sid,
            peer,
            transport,
            started: Instant::now(),
            span,
        }
    }

    /// Random five-digit correlation id.
    pub fn sid(&self) -> u32 {
        self.sid
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    pub fn transport(&self) -> &'static str {
        self.transport
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Span every event of this session is recorded in.
    pub fn span(&self) -> Span {
        self.span.clone()
    }
}

impl Drop for SessionContext {
    fn drop(&mut self) {
        record_session_closed(self.elapsed().as_secs_f64());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sid_is_five_digits() {
        let peer: SocketAddr = "127.0.0.1:1".parse().unwrap();
        for _ in 0..100 {
            let ctx = SessionContext::new(peer, "ws");
            assert!((10_000..=99_999).contains(&ctx.sid()));
            assert_eq!(ctx.transport(), "ws");
            assert_eq!(ctx.peer(), peer);
        }
    }
}
