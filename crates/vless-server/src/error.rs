//! Server error types.

use vless_core::io::AccumulateError;
use vless_core::{
    ERROR_AUTH, ERROR_CONFIG, ERROR_DIAL, ERROR_IO, ERROR_PROTOCOL, ERROR_TIMEOUT, ERROR_UPSTREAM,
};
use vless_proto::ParseError;

use crate::dial::DialAttempt;

/// Reasons a handshake can fail before any byte is relayed.
#[derive(Debug, thiserror::Error)]
pub enum HandshakeError {
    #[error("stream ended after {got} bytes, {needed} required")]
    InsufficientData { needed: usize, got: usize },
    #[error("read: {0}")]
    Read(std::io::Error),
    #[error("{0}")]
    Parse(ParseError),
    #[error("no complete header within {0:?}")]
    Timeout(std::time::Duration),
}

impl HandshakeError {
    /// Stable label for logs and metrics.
    pub fn reason(&self) -> &'static str {
        match self {
            HandshakeError::InsufficientData { .. } => "insufficient_data",
            HandshakeError::Read(_) => "read_error",
            HandshakeError::Parse(e) => e.reason(),
            HandshakeError::Timeout(_) => "timeout",
        }
    }
}

impl From<AccumulateError> for HandshakeError {
    fn from(err: AccumulateError) -> Self {
        match err {
            AccumulateError::InsufficientData { needed, got } => {
                HandshakeError::InsufficientData { needed, got }
            }
            AccumulateError::Read(e) => HandshakeError::Read(e),
        }
    }
}

impl From<ParseError> for HandshakeError {
    fn from(err: ParseError) -> Self {
        HandshakeError::Parse(err)
    }
}

/// Every dial candidate failed or timed out.
#[derive(Debug, thiserror::Error)]
pub enum DialError {
    #[error("all attempts failed ({})", format_attempts(.attempts))]
    AllAttemptsFailed { attempts: Vec<DialAttempt> },
}

fn format_attempts(attempts: &[DialAttempt]) -> String {
    attempts
        .iter()
        .map(|a| format!("{} [{}]:{}: {}", a.kind.as_str(), a.host, a.port, a.error))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Server error type.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("config: {0}")]
    Config(String),
    #[error("handshake: {0}")]
    Handshake(#[from] HandshakeError),
    #[error("dial: {0}")]
    Dial(#[from] DialError),
    #[error("upstream: {0}")]
    Upstream(#[from] reqwest::Error),
}

impl ServerError {
    /// Get the error type string for metrics.
    pub fn error_type(&self) -> &'static str {
        match self {
            ServerError::Io(_) => ERROR_IO,
            ServerError::Config(_) => ERROR_CONFIG,
            ServerError::Handshake(HandshakeError::Parse(ParseError::Authentication)) => ERROR_AUTH,
            ServerError::Handshake(HandshakeError::Read(_)) => ERROR_IO,
            ServerError::Handshake(HandshakeError::Timeout(_)) => ERROR_TIMEOUT,
            ServerError::Handshake(_) => ERROR_PROTOCOL,
            ServerError::Dial(_) => ERROR_DIAL,
            ServerError::Upstream(e) if e.is_timeout() => ERROR_TIMEOUT,
            ServerError::Upstream(_) => ERROR_UPSTREAM,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_type_labels() {
        let auth = ServerError::from(HandshakeError::Parse(ParseError::Authentication));
        assert_eq!(auth.error_type(), ERROR_AUTH);
        let atyp = ServerError::from(HandshakeError::Parse(ParseError::InvalidAddressType(9)));
        assert_eq!(atyp.error_type(), ERROR_PROTOCOL);
        let short = ServerError::from(HandshakeError::from(AccumulateError::InsufficientData {
            needed: 18,
            got: 3,
        }));
        assert_eq!(short.error_type(), ERROR_PROTOCOL);
        let slow = ServerError::from(HandshakeError::Timeout(std::time::Duration::from_secs(10)));
        assert_eq!(slow.error_type(), ERROR_TIMEOUT);
        let dial = ServerError::from(DialError::AllAttemptsFailed { attempts: Vec::new() });
        assert_eq!(dial.error_type(), ERROR_DIAL);
    }

    #[test]
    fn handshake_reasons() {
        assert_eq!(
            HandshakeError::InsufficientData { needed: 1, got: 0 }.reason(),
            "insufficient_data"
        );
        assert_eq!(
            HandshakeError::Parse(ParseError::UnsupportedCommand(2)).reason(),
            "unsupported_command"
        );
    }
}
