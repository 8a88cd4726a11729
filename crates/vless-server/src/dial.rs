//! Outbound dialing with direct-then-fallback policy.
//!
//! The candidate list always starts with the requested host. When fallback
//! hosts are configured, one of them is picked uniformly at random and
//! appended. Candidates are tried in order, each bounded by the same
//! timeout; the first connection that opens wins.

use std::fmt;
use std::io;
use std::time::Duration;

use async_trait::async_trait;
use rand::seq::SliceRandom;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tracing::{debug, info};
use vless_config::TcpConfig;
use vless_metrics::record_dial_attempt;

use crate::error::DialError;
use crate::util::connect_with_buffers;

/// Opens outbound byte streams.
#[async_trait]
pub trait Connector: Send + Sync {
    type Stream: AsyncRead + AsyncWrite + Unpin + Send + 'static;

    async fn connect(&self, host: &str, port: u16) -> io::Result<Self::Stream>;
}

/// Plain TCP connector honouring the outbound socket options.
#[derive(Debug, Clone, Default)]
pub struct TcpConnector {
    tcp: TcpConfig,
}

impl TcpConnector {
    pub fn new(tcp: TcpConfig) -> Self {
        Self { tcp }
    }
}

#[async_trait]
impl Connector for TcpConnector {
    type Stream = TcpStream;

    async fn connect(&self, host: &str, port: u16) -> io::Result<TcpStream> {
        let mut last_err = None;
        for addr in tokio::net::lookup_host((host, port)).await? {
            match connect_with_buffers(
                addr,
                self.tcp.send_buffer,
                self.tcp.recv_buffer,
                self.tcp.no_delay,
            )
            .await
            {
                Ok(stream) => return Ok(stream),
                Err(e) => last_err = Some(e),
            }
        }
        Err(last_err.unwrap_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, format!("no address for {host}"))
        }))
    }
}

/// Whether a candidate is the requested host or a relay host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialKind {
    Direct,
    Fallback,
}

impl DialKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DialKind::Direct => "direct",
            DialKind::Fallback => "fallback",
        }
    }
}

/// One entry of the ordered candidate list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DialTarget {
    pub host: String,
    pub port: u16,
    pub kind: DialKind,
}

impl fmt::Display for DialTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]:{}", self.host, self.port)
    }
}

/// A failed candidate.
#[derive(Debug)]
pub struct DialAttempt {
    pub host: String,
    pub port: u16,
    pub kind: DialKind,
    pub error: io::Error,
}

/// Configured relay hosts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FallbackHosts(Vec<String>);

impl FallbackHosts {
    /// Split on runs of spaces, commas, CR and LF; empty tokens are dropped.
    pub fn parse(list: &str) -> Self {
        Self(
            list.split([' ', ',', '\n', '\r'])
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
        )
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn hosts(&self) -> &[String] {
        &self.0
    }

    /// Uniformly random host, if any are configured.
    pub fn pick(&self) -> Option<&str> {
        self.0.choose(&mut rand::thread_rng()).map(String::as_str)
    }
}

/// Ordered candidates for one request: the host itself, then at most one
/// randomly chosen relay host on the same port.
pub fn candidates(host: &str, port: u16, fallbacks: &FallbackHosts) -> Vec<DialTarget> {
    let mut list = vec![DialTarget {
        host: host.to_string(),
        port,
        kind: DialKind::Direct,
    }];
    if let Some(relay) = fallbacks.pick() {
        list.push(DialTarget {
            host: relay.to_string(),
            port,
            kind: DialKind::Fallback,
        });
    }
    list
}

/// Connect to the first candidate that opens within `timeout`.
///
/// An attempt that exceeds its budget is abandoned; its late completion,
/// if any, is dropped with the future.
pub async fn dial<C: Connector>(
    connector: &C,
    host: &str,
    port: u16,
    fallbacks: &FallbackHosts,
    timeout: Duration,
) -> Result<(C::Stream, DialTarget), DialError> {
    let mut attempts = Vec::new();
    for target in candidates(host, port, fallbacks) {
        match target.kind {
            DialKind::Direct => info!(dest = %target, "direct connect"),
            DialKind::Fallback => {
                info!(dest = %target, requested = %format_args!("[{host}]:{port}"), "connect through relay")
            }
        }
        let result = match tokio::time::timeout(timeout, connector.connect(&target.host, port)).await
        {
            Ok(r) => r,
            Err(_) => Err(io::Error::new(
                io::ErrorKind::TimedOut,
                format!("connect timed out after {}ms", timeout.as_millis()),
            )),
        };
        record_dial_attempt(target.kind.as_str(), result.is_ok());
        match result {
            Ok(stream) => return Ok((stream, target)),
            Err(error) => {
                debug!(dest = %target, kind = target.kind.as_str(), error = %error, "connect failed");
                attempts.push(DialAttempt {
                    host: target.host,
                    port: target.port,
                    kind: target.kind,
                    error,
                });
            }
        }
    }
    Err(DialError::AllAttemptsFailed { attempts })
}

/// Connector bundled with its fallback list and per-attempt budget.
#[derive(Debug, Clone)]
pub struct Dialer<C> {
    connector: C,
    fallbacks: FallbackHosts,
    timeout: Duration,
}

impl<C: Connector> Dialer<C> {
    pub fn new(connector: C, fallbacks: FallbackHosts, timeout: Duration) -> Self {
        Self {
            connector,
            fallbacks,
            timeout,
        }
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    pub fn fallbacks(&self) -> &FallbackHosts {
        &self.fallbacks
    }

    pub async fn dial(&self, host: &str, port: u16) -> Result<(C::Stream, DialTarget), DialError> {
        dial(&self.connector, host, port, &self.fallbacks, self.timeout).await
    }
}
