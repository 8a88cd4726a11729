//! Shared state handed to every request.

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;
use vless_config::Config;
use vless_proto::UserId;

use crate::dial::{Dialer, FallbackHosts, TcpConnector};
use crate::doh::DohForwarder;
use crate::error::ServerError;
use crate::handler::SessionSettings;
use crate::padding::PaddingSpec;
use crate::util::ConnectionTracker;

/// Immutable server state built once from the resolved configuration.
pub struct ServerState {
    pub settings: SessionSettings,
    pub dialer: Dialer<TcpConnector>,
    /// In-flight byte window per direction.
    pub window_bytes: usize,
    pub ws_path: String,
    pub ws_max_frame_bytes: usize,
    pub xhttp_path: String,
    pub padding: Option<PaddingSpec>,
    pub doh_path: String,
    pub doh: Option<DohForwarder>,
    pub ip_query_path: String,
    /// Configured identifier as written, compared against `?uuid=`.
    pub uuid: String,
    pub tracker: ConnectionTracker,
    pub shutdown_timeout: Duration,
}

impl ServerState {
    pub fn from_config(config: &Config) -> Result<Self, ServerError> {
        let user_id = UserId::parse(&config.server.uuid)
            .map_err(|e| ServerError::Config(format!("uuid: {e}")))?;
        let fallbacks = FallbackHosts::parse(&config.server.proxy);
        debug!(fallbacks = fallbacks.hosts().len(), "fallback hosts loaded");

        let dialer = Dialer::new(
            TcpConnector::new(config.server.tcp.clone()),
            fallbacks,
            Duration::from_millis(config.server.dial_timeout_ms),
        );

        let doh = if config.doh.path.is_empty() {
            None
        } else {
            Some(DohForwarder::new(
                config.doh.upstream.clone(),
                Duration::from_secs(config.doh.timeout_secs),
            )?)
        };

        let window_bytes = config.server.window_bytes();
        Ok(Self {
            settings: SessionSettings {
                user_id,
                read_chunk: vless_core::defaults::DEFAULT_READ_CHUNK_SIZE,
                drain_timeout: Duration::from_secs(config.server.drain_timeout_secs),
                handshake_timeout: Duration::from_secs(config.server.handshake_timeout_secs),
                idle_timeout: match config.server.idle_timeout_secs {
                    0 => None,
                    secs => Some(Duration::from_secs(secs)),
                },
            },
            dialer,
            window_bytes,
            ws_path: config.websocket.path.clone(),
            ws_max_frame_bytes: config.websocket.max_frame_bytes,
            xhttp_path: config.xhttp.path.clone(),
            padding: PaddingSpec::parse(&config.xhttp.padding_range),
            doh_path: config.doh.path.clone(),
            doh,
            ip_query_path: config.ip_query.path.clone(),
            uuid: config.server.uuid.trim().to_string(),
            tracker: ConnectionTracker::new(),
            shutdown_timeout: Duration::from_secs(config.server.shutdown_timeout_secs),
        })
    }

    pub fn into_shared(self) -> Arc<Self> {
        Arc::new(self)
    }
}
