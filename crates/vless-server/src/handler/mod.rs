//! Session orchestration: handshake, dial, then the bidirectional pump.
//!
//! A session moves through [`SessionState`] `Handshaking -> Dialing ->
//! Piping -> Closed`. Failures before piping close the client sink and
//! drain whatever the client still sends; failures while piping are
//! contained per direction and only reported.

mod context;

pub use context::{SessionContext, SessionState};

use std::net::SocketAddr;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{Instrument, debug, info, warn};
use vless_core::io::{
    AccumulateError, ChunkReceiver, DrainOutcome, PumpOptions, PumpReport, RelayMetrics, drain,
    pump, read_at_least,
};
use vless_core::transport::{ClientIo, ClientTransport};
use vless_metrics::{
    record_download_bytes, record_drained_bytes, record_error, record_handshake_failure,
    record_upload_bytes,
};
use vless_proto::{ParseResult, RequestHeader, UserId, parse_request};

use crate::dial::{Connector, DialTarget, Dialer};
use crate::error::{HandshakeError, ServerError};

/// Settings every session reads.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub user_id: UserId,
    /// Upper bound of one remote read in the download loop.
    pub read_chunk: usize,
    /// How long a rejected client is drained before giving up.
    pub drain_timeout: Duration,
    /// Deadline for the complete request header.
    pub handshake_timeout: Duration,
    /// `None` keeps idle sessions open until either side closes.
    pub idle_timeout: Option<Duration>,
}

impl SessionSettings {
    pub fn pump_options(&self) -> PumpOptions {
        PumpOptions {
            read_chunk: self.read_chunk,
            idle_timeout: self.idle_timeout,
        }
    }
}

/// Outcome of a successful handshake and dial.
pub struct Established<S> {
    pub request: RequestHeader,
    /// Payload bytes that arrived together with the header.
    pub leftover: Bytes,
    pub remote: S,
    pub target: DialTarget,
}

/// How a full session ended.
#[derive(Debug)]
pub enum SessionOutcome {
    Completed(PumpReport),
    Rejected(ServerError),
}

/// Relay metrics forwarded to the Prometheus recorder.
struct SessionMetrics;

impl RelayMetrics for SessionMetrics {
    #[inline]
    fn record_upload(&self, bytes: u64) {
        record_upload_bytes(bytes);
    }

    #[inline]
    fn record_download(&self, bytes: u64) {
        record_download_bytes(bytes);
    }
}

/// Read and decode the request header from `source`.
///
/// Each `Incomplete` stage pulls just enough chunks to reach the size the
/// parser asked for. Bytes past the header are returned as leftover.
pub async fn read_request(
    source: &mut ChunkReceiver,
    user_id: &UserId,
) -> Result<(RequestHeader, Bytes), HandshakeError> {
    let mut buf = BytesMut::new();
    let mut eof = false;
    loop {
        match parse_request(&buf, user_id) {
            ParseResult::Complete(header) => {
                let leftover = buf.split_off(header.header_len).freeze();
                return Ok((header, leftover));
            }
            ParseResult::Incomplete(needed) => {
                let have = buf.len();
                if eof {
                    return Err(HandshakeError::InsufficientData { needed, got: have });
                }
                let (bytes, done) = read_at_least(source, needed - have)
                    .await
                    .map_err(|e| match e {
                        AccumulateError::InsufficientData { got, .. } => {
                            HandshakeError::InsufficientData {
                                needed,
                                got: have + got,
                            }
                        }
                        other => other.into(),
                    })?;
                buf.extend_from_slice(&bytes);
                eof = done;
            }
            ParseResult::Invalid(err) => return Err(err.into()),
        }
    }
}

/// Run the handshake and dial for one session.
///
/// Nothing is dialed unless the header decodes and the identifier matches
/// within `settings.handshake_timeout`.
pub async fn establish<C: Connector>(
    ctx: &SessionContext,
    source: &mut ChunkReceiver,
    settings: &SessionSettings,
    dialer: &Dialer<C>,
) -> Result<Established<C::Stream>, ServerError> {
    async {
        debug!(state = SessionState::Handshaking.as_str(), "session state");
        let limit = settings.handshake_timeout;
        let header = tokio::time::timeout(limit, read_request(source, &settings.user_id))
            .await
            .unwrap_or(Err(HandshakeError::Timeout(limit)));
        let (request, leftover) = match header {
            Ok(v) => v,
            Err(err) => {
                warn!(reason = err.reason(), error = %err, "handshake failed");
                record_handshake_failure(err.reason());
                return Err(ServerError::from(err));
            }
        };
        debug!(
            state = SessionState::Dialing.as_str(),
            dest = %request.address,
            leftover = leftover.len(),
            "session state"
        );
        let host = request.address.host.hostname();
        let (remote, target) = match dialer.dial(&host, request.address.port).await {
            Ok(v) => v,
            Err(err) => {
                warn!(dest = %request.address, error = %err, "dial failed");
                return Err(ServerError::from(err));
            }
        };
        Ok(Established {
            request,
            leftover,
            remote,
            target,
        })
    }
    .instrument(ctx.span())
    .await
}

/// Relay between the client halves and the established remote.
pub async fn pipe<S>(
    ctx: &SessionContext,
    client: ClientIo,
    established: Established<S>,
    options: PumpOptions,
) -> PumpReport
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    async {
        debug!(
            state = SessionState::Piping.as_str(),
            via = %established.target,
            kind = established.target.kind.as_str(),
            "session state"
        );
        let prefix = Bytes::copy_from_slice(&established.request.response_prefix());
        let report = pump(
            client.source,
            client.sink,
            established.remote,
            established.leftover,
            prefix,
            options,
            &SessionMetrics,
        )
        .await;
        info!(
            state = SessionState::Closed.as_str(),
            upload_bytes = report.upload_bytes,
            download_bytes = report.download_bytes,
            upload_end = %report.upload_end,
            download_end = %report.download_end,
            cause = report.termination_cause(),
            duration_ms = ctx.elapsed().as_millis() as u64,
            "session closed"
        );
        report
    }
    .instrument(ctx.span())
    .await
}

/// Discard what a rejected client still sends, bounded by `limit`.
pub async fn reject(ctx: &SessionContext, source: ChunkReceiver, limit: Duration) -> DrainOutcome {
    async {
        let outcome = drain(source, limit).await;
        record_drained_bytes(outcome.discarded);
        debug!(
            state = SessionState::Closed.as_str(),
            discarded = outcome.discarded,
            completed = outcome.completed,
            "rejected client drained"
        );
        outcome
    }
    .instrument(ctx.span())
    .await
}

/// Drive one session over a full-duplex transport from handshake to close.
///
/// The session is labelled with the transport's [`ClientTransport::kind`].
pub async fn run_session<T, C>(
    peer: SocketAddr,
    transport: T,
    settings: &SessionSettings,
    dialer: &Dialer<C>,
) -> SessionOutcome
where
    T: ClientTransport,
    C: Connector,
{
    let ctx = SessionContext::new(peer, transport.kind());
    ctx.span()
        .in_scope(|| info!("accept {} client", ctx.transport()));
    let ClientIo { mut source, sink } = transport.into_io();
    match establish(&ctx, &mut source, settings, dialer).await {
        Ok(established) => {
            let options = settings.pump_options();
            let report = pipe(&ctx, ClientIo { source, sink }, established, options).await;
            SessionOutcome::Completed(report)
        }
        Err(err) => {
            record_error(err.error_type());
            // Closing the sink lets the adapter finish its side while the
            // remaining input is discarded.
            sink.close();
            reject(&ctx, source, settings.drain_timeout).await;
            SessionOutcome::Rejected(err)
        }
    }
}
