//! Bidirectional pump between a client chunk channel and a remote stream.
//!
//! Metrics recording is abstracted via the `RelayMetrics` trait, allowing the
//! server to forward byte counts to Prometheus while tests count locally.
//!
//! Both directions run concurrently within a single future, so back-pressure
//! on one direction never stalls the other. A failure in one direction only
//! ends that direction; the other one is left to finish on its own.

use std::fmt;
use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::Instant;

use super::channel::{ChunkReceiver, ChunkSender};

/// Trait for recording relay metrics.
pub trait RelayMetrics {
    /// Record bytes forwarded client -> remote.
    fn record_upload(&self, bytes: u64);
    /// Record bytes forwarded remote -> client.
    fn record_download(&self, bytes: u64);
}

/// No-op metrics implementation for cases where metrics aren't needed.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpMetrics;

impl RelayMetrics for NoOpMetrics {
    #[inline]
    fn record_upload(&self, _bytes: u64) {}
    #[inline]
    fn record_download(&self, _bytes: u64) {}
}

/// Monotonic per-direction byte counters, readable while the pump runs.
#[derive(Debug, Default)]
pub struct TrafficCounters {
    upload: AtomicU64,
    download: AtomicU64,
}

impl TrafficCounters {
    pub fn upload(&self) -> u64 {
        self.upload.load(Ordering::Relaxed)
    }

    pub fn download(&self) -> u64 {
        self.download.load(Ordering::Relaxed)
    }
}

impl RelayMetrics for TrafficCounters {
    #[inline]
    fn record_upload(&self, bytes: u64) {
        self.upload.fetch_add(bytes, Ordering::Relaxed);
    }
    #[inline]
    fn record_download(&self, bytes: u64) {
        self.download.fetch_add(bytes, Ordering::Relaxed);
    }
}

/// How one direction of the pump ended.
#[derive(Debug)]
pub enum DirectionEnd {
    /// The reading side reached end-of-stream.
    Eof,
    /// Reading from the source failed.
    ReadError(io::Error),
    /// Writing to the destination failed.
    WriteError(io::Error),
    /// Neither direction moved within the idle timeout.
    IdleTimeout,
}

impl DirectionEnd {
    pub fn is_error(&self) -> bool {
        matches!(self, DirectionEnd::ReadError(_) | DirectionEnd::WriteError(_))
    }
}

impl fmt::Display for DirectionEnd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DirectionEnd::Eof => f.write_str("eof"),
            DirectionEnd::ReadError(e) => write!(f, "read error: {e}"),
            DirectionEnd::WriteError(e) => write!(f, "write error: {e}"),
            DirectionEnd::IdleTimeout => f.write_str("idle timeout"),
        }
    }
}

/// Final state of a finished pump.
#[derive(Debug)]
pub struct PumpReport {
    pub upload_bytes: u64,
    pub download_bytes: u64,
    pub upload_end: DirectionEnd,
    pub download_end: DirectionEnd,
}

impl PumpReport {
    /// Short cause of termination for the closing log line.
    pub fn termination_cause(&self) -> &'static str {
        match (&self.upload_end, &self.download_end) {
            (DirectionEnd::Eof, DirectionEnd::Eof) => "eof",
            (DirectionEnd::IdleTimeout, _) | (_, DirectionEnd::IdleTimeout) => "idle_timeout",
            (DirectionEnd::ReadError(_), _) => "client_read_error",
            (DirectionEnd::WriteError(_), _) => "remote_write_error",
            (_, DirectionEnd::ReadError(_)) => "remote_read_error",
            (_, DirectionEnd::WriteError(_)) => "client_write_error",
        }
    }
}

/// Tuning for one pump run.
#[derive(Debug, Clone, Copy)]
pub struct PumpOptions {
    /// Upper bound of one remote read.
    pub read_chunk: usize,
    /// Both directions end once neither moved a byte for this long.
    /// `None` disables the idle timer.
    pub idle_timeout: Option<Duration>,
}

/// Byte totals and the time of the last transfer in either direction.
struct Progress {
    started: Instant,
    last_ms: AtomicU64,
    upload: AtomicU64,
    download: AtomicU64,
}

impl Progress {
    fn new() -> Self {
        Self {
            started: Instant::now(),
            last_ms: AtomicU64::new(0),
            upload: AtomicU64::new(0),
            download: AtomicU64::new(0),
        }
    }

    fn touch(&self) {
        #[allow(clippy::cast_possible_truncation)]
        let ms = self.started.elapsed().as_millis() as u64;
        self.last_ms.fetch_max(ms, Ordering::Relaxed);
    }

    fn add_upload(&self, n: u64) {
        self.upload.fetch_add(n, Ordering::Relaxed);
        self.touch();
    }

    fn add_download(&self, n: u64) {
        self.download.fetch_add(n, Ordering::Relaxed);
        self.touch();
    }

    fn last_activity(&self) -> Instant {
        self.started + Duration::from_millis(self.last_ms.load(Ordering::Relaxed))
    }

    /// Resolves once `idle` has passed without any transfer.
    async fn idle_expired(&self, idle: Option<Duration>) {
        let Some(idle) = idle else {
            return std::future::pending().await;
        };
        loop {
            let deadline = self.last_activity() + idle;
            tokio::time::sleep_until(deadline).await;
            if self.last_activity() + idle <= Instant::now() {
                return;
            }
        }
    }
}

/// Relay bytes between a client and a remote connection until both
/// directions have ended or the pair stays idle past the idle timeout.
///
/// * Upload writes `leftover` first, then every client chunk to the remote,
///   and half-closes the remote's write side when done.
/// * Download writes `response_prefix` first, then every remote read to the
///   client, and closes the client sink when done so the transport adapter
///   can finalize its response.
///
/// On idle expiry every unfinished direction ends with
/// [`DirectionEnd::IdleTimeout`]: the remote write side is shut down and the
/// client sink is closed.
///
/// The upload counter includes `leftover`; the download counter excludes
/// `response_prefix`.
pub async fn pump<R, M>(
    source: ChunkReceiver,
    sink: ChunkSender,
    remote: R,
    leftover: Bytes,
    response_prefix: Bytes,
    options: PumpOptions,
    metrics: &M,
) -> PumpReport
where
    R: AsyncRead + AsyncWrite + Unpin,
    M: RelayMetrics,
{
    let (remote_r, mut remote_w) = tokio::io::split(remote);
    let progress = Progress::new();

    let (upload_end, download_end) = {
        let up = upload(source, &mut remote_w, leftover, &progress, metrics);
        let down = download(
            remote_r,
            sink,
            response_prefix,
            options.read_chunk.max(1),
            &progress,
            metrics,
        );
        tokio::pin!(up, down);

        let mut upload_end = None;
        let mut download_end = None;
        while upload_end.is_none() || download_end.is_none() {
            tokio::select! {
                end = &mut up, if upload_end.is_none() => upload_end = Some(end),
                end = &mut down, if download_end.is_none() => download_end = Some(end),
                _ = progress.idle_expired(options.idle_timeout) => break,
            }
        }
        (upload_end, download_end)
    };

    // Unfinished directions were dropped with their futures; the dropped
    // download closed the client sink.
    let upload_end = match upload_end {
        Some(end) => end,
        None => {
            let _ = remote_w.shutdown().await;
            DirectionEnd::IdleTimeout
        }
    };
    PumpReport {
        upload_bytes: progress.upload.load(Ordering::Relaxed),
        download_bytes: progress.download.load(Ordering::Relaxed),
        upload_end,
        download_end: download_end.unwrap_or(DirectionEnd::IdleTimeout),
    }
}

async fn upload<W, M>(
    mut source: ChunkReceiver,
    remote: &mut W,
    leftover: Bytes,
    progress: &Progress,
    metrics: &M,
) -> DirectionEnd
where
    W: AsyncWrite + Unpin,
    M: RelayMetrics,
{
    let end = async {
        if !leftover.is_empty() {
            if let Err(e) = remote.write_all(&leftover).await {
                return DirectionEnd::WriteError(e);
            }
            progress.add_upload(leftover.len() as u64);
            metrics.record_upload(leftover.len() as u64);
        }
        loop {
            let chunk = match source.recv().await {
                Ok(Some(chunk)) => chunk,
                Ok(None) => return DirectionEnd::Eof,
                Err(e) => return DirectionEnd::ReadError(e),
            };
            if let Err(e) = remote.write_all(&chunk).await {
                return DirectionEnd::WriteError(e);
            }
            progress.add_upload(chunk.len() as u64);
            metrics.record_upload(chunk.len() as u64);
        }
    }
    .await;
    // Half-close so the destination observes end of input.
    let _ = remote.shutdown().await;
    drop(source);
    end
}

async fn download<R, M>(
    mut remote: R,
    sink: ChunkSender,
    response_prefix: Bytes,
    read_chunk: usize,
    progress: &Progress,
    metrics: &M,
) -> DirectionEnd
where
    R: AsyncRead + Unpin,
    M: RelayMetrics,
{
    let end = async {
        if let Err(e) = sink.send(response_prefix).await {
            return DirectionEnd::WriteError(e);
        }
        let mut buf = BytesMut::with_capacity(read_chunk);
        loop {
            buf.reserve(read_chunk);
            match (&mut remote).take(read_chunk as u64).read_buf(&mut buf).await {
                Ok(0) => return DirectionEnd::Eof,
                Ok(n) => {
                    if let Err(e) = sink.send(buf.split().freeze()).await {
                        return DirectionEnd::WriteError(e);
                    }
                    progress.add_download(n as u64);
                    metrics.record_download(n as u64);
                }
                Err(e) => return DirectionEnd::ReadError(e),
            }
        }
    }
    .await;
    sink.close();
    end
}
