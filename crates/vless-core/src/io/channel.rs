//! Bounded chunk channel between a transport adapter and the session.
//!
//! The bound is expressed in bytes rather than in messages: a sender must
//! acquire window permits for every chunk it queues, and those permits are
//! released as soon as the receiver takes the chunk out. A window of zero
//! degrades to a single chunk in flight.

use std::io;
use std::sync::Arc;

use bytes::Bytes;
use futures_util::Stream;
use tokio::sync::{OwnedSemaphorePermit, Semaphore, mpsc};

enum Item {
    Chunk(Bytes, OwnedSemaphorePermit),
    Error(io::Error),
}

/// Create a chunk channel allowing at most `window_bytes` queued bytes.
///
/// Chunks larger than the window are still accepted, one at a time.
pub fn chunk_channel(window_bytes: usize) -> (ChunkSender, ChunkReceiver) {
    #[allow(clippy::cast_possible_truncation)]
    let capacity = window_bytes.clamp(1, u32::MAX as usize) as u32;
    let window = Arc::new(Semaphore::new(capacity as usize));
    let (tx, rx) = mpsc::unbounded_channel();
    (
        ChunkSender {
            tx,
            window: window.clone(),
            capacity,
        },
        ChunkReceiver { rx, window },
    )
}

/// Producing end of a chunk channel.
///
/// Dropping (or [`close`](ChunkSender::close)-ing) the sender signals
/// end-of-stream to the receiver.
pub struct ChunkSender {
    tx: mpsc::UnboundedSender<Item>,
    window: Arc<Semaphore>,
    capacity: u32,
}

impl ChunkSender {
    /// Queue a chunk, waiting for window space.
    ///
    /// Empty chunks are skipped. Fails with `BrokenPipe` once the receiver
    /// is gone.
    pub async fn send(&self, chunk: Bytes) -> io::Result<()> {
        if chunk.is_empty() {
            return Ok(());
        }
        #[allow(clippy::cast_possible_truncation)]
        let need = chunk.len().min(self.capacity as usize) as u32;
        let permit = self
            .window
            .clone()
            .acquire_many_owned(need)
            .await
            .map_err(|_| receiver_gone())?;
        self.tx
            .send(Item::Chunk(chunk, permit))
            .map_err(|_| receiver_gone())
    }

    /// Terminate the stream with an error observed by the receiver.
    pub fn abort(self, err: io::Error) {
        let _ = self.tx.send(Item::Error(err));
    }

    /// Signal end-of-stream.
    pub fn close(self) {}

    /// Resolves once the receiver has been dropped.
    pub async fn closed(&self) {
        self.tx.closed().await;
    }
}

/// Consuming end of a chunk channel.
///
/// Dropping the receiver tells the producer that nobody reads anymore.
pub struct ChunkReceiver {
    rx: mpsc::UnboundedReceiver<Item>,
    window: Arc<Semaphore>,
}

impl ChunkReceiver {
    /// Next chunk, `Ok(None)` at end-of-stream.
    pub async fn recv(&mut self) -> io::Result<Option<Bytes>> {
        match self.rx.recv().await {
            Some(Item::Chunk(data, permit)) => {
                drop(permit);
                Ok(Some(data))
            }
            Some(Item::Error(err)) => Err(err),
            None => Ok(None),
        }
    }

    /// Adapt the receiver into a `Stream`, e.g. for a streaming response body.
    pub fn into_stream(self) -> impl Stream<Item = io::Result<Bytes>> + Send + 'static {
        futures_util::stream::unfold(Some(self), |state| async move {
            let mut rx = state?;
            match rx.recv().await {
                Ok(Some(chunk)) => Some((Ok(chunk), Some(rx))),
                Ok(None) => None,
                Err(err) => Some((Err(err), None)),
            }
        })
    }
}

impl Drop for ChunkReceiver {
    fn drop(&mut self) {
        // Wake senders blocked on window space.
        self.window.close();
    }
}

fn receiver_gone() -> io::Error {
    io::Error::new(io::ErrorKind::BrokenPipe, "chunk receiver closed")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_chunks_arrive_in_order() {
        let (tx, mut rx) = chunk_channel(1024);
        tx.send(Bytes::from_static(b"one")).await.unwrap();
        tx.send(Bytes::from_static(b"two")).await.unwrap();
        tx.close();

        assert_eq!(rx.recv().await.unwrap().unwrap(), &b"one"[..]);
        assert_eq!(rx.recv().await.unwrap().unwrap(), &b"two"[..]);
        assert!(rx.recv().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_window_applies_backpressure() {
        let (tx, mut rx) = chunk_channel(4);
        tx.send(Bytes::from_static(b"abcd")).await.unwrap();

        // Window is full, the next send must wait for the receiver.
        let blocked = tokio::time::timeout(Duration::from_millis(50), tx.send(Bytes::from_static(b"e"))).await;
        assert!(blocked.is_err());

        assert_eq!(rx.recv().await.unwrap().unwrap(), &b"abcd"[..]);
        tokio::time::timeout(Duration::from_secs(1), tx.send(Bytes::from_static(b"e")))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(rx.recv().await.unwrap().unwrap(), &b"e"[..]);
    }

    #[tokio::test]
    async fn test_zero_window_allows_one_chunk() {
        let (tx, mut rx) = chunk_channel(0);
        tx.send(Bytes::from(vec![7u8; 4096])).await.unwrap();
        let blocked = tokio::time::timeout(Duration::from_millis(50), tx.send(Bytes::from_static(b"x"))).await;
        assert!(blocked.is_err());
        assert_eq!(rx.recv().await.unwrap().unwrap().len(), 4096);
    }

    #[tokio::test]
    async fn test_oversized_chunk_is_accepted() {
        let (tx, mut rx) = chunk_channel(8);
        tx.send(Bytes::from(vec![1u8; 100])).await.unwrap();
        assert_eq!(rx.recv().await.unwrap().unwrap().len(), 100);
    }

    #[tokio::test]
    async fn test_empty_chunks_are_skipped() {
        let (tx, mut rx) = chunk_channel(16);
        tx.send(Bytes::new()).await.unwrap();
        tx.send(Bytes::from_static(b"z")).await.unwrap();
        drop(tx);
        assert_eq!(rx.recv().await.unwrap().unwrap(), &b"z"[..]);
        assert!(rx.recv().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_abort_surfaces_error() {
        let (tx, mut rx) = chunk_channel(16);
        tx.send(Bytes::from_static(b"ok")).await.unwrap();
        tx.abort(io::Error::new(io::ErrorKind::ConnectionReset, "reset"));

        assert!(rx.recv().await.unwrap().is_some());
        let err = rx.recv().await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::ConnectionReset);
    }

    #[tokio::test]
    async fn test_send_fails_after_receiver_dropped() {
        let (tx, rx) = chunk_channel(16);
        drop(rx);
        let err = tx.send(Bytes::from_static(b"late")).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
    }

    #[tokio::test]
    async fn test_blocked_sender_wakes_when_receiver_dropped() {
        let (tx, rx) = chunk_channel(2);
        tx.send(Bytes::from_static(b"ab")).await.unwrap();
        let pending = tokio::spawn(async move { tx.send(Bytes::from_static(b"c")).await });
        tokio::task::yield_now().await;
        drop(rx);
        let err = pending.await.unwrap().unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
    }

    #[tokio::test]
    async fn test_into_stream() {
        use futures_util::StreamExt;

        let (tx, rx) = chunk_channel(64);
        tx.send(Bytes::from_static(b"a")).await.unwrap();
        tx.send(Bytes::from_static(b"b")).await.unwrap();
        drop(tx);

        let collected: Vec<Bytes> = rx
            .into_stream()
            .map(|r| r.unwrap())
            .collect()
            .await;
        assert_eq!(collected, vec![Bytes::from_static(b"a"), Bytes::from_static(b"b")]);
    }
}
