//! Client transport capability.
//!
//! Every transport adapter (WebSocket upgrade, streamed HTTP body, ...) turns
//! its platform-specific duplex channel into the same pair of chunk channels.
//! The session only depends on this interface, never on a concrete adapter.

use crate::io::{ChunkReceiver, ChunkSender, chunk_channel};

/// Client-facing halves handed to the session.
///
/// * `source` yields what the client sent.
/// * `sink` carries what goes back to the client. Dropping or closing it is
///   the close notification: the adapter then finalizes its response
///   (closing a socket or ending a streamed body).
pub struct ClientIo {
    pub source: ChunkReceiver,
    pub sink: ChunkSender,
}

/// A transport adapter that can be detached into client halves.
pub trait ClientTransport: Send {
    /// Short label used in logs and metrics.
    fn kind(&self) -> &'static str;

    /// Detach the byte source and sink.
    fn into_io(self) -> ClientIo;
}

impl ClientTransport for ClientIo {
    fn kind(&self) -> &'static str {
        "memory"
    }

    fn into_io(self) -> ClientIo {
        self
    }
}

/// Two cross-connected in-memory endpoints.
///
/// Whatever one side sends through its sink arrives at the other side's
/// source. Used by tests and by in-process tooling.
pub fn memory_pair(window_bytes: usize) -> (ClientIo, ClientIo) {
    let (a_tx, a_rx) = chunk_channel(window_bytes);
    let (b_tx, b_rx) = chunk_channel(window_bytes);
    (
        ClientIo {
            source: a_rx,
            sink: b_tx,
        },
        ClientIo {
            source: b_rx,
            sink: a_tx,
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    #[tokio::test]
    async fn test_memory_pair_crosses_channels() {
        let (left, right) = memory_pair(64);
        let ClientIo {
            source: mut left_rx,
            sink: left_tx,
        } = left.into_io();
        let ClientIo {
            source: mut right_rx,
            sink: right_tx,
        } = right;

        left_tx.send(Bytes::from_static(b"ping")).await.unwrap();
        right_tx.send(Bytes::from_static(b"pong")).await.unwrap();

        assert_eq!(right_rx.recv().await.unwrap().unwrap(), &b"ping"[..]);
        assert_eq!(left_rx.recv().await.unwrap().unwrap(), &b"pong"[..]);
    }
}
