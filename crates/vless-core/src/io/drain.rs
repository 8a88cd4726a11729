//! Draining of rejected clients.
//!
//! A client whose handshake failed must not see an abrupt close: whatever
//! it still sends is read and discarded until its stream ends, so that an
//! upstream proxy or load balancer is never left mid-request.

use std::time::Duration;

use super::channel::ChunkReceiver;

/// What happened while draining.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrainOutcome {
    /// Bytes read and discarded.
    pub discarded: u64,
    /// Whether the source reached end-of-stream (or failed) within the limit.
    pub completed: bool,
}

/// Read and discard `source` until it ends, errors, or `limit` elapses.
pub async fn drain(mut source: ChunkReceiver, limit: Duration) -> DrainOutcome {
    let mut discarded = 0u64;
    let completed = tokio::time::timeout(limit, async {
        while let Ok(Some(chunk)) = source.recv().await {
            discarded += chunk.len() as u64;
        }
    })
    .await
    .is_ok();
    DrainOutcome {
        discarded,
        completed,
    }
}
