//! Incremental header accumulation.

use std::io;

use bytes::{Bytes, BytesMut};

use super::channel::ChunkReceiver;

/// Errors raised while buffering a header stage.
#[derive(Debug, thiserror::Error)]
pub enum AccumulateError {
    /// The source ended before enough bytes were available.
    #[error("stream ended after {got} bytes, {needed} required")]
    InsufficientData { needed: usize, got: usize },
    #[error("read: {0}")]
    Read(#[from] io::Error),
}

/// Pull chunks until at least `n` bytes have been read.
///
/// Returns everything read, which may exceed `n` when the last chunk
/// overshoots, plus whether end-of-stream was observed. Surplus bytes are
/// never dropped: they belong to the caller's next read window.
pub async fn read_at_least(
    source: &mut ChunkReceiver,
    n: usize,
) -> Result<(Bytes, bool), AccumulateError> {
    let mut chunks: Vec<Bytes> = Vec::new();
    let mut got = 0usize;
    let mut done = false;
    while got < n && !done {
        match source.recv().await? {
            Some(chunk) => {
                got += chunk.len();
                chunks.push(chunk);
            }
            None => done = true,
        }
    }
    if got < n {
        return Err(AccumulateError::InsufficientData { needed: n, got });
    }
    let mut iter = chunks.into_iter();
    let first = iter.next().unwrap_or_default();
    let rest: Vec<Bytes> = iter.collect();
    Ok((concat_bytes(first, &rest), done))
}

/// Concatenate `first` with `rest`.
///
/// With nothing to append the original buffer is returned untouched.
pub fn concat_bytes(first: Bytes, rest: &[Bytes]) -> Bytes {
    if rest.is_empty() {
        return first;
    }
    let len = first.len() + rest.iter().map(Bytes::len).sum::<usize>();
    let mut out = BytesMut::with_capacity(len);
    out.extend_from_slice(&first);
    for chunk in rest {
        out.extend_from_slice(chunk);
    }
    out.freeze()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::chunk_channel;

    #[test]
    fn test_concat_nothing_returns_original() {
        let empty = concat_bytes(Bytes::new(), &[]);
        assert!(empty.is_empty());

        let a = Bytes::from_static(&[1, 2]);
        let r = concat_bytes(a.clone(), &[]);
        assert_eq!(r, a);
        assert_eq!(r.len(), 2);
    }

    #[test]
    fn test_concat_two_and_interleaved_empty() {
        let a = Bytes::from_static(&[1, 2]);
        let b = Bytes::from_static(&[3, 4, 5]);
        assert_eq!(&concat_bytes(a.clone(), &[b.clone()])[..], &[1, 2, 3, 4, 5]);

        let r = concat_bytes(a.clone(), &[Bytes::new(), b.clone()]);
        assert_eq!(&r[..], &[1, 2, 3, 4, 5]);

        let r = concat_bytes(a, &[Bytes::from_static(&[7, 8]), b]);
        assert_eq!(&r[..], &[1, 2, 7, 8, 3, 4, 5]);
    }

    #[tokio::test]
    async fn test_read_at_least_keeps_overshoot() {
        let (tx, mut rx) = chunk_channel(1024);
        tx.send(Bytes::from_static(b"abc")).await.unwrap();
        tx.send(Bytes::from_static(b"defgh")).await.unwrap();

        let (bytes, eof) = read_at_least(&mut rx, 4).await.unwrap();
        assert_eq!(&bytes[..], b"abcdefgh");
        assert!(!eof);
    }

    #[tokio::test]
    async fn test_read_at_least_zero_reads_nothing() {
        let (tx, mut rx) = chunk_channel(1024);
        tx.send(Bytes::from_static(b"abc")).await.unwrap();
        let (bytes, eof) = read_at_least(&mut rx, 0).await.unwrap();
        assert!(bytes.is_empty());
        assert!(!eof);
        assert_eq!(rx.recv().await.unwrap().unwrap(), &b"abc"[..]);
    }

    #[tokio::test]
    async fn test_read_at_least_insufficient() {
        let (tx, mut rx) = chunk_channel(1024);
        tx.send(Bytes::from_static(b"ab")).await.unwrap();
        drop(tx);

        match read_at_least(&mut rx, 5).await {
            Err(AccumulateError::InsufficientData { needed, got }) => {
                assert_eq!(needed, 5);
                assert_eq!(got, 2);
            }
            other => panic!("unexpected result: {:?}", other.map(|(b, _)| b)),
        }
    }

    #[tokio::test]
    async fn test_read_at_least_propagates_read_error() {
        let (tx, mut rx) = chunk_channel(1024);
        tx.abort(io::Error::new(io::ErrorKind::ConnectionAborted, "gone"));
        assert!(matches!(
            read_at_least(&mut rx, 1).await,
            Err(AccumulateError::Read(_))
        ));
    }
}
