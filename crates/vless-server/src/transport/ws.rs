//! WebSocket adapter.
//!
//! One task owns the socket: its reading half pushes binary and text
//! payloads into the upload channel, its writing half sends every download
//! chunk as a binary message. When the session closes the download channel
//! a close frame is sent; the socket is released once both halves finish.

use std::io;

use axum::extract::ws::{Message, WebSocket};
use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use tracing::debug;
use vless_core::io::{ChunkReceiver, ChunkSender, chunk_channel};
use vless_core::transport::{ClientIo, ClientTransport};

pub struct WsTransport {
    io: ClientIo,
}

impl WsTransport {
    /// Take over an upgraded socket. Must be called inside a Tokio runtime.
    pub fn new(socket: WebSocket, window_bytes: usize) -> Self {
        let (up_tx, up_rx) = chunk_channel(window_bytes);
        let (down_tx, down_rx) = chunk_channel(window_bytes);
        tokio::spawn(drive(socket, up_tx, down_rx));
        Self {
            io: ClientIo {
                source: up_rx,
                sink: down_tx,
            },
        }
    }
}

impl ClientTransport for WsTransport {
    fn kind(&self) -> &'static str {
        "ws"
    }

    fn into_io(self) -> ClientIo {
        self.io
    }
}

async fn drive(socket: WebSocket, up_tx: ChunkSender, mut down_rx: ChunkReceiver) {
    let (mut ws_tx, mut ws_rx) = socket.split();

    let reading = async move {
        loop {
            let next = tokio::select! {
                _ = up_tx.closed() => None,
                msg = ws_rx.next() => Some(msg),
            };
            let chunk = match next {
                None | Some(None) => break,
                Some(Some(Ok(Message::Binary(data)))) => data,
                Some(Some(Ok(Message::Text(text)))) => {
                    Bytes::copy_from_slice(text.as_str().as_bytes())
                }
                Some(Some(Ok(Message::Close(_)))) => {
                    debug!("ws client closed");
                    break;
                }
                Some(Some(Ok(_))) => continue,
                Some(Some(Err(e))) => {
                    debug!(error = %e, "ws read error");
                    up_tx.abort(io::Error::other(e));
                    return;
                }
            };
            if up_tx.send(chunk).await.is_err() {
                break;
            }
        }
    };

    let writing = async move {
        loop {
            match down_rx.recv().await {
                Ok(Some(chunk)) => {
                    if let Err(e) = ws_tx.send(Message::Binary(chunk)).await {
                        debug!(error = %e, "ws write error");
                        return;
                    }
                }
                Ok(None) | Err(_) => break,
            }
        }
        debug!("ws writer closed");
        let _ = ws_tx.close().await;
    };

    tokio::join!(reading, writing);
}
