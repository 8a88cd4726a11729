//! XHTTP stream-one adapter.
//!
//! The request body is the upload stream and the response body is the
//! download stream. Closing the download channel ends the response.

use std::io;

use axum::body::Body;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use futures_util::StreamExt;
use vless_core::io::{ChunkReceiver, ChunkSender, chunk_channel};
use vless_core::transport::{ClientIo, ClientTransport};

pub struct XhttpTransport {
    io: ClientIo,
    response: ChunkReceiver,
}

impl XhttpTransport {
    /// Start pulling `body` into the upload channel.
    pub fn new(body: Body, window_bytes: usize) -> Self {
        let (up_tx, up_rx) = chunk_channel(window_bytes);
        let (down_tx, down_rx) = chunk_channel(window_bytes);
        tokio::spawn(forward_body(body, up_tx));
        Self {
            io: ClientIo {
                source: up_rx,
                sink: down_tx,
            },
            response: down_rx,
        }
    }

    /// Separate the session halves from the pending response.
    pub fn split(self) -> (ClientIo, XhttpResponse) {
        (
            self.io,
            XhttpResponse {
                body: self.response,
            },
        )
    }
}

impl ClientTransport for XhttpTransport {
    fn kind(&self) -> &'static str {
        "xhttp"
    }

    fn into_io(self) -> ClientIo {
        self.io
    }
}

/// Streamed response carrying the download direction.
pub struct XhttpResponse {
    body: ChunkReceiver,
}

impl XhttpResponse {
    pub fn into_response(self, padding: Option<String>) -> Response {
        let mut resp = (
            StatusCode::OK,
            Body::from_stream(self.body.into_stream()),
        )
            .into_response();
        let headers = resp.headers_mut();
        headers.insert("x-accel-buffering", HeaderValue::from_static("no"));
        headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
        headers.insert(header::USER_AGENT, HeaderValue::from_static("Go-http-client/2.0"));
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/grpc"));
        if let Some(value) = padding.and_then(|p| HeaderValue::from_str(&p).ok()) {
            headers.insert("x-padding", value);
        }
        resp
    }
}

async fn forward_body(body: Body, tx: ChunkSender) {
    let mut stream = body.into_data_stream();
    loop {
        let next = tokio::select! {
            _ = tx.closed() => None,
            item = stream.next() => Some(item),
        };
        match next {
            None | Some(None) => break,
            Some(Some(Ok(chunk))) => {
                if tx.send(chunk).await.is_err() {
                    break;
                }
            }
            Some(Some(Err(e))) => {
                tx.abort(io::Error::other(e));
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;

    #[tokio::test]
    async fn body_flows_into_source() {
        let transport = XhttpTransport::new(Body::from("hello world"), 1024);
        assert_eq!(transport.kind(), "xhttp");
        let (mut io, _response) = transport.split();
        let mut got = Vec::new();
        while let Some(chunk) = io.source.recv().await.unwrap() {
            got.extend_from_slice(&chunk);
        }
        assert_eq!(got, b"hello world");
    }

    #[tokio::test]
    async fn response_streams_sink_until_closed() {
        let (io, response) = XhttpTransport::new(Body::empty(), 1024).split();
        let resp = response.into_response(Some("000".into()));
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()["content-type"], "application/grpc");
        assert_eq!(resp.headers()["x-padding"], "000");
        assert_eq!(resp.headers()["cache-control"], "no-store");

        io.sink.send(Bytes::from_static(&[0, 0])).await.unwrap();
        io.sink.send(Bytes::from_static(b"data")).await.unwrap();
        io.sink.close();
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"\0\0data");
    }

    #[tokio::test]
    async fn no_padding_header_when_disabled() {
        let (_io, response) = XhttpTransport::new(Body::empty(), 1024).split();
        let resp = response.into_response(None);
        assert!(resp.headers().get("x-padding").is_none());
    }
}
