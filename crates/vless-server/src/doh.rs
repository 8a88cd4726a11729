//! DNS-over-HTTPS forwarding.
//!
//! Three request shapes are relayed to the upstream resolver:
//! `POST` with an `application/dns-message` body, `GET` asking for
//! `application/dns-json`, and `GET` with a `dns=` query parameter.

use std::collections::HashMap;
use std::time::Duration;

use axum::body::Body;
use axum::extract::Query;
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode, Uri, header};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use reqwest::Client;
use tracing::info;
use vless_metrics::record_doh_request;

use crate::error::ServerError;

pub const MIME_DNS_MESSAGE: &str = "application/dns-message";
pub const MIME_DNS_JSON: &str = "application/dns-json";

/// Largest request body accepted for a POST query.
pub const MAX_DOH_BODY_BYTES: usize = 64 * 1024;

/// Request shape recognised for forwarding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DohQuery {
    /// Binary DNS message in the request body.
    Post,
    /// JSON API query; the full query string is forwarded.
    Json { query: String },
    /// Base64url DNS message in the `dns` parameter.
    Param { dns: String },
}

impl DohQuery {
    /// Classify a request; `None` means it is not a DoH query.
    pub fn classify(method: &Method, headers: &HeaderMap, uri: &Uri) -> Option<Self> {
        let header_is = |name: header::HeaderName, value: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .is_some_and(|v| v == value)
        };
        if method == Method::POST {
            return header_is(header::CONTENT_TYPE, MIME_DNS_MESSAGE).then_some(DohQuery::Post);
        }
        if method != Method::GET {
            return None;
        }
        if header_is(header::ACCEPT, MIME_DNS_JSON) {
            return Some(DohQuery::Json {
                query: uri.query().unwrap_or_default().to_string(),
            });
        }
        let params: Query<HashMap<String, String>> = Query::try_from_uri(uri).ok()?;
        params
            .0
            .get("dns")
            .filter(|v| !v.is_empty())
            .map(|dns| DohQuery::Param { dns: dns.clone() })
    }
}

/// Forwards queries to one upstream resolver.
#[derive(Debug, Clone)]
pub struct DohForwarder {
    client: Client,
    upstream: String,
}

impl DohForwarder {
    pub fn new(upstream: impl Into<String>, timeout: Duration) -> Result<Self, ServerError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            upstream: upstream.into(),
        })
    }

    pub fn upstream(&self) -> &str {
        &self.upstream
    }

    /// Send `query` upstream and relay status, content type and body.
    pub async fn forward(&self, query: DohQuery, body: Bytes) -> Result<Response, ServerError> {
        let request = match query {
            DohQuery::Post => {
                info!("handle DoH POST request");
                self.client
                    .post(&self.upstream)
                    .header(header::ACCEPT, MIME_DNS_MESSAGE)
                    .header(header::CONTENT_TYPE, MIME_DNS_MESSAGE)
                    .body(body)
            }
            DohQuery::Json { query } => {
                info!("handle DoH GET json request");
                let url = if query.is_empty() {
                    self.upstream.clone()
                } else {
                    format!("{}?{}", self.upstream, query)
                };
                self.client.get(url).header(header::ACCEPT, MIME_DNS_JSON)
            }
            DohQuery::Param { dns } => {
                info!("handle DoH GET param request");
                self.client
                    .get(format!("{}?dns={}", self.upstream, dns))
                    .header(header::ACCEPT, MIME_DNS_MESSAGE)
            }
        };

        let upstream = request.send().await?;
        let status = upstream.status().as_u16();
        record_doh_request(status);
        let content_type = upstream.headers().get(reqwest::header::CONTENT_TYPE).cloned();
        let bytes = upstream.bytes().await?;

        let mut resp = (
            StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY),
            Body::from(bytes),
        )
            .into_response();
        if let Some(ct) = content_type.and_then(|v| HeaderValue::from_bytes(v.as_bytes()).ok()) {
            resp.headers_mut().insert(header::CONTENT_TYPE, ct);
        }
        Ok(resp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(pairs: &[(header::HeaderName, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (k, v) in pairs {
            map.insert(k.clone(), HeaderValue::from_static(v));
        }
        map
    }

    #[test]
    fn classify_post_requires_dns_message() {
        let uri: Uri = "/dns-query/".parse().unwrap();
        assert_eq!(
            DohQuery::classify(
                &Method::POST,
                &headers(&[(header::CONTENT_TYPE, MIME_DNS_MESSAGE)]),
                &uri
            ),
            Some(DohQuery::Post)
        );
        assert_eq!(
            DohQuery::classify(
                &Method::POST,
                &headers(&[(header::CONTENT_TYPE, "text/plain")]),
                &uri
            ),
            None
        );
    }

    #[test]
    fn classify_get_forms() {
        let json_uri: Uri = "/dns-query/?name=example.com&type=A".parse().unwrap();
        assert_eq!(
            DohQuery::classify(
                &Method::GET,
                &headers(&[(header::ACCEPT, MIME_DNS_JSON)]),
                &json_uri
            ),
            Some(DohQuery::Json {
                query: "name=example.com&type=A".into()
            })
        );

        let param_uri: Uri = "/dns-query/?dns=AAABAAAB".parse().unwrap();
        assert_eq!(
            DohQuery::classify(&Method::GET, &HeaderMap::new(), &param_uri),
            Some(DohQuery::Param {
                dns: "AAABAAAB".into()
            })
        );

        let bare: Uri = "/dns-query/".parse().unwrap();
        assert_eq!(DohQuery::classify(&Method::GET, &HeaderMap::new(), &bare), None);
        assert_eq!(DohQuery::classify(&Method::PUT, &HeaderMap::new(), &bare), None);
    }

    #[tokio::test]
    async fn forward_relays_upstream_response() {
        use axum::Router;
        use axum::routing::post;

        let app = Router::new().route(
            "/dns-query",
            post(|headers: HeaderMap, body: Bytes| async move {
                assert_eq!(headers[header::CONTENT_TYPE], MIME_DNS_MESSAGE);
                let mut reply = body.to_vec();
                reply.reverse();
                ([(header::CONTENT_TYPE, MIME_DNS_MESSAGE)], reply)
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await });

        let fwd = DohForwarder::new(
            format!("http://{addr}/dns-query"),
            Duration::from_secs(5),
        )
        .unwrap();
        let resp = fwd
            .forward(DohQuery::Post, Bytes::from_static(&[1, 2, 3]))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()[header::CONTENT_TYPE], MIME_DNS_MESSAGE);
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], &[3, 2, 1]);
    }
}
