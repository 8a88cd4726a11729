//! HTTP front: a single dispatch handler for every request.
//!
//! Order of checks: WebSocket upgrade, XHTTP `POST`, DoH, JSON endpoints
//! for plain `GET`, then the generic rejection. Feature paths are matched
//! as suffixes of the request path with a trailing `/` appended.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::body::{Body, Bytes};
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{ConnectInfo, FromRequestParts, Query, Request, State};
use axum::http::request::Parts;
use axum::http::{Method, StatusCode, header};
use axum::response::{IntoResponse, Response};
use tracing::{info, warn};
use vless_config::append_slash;
use vless_core::transport::{ClientIo, ClientTransport};
use vless_metrics::record_error;

use crate::doh::{DohQuery, MAX_DOH_BODY_BYTES};
use crate::handler::{SessionContext, establish, pipe, reject, run_session};
use crate::info::{ClientKind, IpInfo, client_config};
use crate::state::ServerState;
use crate::transport::{WsTransport, XhttpTransport};

/// Build the router serving every feature of the server.
pub fn build_router(state: Arc<ServerState>) -> Router {
    Router::new().fallback(dispatch).with_state(state)
}

/// Generic rejection: `404` with an empty body.
fn not_found() -> Response {
    StatusCode::NOT_FOUND.into_response()
}

/// Whether `path` (normalised with a trailing `/`) ends with `feature`.
/// An empty `feature` is a disabled feature and never matches.
pub fn path_matches(path: &str, feature: &str) -> bool {
    !feature.is_empty() && append_slash(path).ends_with(feature)
}

/// Host name of the request without any port.
fn request_host(parts: &Parts) -> String {
    let raw = parts
        .headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .or_else(|| parts.uri.host())
        .unwrap_or_default();
    strip_port(raw).to_string()
}

fn strip_port(authority: &str) -> &str {
    if authority.starts_with('[') {
        return match authority.find(']') {
            Some(end) => &authority[..=end],
            None => authority,
        };
    }
    authority.split(':').next().unwrap_or_default()
}

fn is_websocket_upgrade(parts: &Parts) -> bool {
    parts
        .headers
        .get(header::UPGRADE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.eq_ignore_ascii_case("websocket"))
}

async fn dispatch(State(state): State<Arc<ServerState>>, req: Request) -> Response {
    let (mut parts, body) = req.into_parts();
    let peer = parts
        .extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ci| ci.0)
        .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 0)));
    let path = parts.uri.path().to_string();

    if is_websocket_upgrade(&parts) && path_matches(&path, &state.ws_path) {
        return accept_ws(state, &mut parts, peer).await;
    }

    if parts.method == Method::POST && path_matches(&path, &state.xhttp_path) {
        return accept_xhttp(state, body, peer).await;
    }

    if path_matches(&path, &state.doh_path) {
        return handle_doh(&state, &parts, body).await;
    }

    if parts.method == Method::GET && !parts.headers.contains_key(header::UPGRADE) {
        return handle_get(&state, &parts, peer);
    }

    not_found()
}

async fn accept_ws(state: Arc<ServerState>, parts: &mut Parts, peer: SocketAddr) -> Response {
    let upgrade = match WebSocketUpgrade::from_request_parts(parts, &()).await {
        Ok(upgrade) => upgrade,
        Err(rejection) => {
            warn!(peer = %peer, error = %rejection, "websocket upgrade rejected");
            return not_found();
        }
    };
    let guard = state.tracker.guard();
    let max_frame = state.ws_max_frame_bytes;
    upgrade
        .max_frame_size(max_frame)
        .max_message_size(max_frame)
        .on_upgrade(move |socket| async move {
            let _guard = guard;
            let transport = WsTransport::new(socket, state.window_bytes);
            run_session(peer, transport, &state.settings, &state.dialer).await;
        })
}

async fn accept_xhttp(state: Arc<ServerState>, body: Body, peer: SocketAddr) -> Response {
    let guard = state.tracker.guard();
    let transport = XhttpTransport::new(body, state.window_bytes);
    let ctx = SessionContext::new(peer, transport.kind());
    ctx.span()
        .in_scope(|| info!("accept {} client", ctx.transport()));

    let (io, response) = transport.split();
    let ClientIo { mut source, sink } = io;
    match establish(&ctx, &mut source, &state.settings, &state.dialer).await {
        Ok(established) => {
            let options = state.settings.pump_options();
            tokio::spawn(async move {
                let _guard = guard;
                pipe(&ctx, ClientIo { source, sink }, established, options).await;
            });
            let padding = state.padding.as_ref().map(|p| p.generate());
            response.into_response(padding)
        }
        Err(err) => {
            record_error(err.error_type());
            drop(sink);
            drop(response);
            let limit = state.settings.drain_timeout;
            tokio::spawn(async move {
                let _guard = guard;
                reject(&ctx, source, limit).await;
            });
            not_found()
        }
    }
}

async fn handle_doh(state: &ServerState, parts: &Parts, body: Body) -> Response {
    let Some(forwarder) = state.doh.as_ref() else {
        return not_found();
    };
    let Some(query) = DohQuery::classify(&parts.method, &parts.headers, &parts.uri) else {
        return not_found();
    };
    let body = if query == DohQuery::Post {
        match axum::body::to_bytes(body, MAX_DOH_BODY_BYTES).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(error = %e, "failed to read DoH request body");
                return not_found();
            }
        }
    } else {
        Bytes::new()
    };
    match forwarder.forward(query, body).await {
        Ok(resp) => resp,
        Err(err) => {
            warn!(upstream = forwarder.upstream(), error = %err, "DoH forwarding failed");
            record_error(err.error_type());
            not_found()
        }
    }
}

fn handle_get(state: &ServerState, parts: &Parts, peer: SocketAddr) -> Response {
    let path = parts.uri.path();
    if path_matches(path, &state.ip_query_path) {
        return Json(IpInfo::from_request(&parts.headers, peer)).into_response();
    }

    let params: HashMap<String, String> = Query::try_from_uri(&parts.uri)
        .map(|Query(p)| p)
        .unwrap_or_default();
    if params.get("uuid").is_some_and(|u| *u == state.uuid) {
        let kind = if path_matches(path, &state.xhttp_path) {
            Some(ClientKind::Xhttp)
        } else if path_matches(path, &state.ws_path) {
            Some(ClientKind::Ws)
        } else {
            None
        };
        if let Some(kind) = kind {
            let fragment = params.get("fragment").is_some_and(|f| f == "true");
            let config = client_config(kind, &request_host(parts), path, &state.uuid, fragment);
            return Json(config).into_response();
        }
    }

    "Hello world!".into_response()
}
