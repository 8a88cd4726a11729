//! JSON endpoints: visitor IP information and client configuration.

use std::net::SocketAddr;

use axum::http::HeaderMap;
use rand::Rng;
use serde::Serialize;
use serde_json::{Value, json};
use vless_config::append_slash;
use vless_proto::UserId;

/// Visitor information derived from edge headers and the TCP peer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IpInfo {
    pub ip: String,
    pub user_agent: String,
    pub organization: String,
    pub city: String,
    pub continent: String,
    pub country: String,
    pub latitude: String,
    pub longitude: String,
    pub region: String,
    pub region_code: String,
    pub timezone: String,
}

fn header_str(headers: &HeaderMap, name: &str) -> String {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .unwrap_or_default()
        .to_string()
}

impl IpInfo {
    pub fn from_request(headers: &HeaderMap, peer: SocketAddr) -> Self {
        let ip = [
            header_str(headers, "cf-connecting-ip"),
            header_str(headers, "x-forwarded-for")
                .split(',')
                .next()
                .unwrap_or_default()
                .trim()
                .to_string(),
        ]
        .into_iter()
        .find(|s| !s.is_empty())
        .unwrap_or_else(|| peer.ip().to_string());

        Self {
            ip,
            user_agent: header_str(headers, "user-agent"),
            organization: header_str(headers, "cf-asorganization"),
            city: header_str(headers, "cf-ipcity"),
            continent: header_str(headers, "cf-ipcontinent"),
            country: header_str(headers, "cf-ipcountry"),
            latitude: header_str(headers, "cf-iplatitude"),
            longitude: header_str(headers, "cf-iplongitude"),
            region: header_str(headers, "cf-region"),
            region_code: header_str(headers, "cf-region-code"),
            timezone: header_str(headers, "cf-timezone"),
        }
    }
}

/// Transport a generated client configuration targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientKind {
    Ws,
    Xhttp,
}

impl ClientKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClientKind::Ws => "ws",
            ClientKind::Xhttp => "xhttp",
        }
    }
}

/// Build an xray client configuration for this server.
///
/// `host` is the public hostname without port, `path` the request path.
pub fn client_config(kind: ClientKind, host: &str, path: &str, uuid: &str, fragment: bool) -> Value {
    let path = match append_slash(path) {
        p if p.is_empty() => "/".to_string(),
        p => p,
    };

    let mut stream = json!({
        "network": kind.as_str(),
        "security": "tls",
        "tlsSettings": { "serverName": host },
    });
    match kind {
        ClientKind::Ws => {
            stream["wsSettings"] = json!({ "path": path, "host": host });
        }
        ClientKind::Xhttp => {
            stream["tlsSettings"]["alpn"] = json!(["h2"]);
            stream["xhttpSettings"] = json!({
                "mode": "stream-one",
                "host": host,
                "path": path,
                "noGRPCHeader": false,
                "keepAlivePeriod": 300,
            });
        }
    }

    let mut outbound = json!({
        "protocol": "vless",
        "settings": {
            "vnext": [{
                "address": host,
                "port": 443,
                "users": [{ "id": uuid, "encryption": "none" }],
            }],
        },
        "tag": "agentout",
        "streamSettings": stream,
    });

    let mut outbounds = Vec::with_capacity(2);
    if fragment {
        outbound["proxySettings"] = json!({ "tag": "direct", "transportLayer": true });
        outbounds.push(outbound);
        outbounds.push(json!({
            "tag": "direct",
            "protocol": "freedom",
            "settings": {
                "fragment": {
                    "packets": "tlshello",
                    "length": "100-200",
                    "interval": "10-20",
                },
            },
        }));
    } else {
        outbounds.push(outbound);
    }

    json!({
        "log": { "loglevel": "warning" },
        "inbounds": [{
            "tag": "agentin",
            "port": 1080,
            "listen": "127.0.0.1",
            "protocol": "socks",
            "settings": {},
        }],
        "outbounds": outbounds,
    })
}

/// Random lowercase base36 string.
pub fn random_str(len: usize) -> String {
    const ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect()
}

/// Random settings example pointing at `origin`.
pub fn example_text(origin: &str) -> String {
    let origin = origin.trim_end_matches('/');
    let ws_path = random_str(8);
    let xhttp_path = random_str(8);
    let mut bytes: [u8; 16] = rand::random();
    bytes[6] = (bytes[6] & 0x0f) | 0x40;
    bytes[8] = (bytes[8] & 0x3f) | 0x80;
    let uuid = UserId::from_bytes(bytes);

    format!(
        "Settings example:\n\
         UUID {uuid}\n\
         WS_PATH /{ws_path}\n\
         XHTTP_PATH /{xhttp_path}\n\
         \n\
         WebSocket config.json:\n\
         {origin}/{ws_path}/?fragment=true&uuid={uuid}\n\
         \n\
         XHTTP config.json:\n\
         {origin}/{xhttp_path}/?fragment=true&uuid={uuid}\n\
         \n\
         Run again to generate another random settings example.\n"
    )
}
