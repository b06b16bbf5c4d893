//! Loopback HTTP gateway in front of the unix-socket backend.
//!
//! Browsers can only navigate to `http://host:port`, so the unix transport
//! puts this reverse proxy on `127.0.0.1`. Each request opens a fresh HTTP/1
//! connection to the socket.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use axum::Router;
use axum::body::Body;
use axum::extract::{ConnectInfo, Request, State};
use axum::http::header::{self, HeaderMap, HeaderName, HeaderValue};
use axum::http::{StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

static X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");

const HOP_BY_HOP: [HeaderName; 8] = [
    header::CONNECTION,
    HeaderName::from_static("keep-alive"),
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

/// Proxy router forwarding every request to the socket at `socket`.
pub fn router(socket: PathBuf) -> Router {
    Router::new().fallback(proxy).with_state(Arc::new(socket))
}

/// Serve the gateway on `listener` from a background task.
pub fn spawn(listener: TcpListener, socket: PathBuf) -> JoinHandle<()> {
    let app = router(socket).into_make_service_with_connect_info::<SocketAddr>();
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!("gateway server error: {e}");
        }
    })
}

async fn proxy(
    State(socket): State<Arc<PathBuf>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    req: Request,
) -> Response {
    match forward(&socket, peer, req).await {
        Ok(resp) => resp,
        Err(e) => {
            tracing::warn!("gateway: {e:#}");
            (StatusCode::BAD_GATEWAY, "bad gateway").into_response()
        }
    }
}

async fn forward(socket: &Path, peer: SocketAddr, req: Request) -> anyhow::Result<Response> {
    let stream = tokio::net::UnixStream::connect(socket)
        .await
        .with_context(|| format!("dial {}", socket.display()))?;
    let (mut sender, conn) = hyper::client::conn::http1::handshake::<_, Body>(TokioIo::new(stream))
        .await
        .context("backend handshake")?;
    tokio::spawn(async move {
        if let Err(e) = conn.await {
            tracing::debug!("gateway backend connection: {e}");
        }
    });

    let (mut parts, body) = req.into_parts();
    let uri: Uri = parts
        .uri
        .path_and_query()
        .map_or("/", |pq| pq.as_str())
        .parse()
        .context("rewrite request uri")?;
    parts.uri = uri;
    strip_hop_by_hop(&mut parts.headers);
    append_forwarded_for(&mut parts.headers, peer);

    let resp = sender
        .send_request(Request::from_parts(parts, body))
        .await
        .context("forward request")?;
    let (mut parts, body) = resp.into_parts();
    strip_hop_by_hop(&mut parts.headers);
    Ok(Response::from_parts(parts, Body::new(body)))
}

/// Drop headers that describe a single connection, including any the
/// `Connection` header itself names.
fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let named: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();
    for name in named.iter().chain(HOP_BY_HOP.iter()) {
        headers.remove(name);
    }
}

fn append_forwarded_for(headers: &mut HeaderMap, peer: SocketAddr) {
    let ip = peer.ip().to_string();
    let value = match headers.get(&X_FORWARDED_FOR).and_then(|v| v.to_str().ok()) {
        Some(prior) if !prior.is_empty() => format!("{prior}, {ip}"),
        _ => ip,
    };
    if let Ok(value) = HeaderValue::from_str(&value) {
        headers.insert(X_FORWARDED_FOR.clone(), value);
    }
}
