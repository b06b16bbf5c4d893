//! Listener provisioning and the unix gateway, end to end over real sockets.

use axum::Router;
use axum::extract::Request;
use axum::routing::get;
use sash_core::AppTransport;
use sash_core::app::transport::{AppListener, setup_transport};
use sash_core::error::TransportError;

fn app() -> Router {
    Router::new()
        .route("/", get(|| async { "hello" }))
        .route(
            "/echo",
            get(|req: Request| async move {
                let forwarded = req
                    .headers()
                    .get("x-forwarded-for")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("-")
                    .to_string();
                format!("{} {}", req.uri(), forwarded)
            }),
        )
}

#[tokio::test]
async fn tcp_transport_serves_router() {
    let setup = setup_transport(AppTransport::Tcp, None, None).await.unwrap();
    assert_eq!(setup.info.transport, AppTransport::Tcp);
    assert_eq!(setup.info.backend, setup.info.gateway);
    assert!(setup.info.url.starts_with("http://127.0.0.1:"));
    assert!(matches!(setup.listener, AppListener::Tcp(_)));

    let server = setup.listener.serve(app());
    let body = reqwest::get(&setup.info.url).await.unwrap().text().await.unwrap();
    assert_eq!(body, "hello");
    server.abort();
}

#[tokio::test]
async fn tcp_transport_uses_given_address() {
    let setup = setup_transport(AppTransport::Tcp, Some("127.0.0.1:0"), None)
        .await
        .unwrap();
    let port: u16 = setup.info.url.rsplit(':').next().unwrap().parse().unwrap();
    assert_ne!(port, 0);
}

#[tokio::test]
async fn invalid_address_is_a_listen_error() {
    let err = match setup_transport(AppTransport::Tcp, Some("invalid-not-an-address:99999999"), None)
        .await
    {
        Err(e) => e,
        Ok(_) => panic!("listening on an invalid address must fail"),
    };
    match err {
        TransportError::Listen { addr, .. } => assert_eq!(addr, "invalid-not-an-address:99999999"),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[cfg(unix)]
#[tokio::test]
async fn unix_gateway_proxies_to_socket() {
    let dir = tempfile::tempdir().unwrap();
    let socket = dir.path().join("app.sock");

    let mut setup = setup_transport(AppTransport::Unix, None, Some(&socket))
        .await
        .unwrap();
    assert_eq!(setup.info.transport, AppTransport::Unix);
    assert_eq!(setup.info.backend, socket.display().to_string());
    assert_ne!(setup.info.backend, setup.info.gateway);
    assert!(socket.exists());

    setup.hooks.start();
    let server = setup.listener.serve(app());

    let body = reqwest::get(format!("{}/echo?x=1", setup.info.url))
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert_eq!(body, "/echo?x=1 127.0.0.1");

    // Backend gone: the gateway answers for it.
    server.abort();
    let _ = server.await;
    let resp = reqwest::get(&setup.info.url).await.unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::BAD_GATEWAY);

    setup.hooks.close().unwrap();
    assert!(!socket.exists());
}

#[cfg(unix)]
#[tokio::test]
async fn unix_transport_generates_socket_path() {
    let setup = setup_transport(AppTransport::Unix, None, None).await.unwrap();
    let socket = std::path::PathBuf::from(&setup.info.backend);
    assert!(socket.exists());
    drop(setup);
    assert!(!socket.exists());
}

#[cfg(unix)]
#[tokio::test]
async fn unix_transport_refuses_to_clobber_files() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("data.txt");
    std::fs::write(&path, b"keep me").unwrap();

    let result = setup_transport(AppTransport::Unix, None, Some(&path)).await;
    assert!(matches!(result, Err(TransportError::NotASocket(_))));
    assert_eq!(std::fs::read(&path).unwrap(), b"keep me");
}
