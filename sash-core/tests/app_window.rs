//! `app_window` failures that must surface before any window exists.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use sash_core::{AppOptions, AppTransport, Error, TransportError, app_window};

#[test]
fn nil_handler_is_rejected() {
    let err = app_window(AppOptions::default()).unwrap_err();
    assert!(matches!(err, Error::MissingHandler));
    assert_eq!(err.to_string(), "AppOptions.handler must be set");
}

#[test]
fn invalid_listen_address_fails_setup() {
    let ready = Arc::new(AtomicBool::new(false));
    let flag = ready.clone();
    let err = app_window(AppOptions {
        transport: AppTransport::Tcp,
        addr: Some("invalid-not-an-address:99999999".to_string()),
        handler: Some(axum::Router::new()),
        on_ready: Some(Box::new(move |_: &str| flag.store(true, Ordering::SeqCst))),
        ..Default::default()
    })
    .unwrap_err();
    assert!(matches!(
        err,
        Error::Transport(TransportError::Listen { .. })
    ));
    assert!(!ready.load(Ordering::SeqCst));
}

fn bad_address_options() -> AppOptions {
    AppOptions {
        transport: AppTransport::Tcp,
        addr: Some("bad:addr:1".to_string()),
        handler: Some(axum::Router::new()),
        ..Default::default()
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn setup_errors_are_returned_inside_multi_thread_runtime() {
    let err = app_window(bad_address_options()).unwrap_err();
    assert!(matches!(
        err,
        Error::Transport(TransportError::Listen { .. })
    ));
}

#[tokio::test]
async fn setup_errors_are_returned_inside_current_thread_runtime() {
    let err = app_window(bad_address_options()).unwrap_err();
    assert!(matches!(
        err,
        Error::Transport(TransportError::Listen { .. })
    ));
}

#[cfg(windows)]
#[test]
fn unix_transport_is_unsupported_on_windows() {
    let err = app_window(AppOptions {
        transport: AppTransport::Unix,
        handler: Some(axum::Router::new()),
        ..Default::default()
    })
    .unwrap_err();
    assert!(matches!(
        err,
        Error::Transport(TransportError::UnixUnsupported(_))
    ));
}
