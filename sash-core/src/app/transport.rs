//! Listener provisioning for [`app_window`](super::app_window).

use std::path::{Path, PathBuf};

use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use super::{AppReadyInfo, AppTransport};
use crate::error::TransportError;

pub const DEFAULT_TCP_ADDR: &str = "127.0.0.1:0";

/// Map a requested transport to the one used on `os` (`std::env::consts::OS`).
pub fn resolve_transport(requested: AppTransport, os: &str) -> Result<AppTransport, TransportError> {
    match requested {
        AppTransport::Auto if os == "windows" => Ok(AppTransport::Tcp),
        AppTransport::Auto => Ok(AppTransport::Unix),
        AppTransport::Tcp => Ok(AppTransport::Tcp),
        AppTransport::Unix if os == "windows" => Err(TransportError::UnixUnsupported(os.to_string())),
        AppTransport::Unix => Ok(AppTransport::Unix),
    }
}

/// The application's listener.
pub enum AppListener {
    Tcp(TcpListener),
    #[cfg(unix)]
    Unix(tokio::net::UnixListener),
}

impl AppListener {
    /// Serve `router` on this listener from a background task.
    ///
    /// Must be called from within a tokio runtime.
    pub fn serve(self, router: axum::Router) -> JoinHandle<()> {
        match self {
            Self::Tcp(listener) => tokio::spawn(async move {
                if let Err(e) = axum::serve(listener, router).await {
                    tracing::error!("app server error: {e}");
                }
            }),
            #[cfg(unix)]
            Self::Unix(listener) => tokio::spawn(async move {
                if let Err(e) = axum::serve(listener, router).await {
                    tracing::error!("app server error: {e}");
                }
            }),
        }
    }
}

/// Listeners ready to serve, plus what it takes to shut them down.
pub struct TransportSetup {
    pub listener: AppListener,
    pub info: AppReadyInfo,
    pub hooks: TransportHooks,
}

/// Start and close actions for the parts of a transport beyond the app
/// listener: the unix gateway and its socket file. Closing also happens on
/// drop.
#[derive(Default)]
pub struct TransportHooks {
    gateway: Option<TcpListener>,
    task: Option<JoinHandle<()>>,
    socket_path: Option<PathBuf>,
}

impl TransportHooks {
    /// Start the gateway, if there is one. Must be called from within a
    /// tokio runtime.
    pub fn start(&mut self) {
        let Some(listener) = self.gateway.take() else {
            return;
        };
        let Some(path) = self.socket_path.clone() else {
            return;
        };
        #[cfg(unix)]
        {
            self.task = Some(super::gateway::spawn(listener, path));
        }
        #[cfg(not(unix))]
        drop((listener, path));
    }

    /// Stop the gateway and remove the socket file. Idempotent; a socket
    /// that is already gone is not an error.
    pub fn close(&mut self) -> Result<(), TransportError> {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        self.gateway = None;
        match self.socket_path.take() {
            Some(path) => remove_unix_socket(&path),
            None => Ok(()),
        }
    }
}

impl Drop for TransportHooks {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            tracing::warn!("transport cleanup: {e}");
        }
    }
}

/// Resolve the transport for this platform and bind its listeners.
pub async fn setup_transport(
    requested: AppTransport,
    addr: Option<&str>,
    unix_socket_path: Option<&Path>,
) -> Result<TransportSetup, TransportError> {
    match resolve_transport(requested, std::env::consts::OS)? {
        AppTransport::Unix => setup_unix(unix_socket_path).await,
        _ => setup_tcp(addr).await,
    }
}

async fn setup_tcp(addr: Option<&str>) -> Result<TransportSetup, TransportError> {
    let addr = addr.filter(|a| !a.is_empty()).unwrap_or(DEFAULT_TCP_ADDR);
    let listen_err = |source| TransportError::Listen {
        addr: addr.to_string(),
        source,
    };
    let listener = TcpListener::bind(addr).await.map_err(listen_err)?;
    let local = listener.local_addr().map_err(listen_err)?;
    tracing::debug!(%local, "app listening on tcp");

    Ok(TransportSetup {
        listener: AppListener::Tcp(listener),
        info: AppReadyInfo {
            url: format!("http://127.0.0.1:{}", local.port()),
            transport: AppTransport::Tcp,
            backend: local.to_string(),
            gateway: local.to_string(),
        },
        hooks: TransportHooks::default(),
    })
}

#[cfg(unix)]
async fn setup_unix(socket_path: Option<&Path>) -> Result<TransportSetup, TransportError> {
    let path = prepare_unix_socket_path(socket_path)?;

    let listener = match tokio::net::UnixListener::bind(&path) {
        Ok(listener) => listener,
        Err(source) => {
            let _ = remove_unix_socket(&path);
            return Err(TransportError::ListenUnix { path, source });
        }
    };

    let gateway = match TcpListener::bind(DEFAULT_TCP_ADDR).await {
        Ok(gateway) => gateway,
        Err(source) => {
            drop(listener);
            let _ = remove_unix_socket(&path);
            return Err(TransportError::Gateway(source));
        }
    };
    let gateway_addr = match gateway.local_addr() {
        Ok(addr) => addr,
        Err(source) => {
            drop(listener);
            let _ = remove_unix_socket(&path);
            return Err(TransportError::Gateway(source));
        }
    };
    tracing::debug!(socket = %path.display(), gateway = %gateway_addr, "app listening on unix socket");

    Ok(TransportSetup {
        listener: AppListener::Unix(listener),
        info: AppReadyInfo {
            url: format!("http://127.0.0.1:{}", gateway_addr.port()),
            transport: AppTransport::Unix,
            backend: path.display().to_string(),
            gateway: gateway_addr.to_string(),
        },
        hooks: TransportHooks {
            gateway: Some(gateway),
            task: None,
            socket_path: Some(path),
        },
    })
}

#[cfg(not(unix))]
async fn setup_unix(_socket_path: Option<&Path>) -> Result<TransportSetup, TransportError> {
    Err(TransportError::UnixUnsupported(
        std::env::consts::OS.to_string(),
    ))
}

/// Socket path to listen on.
///
/// A given path is cleared of a stale socket (but never of another kind of
/// file). Otherwise a fresh temp file name is reserved and the file removed,
/// leaving a path that does not exist.
pub fn prepare_unix_socket_path(path: Option<&Path>) -> Result<PathBuf, TransportError> {
    if let Some(path) = path.filter(|p| !p.as_os_str().is_empty()) {
        remove_unix_socket(path)?;
        return Ok(path.to_path_buf());
    }
    let file = tempfile::Builder::new()
        .prefix("sash-")
        .suffix(".sock")
        .tempfile()
        .map_err(TransportError::TempPath)?;
    let path = file.path().to_path_buf();
    file.close().map_err(TransportError::TempPath)?;
    Ok(path)
}

/// Remove the unix socket at `path`. Missing paths are fine; anything that
/// is not a socket is left alone and reported.
#[cfg(unix)]
pub fn remove_unix_socket(path: &Path) -> Result<(), TransportError> {
    use std::io::ErrorKind;
    use std::os::unix::fs::FileTypeExt;

    if path.as_os_str().is_empty() {
        return Ok(());
    }
    let meta = match std::fs::symlink_metadata(path) {
        Ok(meta) => meta,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
        Err(source) => {
            return Err(TransportError::Stat {
                path: path.to_path_buf(),
                source,
            });
        }
    };
    if !meta.file_type().is_socket() {
        return Err(TransportError::NotASocket(path.to_path_buf()));
    }
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(source) => Err(TransportError::Remove {
            path: path.to_path_buf(),
            source,
        }),
    }
}

#[cfg(not(unix))]
pub fn remove_unix_socket(_path: &Path) -> Result<(), TransportError> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_transport() {
        let cases = [
            (AppTransport::Auto, "darwin", Some(AppTransport::Unix)),
            (AppTransport::Auto, "linux", Some(AppTransport::Unix)),
            (AppTransport::Auto, "windows", Some(AppTransport::Tcp)),
            (AppTransport::Tcp, "linux", Some(AppTransport::Tcp)),
            (AppTransport::Tcp, "windows", Some(AppTransport::Tcp)),
            (AppTransport::Unix, "macos", Some(AppTransport::Unix)),
            (AppTransport::Unix, "windows", None),
        ];
        for (requested, os, want) in cases {
            let got = resolve_transport(requested, os);
            match want {
                Some(want) => assert_eq!(got.unwrap(), want, "{requested} on {os}"),
                None => assert!(
                    matches!(got, Err(TransportError::UnixUnsupported(_))),
                    "{requested} on {os}"
                ),
            }
        }
    }

    #[test]
    fn test_generated_socket_path_does_not_exist() {
        let path = prepare_unix_socket_path(None).unwrap();
        assert!(!path.exists());
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("sash-") && name.ends_with(".sock"), "{name}");
    }

    #[test]
    fn test_empty_socket_path_is_generated() {
        let path = prepare_unix_socket_path(Some(Path::new(""))).unwrap();
        assert!(!path.as_os_str().is_empty());
        assert!(!path.exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_regular_file_is_not_removed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("not-a-socket");
        std::fs::write(&path, b"data").unwrap();

        assert!(matches!(
            remove_unix_socket(&path),
            Err(TransportError::NotASocket(_))
        ));
        assert!(matches!(
            prepare_unix_socket_path(Some(&path)),
            Err(TransportError::NotASocket(_))
        ));
        assert!(path.exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_stale_socket_is_removed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stale.sock");
        drop(std::os::unix::net::UnixListener::bind(&path).unwrap());
        assert!(path.exists());

        assert_eq!(prepare_unix_socket_path(Some(&path)).unwrap(), path);
        assert!(!path.exists());
    }

    #[test]
    fn test_missing_socket_is_fine() {
        let dir = tempfile::tempdir().unwrap();
        assert!(remove_unix_socket(&dir.path().join("gone.sock")).is_ok());
        assert!(remove_unix_socket(Path::new("")).is_ok());
    }

    #[test]
    fn test_empty_hooks_close_cleanly() {
        let mut hooks = TransportHooks::default();
        hooks.start();
        assert!(hooks.close().is_ok());
        assert!(hooks.close().is_ok());
    }
}
