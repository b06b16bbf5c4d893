//! Desktop window backed by a local HTTP server.
//!
//! [`app_window`] serves an `axum::Router` on loopback TCP or a Unix socket
//! (with a loopback gateway in front), points a new [`Window`] at it and runs
//! the UI loop. Everything is torn down when the window closes.

#[cfg(unix)]
pub mod gateway;
pub mod transport;

use std::fmt;
use std::future::Future;
use std::path::PathBuf;
use std::str::FromStr;

use tokio::task::JoinHandle;

use crate::RUNTIME;
use crate::error::{Error, TransportError};
use crate::window::{Hint, Window};

use self::transport::{TransportHooks, TransportSetup, setup_transport};

pub const DEFAULT_TITLE: &str = "App";
pub const DEFAULT_WIDTH: i32 = 1024;
pub const DEFAULT_HEIGHT: i32 = 768;

/// How the application server is reached by the embedded browser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AppTransport {
    /// Unix socket plus gateway on macOS and Linux, TCP on Windows.
    #[default]
    Auto,
    /// Serve directly over loopback TCP.
    Tcp,
    /// Serve over a Unix domain socket behind a loopback HTTP gateway.
    Unix,
}

impl AppTransport {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Tcp => "tcp",
            Self::Unix => "unix",
        }
    }
}

impl fmt::Display for AppTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AppTransport {
    type Err = TransportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" | "auto" => Ok(Self::Auto),
            "tcp" => Ok(Self::Tcp),
            "unix" => Ok(Self::Unix),
            other => Err(TransportError::Invalid(other.to_string())),
        }
    }
}

/// Transport details reported once the listeners are up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppReadyInfo {
    /// URL the webview navigates to.
    pub url: String,
    /// Resolved transport, never `Auto`.
    pub transport: AppTransport,
    /// `ip:port` for tcp, the socket path for unix.
    pub backend: String,
    /// Loopback gateway endpoint; equal to `backend` for tcp.
    pub gateway: String,
}

pub type ReadyCallback = Box<dyn FnOnce(&str) + Send>;
pub type ReadyInfoCallback = Box<dyn FnOnce(&AppReadyInfo) + Send>;

/// Configuration for [`app_window`]. Zero values select the defaults.
#[derive(Default)]
pub struct AppOptions {
    pub title: String,
    pub width: i32,
    pub height: i32,
    pub hint: Hint,
    /// Enable browser developer tools.
    pub debug: bool,
    pub transport: AppTransport,
    /// TCP listen address, `127.0.0.1:0` when unset.
    pub addr: Option<String>,
    /// Socket path for the unix transport, generated when unset.
    pub unix_socket_path: Option<PathBuf>,
    /// Application to serve. Required.
    pub handler: Option<axum::Router>,
    /// Called with the navigable URL once listeners are up.
    pub on_ready: Option<ReadyCallback>,
    /// Called with transport details once listeners are up.
    pub on_ready_info: Option<ReadyInfoCallback>,
}

/// Aborts the application server, then closes the transport hooks.
struct Serving {
    server: JoinHandle<()>,
    _hooks: TransportHooks,
}

impl Drop for Serving {
    fn drop(&mut self) {
        self.server.abort();
    }
}

/// Run `fut` to completion on the shared runtime.
///
/// A thread already inside a tokio runtime cannot enter another one, so in
/// that case the shared runtime is driven from a scoped helper thread.
fn block_on_shared<F>(fut: F) -> F::Output
where
    F: Future + Send,
    F::Output: Send,
{
    if tokio::runtime::Handle::try_current().is_err() {
        return RUNTIME.block_on(fut);
    }
    std::thread::scope(|scope| {
        match scope.spawn(|| RUNTIME.block_on(fut)).join() {
            Ok(output) => output,
            Err(panic) => std::panic::resume_unwind(panic),
        }
    })
}

/// Serve `opts.handler` locally and show it in a native window.
///
/// Blocks on the UI loop until the window is closed. Setup failures are
/// returned before any window is created.
pub fn app_window(opts: AppOptions) -> Result<(), Error> {
    let AppOptions {
        title,
        width,
        height,
        hint,
        debug,
        transport,
        addr,
        unix_socket_path,
        handler,
        on_ready,
        on_ready_info,
    } = opts;

    let handler = handler.ok_or(Error::MissingHandler)?;
    let width = if width <= 0 { DEFAULT_WIDTH } else { width };
    let height = if height <= 0 { DEFAULT_HEIGHT } else { height };
    let title = if title.is_empty() {
        DEFAULT_TITLE.to_string()
    } else {
        title
    };

    let (info, _serving) = block_on_shared(async {
        let TransportSetup {
            listener,
            info,
            mut hooks,
        } = setup_transport(transport, addr.as_deref(), unix_socket_path.as_deref()).await?;
        hooks.start();
        let server = listener.serve(handler);
        Ok::<_, TransportError>((
            info,
            Serving {
                server,
                _hooks: hooks,
            },
        ))
    })?;
    tracing::info!(
        url = %info.url,
        transport = %info.transport,
        backend = %info.backend,
        "app server ready"
    );

    if let Some(on_ready) = on_ready {
        on_ready(&info.url);
    }
    if let Some(on_ready_info) = on_ready_info {
        on_ready_info(&info);
    }

    let window = Window::new(debug)?;
    window.set_title(&title);
    window.set_size(width, height, hint);
    window.navigate(&info.url);
    window.run();
    window.destroy();
    tracing::info!("window closed, shutting down app server");
    Ok(())
}
