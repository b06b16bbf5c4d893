//! Dynamic binding layer for the native webview library.
//!
//! The shared library is resolved at runtime (no static linking) and its C
//! ABI is wrapped by [`Window`]. Rust closures are exposed to JavaScript via
//! [`Window::bind`]; native callbacks are routed back through process-wide
//! handle tables and executed on a shared tokio runtime.
//!
//! [`app::app_window`] turns an `axum::Router` into a desktop window backed
//! by a local server over loopback TCP or a Unix socket.

pub mod app;
pub mod bridge;
pub mod error;
pub mod loader;
pub mod methods;
pub mod registry;
pub mod render;
pub mod runtime;
pub mod window;

#[cfg(test)]
pub(crate) mod testing;

use once_cell::sync::Lazy;

pub use app::{AppOptions, AppReadyInfo, AppTransport, app_window};
pub use bridge::{Bindable, Invoker, Json, Variadic};
pub use error::{
    BindError, BindMethodsError, CallError, Error, LoadError, ReturnStatus, TransportError,
};
pub use methods::{Binder, MethodSet, bind_methods};
pub use render::render_html;
pub use window::{Hint, Window, WindowHandle, WindowProxy};

/// Shared tokio runtime for servers and bound-function calls.
/// Two worker threads serve the HTTP side; bound functions run on its blocking pool.
pub(crate) static RUNTIME: Lazy<tokio::runtime::Runtime> = Lazy::new(|| {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .worker_threads(2)
        .thread_name("sash-worker")
        .build()
        .expect("Failed to create tokio runtime")
});

/// Load the native library and resolve every entry point.
///
/// Safe to call multiple times; only the first call attempts the load and
/// later calls observe the same outcome. [`Window::new`] calls this
/// implicitly, but calling it early lets an application fail fast.
pub fn init() -> Result<(), LoadError> {
    runtime::Runtime::init().map(|_| ())
}
