//! sash-serve: show a static site in a native desktop window.
//!
//! Serves a directory with `tower-http`'s `ServeDir` over the platform's
//! preferred local transport and opens a webview pointed at it. Exits when
//! the window is closed.
//!
//! Requires the native webview library (set WEBVIEW_PATH to its directory if
//! it is not next to the executable).

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use sash_core::{AppOptions, AppReadyInfo, AppTransport, Hint, app_window};
use tower_http::services::ServeDir;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "sash-serve", about = "Serve a directory inside a native window")]
struct Config {
    /// Directory to serve
    #[arg(env = "SASH_DIR", default_value = ".")]
    dir: PathBuf,

    /// Window title
    #[arg(long, env = "SASH_TITLE", default_value = "App")]
    title: String,

    /// Initial window width
    #[arg(long, env = "SASH_WIDTH", default_value_t = 1024)]
    width: i32,

    /// Initial window height
    #[arg(long, env = "SASH_HEIGHT", default_value_t = 768)]
    height: i32,

    /// Prevent the user from resizing the window
    #[arg(long)]
    fixed: bool,

    /// Enable browser developer tools
    #[arg(long, env = "SASH_DEBUG")]
    debug: bool,

    /// Backend transport: auto, tcp or unix
    #[arg(long, env = "SASH_TRANSPORT", default_value = "auto")]
    transport: AppTransport,

    /// Listen address for the tcp transport
    #[arg(long, env = "SASH_ADDR")]
    addr: Option<String>,

    /// Socket path for the unix transport (generated if unset)
    #[arg(long, env = "SASH_SOCKET")]
    socket: Option<PathBuf>,
}

fn main() -> Result<()> {
    // JSON logs with SASH_LOG_JSON=1, human-readable otherwise
    let json_logs = std::env::var("SASH_LOG_JSON").unwrap_or_default() == "1";
    let filter = EnvFilter::from_default_env()
        .add_directive("sash_serve=info".parse()?)
        .add_directive("sash_core=info".parse()?);
    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    let config = Config::parse();
    let dir = config
        .dir
        .canonicalize()
        .with_context(|| format!("serving directory {}", config.dir.display()))?;
    tracing::info!("Serving {}", dir.display());

    // Fail on a missing library before any listener is opened.
    sash_core::init().context("loading native webview library")?;

    app_window(options(config, dir))?;
    Ok(())
}

fn options(config: Config, dir: PathBuf) -> AppOptions {
    AppOptions {
        title: config.title,
        width: config.width,
        height: config.height,
        hint: if config.fixed { Hint::Fixed } else { Hint::None },
        debug: config.debug,
        transport: config.transport,
        addr: config.addr,
        unix_socket_path: config.socket,
        handler: Some(axum::Router::new().fallback_service(ServeDir::new(dir))),
        on_ready_info: Some(Box::new(|info: &AppReadyInfo| {
            tracing::info!(
                "Listening on {} ({} backend {}, gateway {})",
                info.url,
                info.transport,
                info.backend,
                info.gateway
            );
        })),
        ..Default::default()
    }
}
