//! Error types and the status codes handed to `webview_return`.

use std::path::PathBuf;

/// Status passed to the native `return` entry point.
///
/// The engine resolves the JavaScript promise when the status is `Ok` (0)
/// and rejects it otherwise.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnStatus {
    /// The bound function completed; the payload is its JSON result.
    Ok = 0,
    /// The call failed; the payload is a JSON string with the message.
    Error = -1,
}

/// Failure to load the native library. Cached by the runtime gate, so every
/// caller after the first sees the same value.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LoadError {
    #[error("failed to load native library {}: {reason}", path.display())]
    Library { path: PathBuf, reason: String },
    #[error("native library handle for {} is null", path.display())]
    NullHandle { path: PathBuf },
    #[error("failed to load symbol {name}: {reason}")]
    MissingSymbol { name: &'static str, reason: String },
}

/// Rejections reported synchronously by `bind` / `unbind`.
#[derive(Debug, thiserror::Error)]
pub enum BindError {
    #[error("function name {0:?} already bound")]
    AlreadyBound(String),
    #[error("function name {0:?} not bound")]
    NotBound(String),
    #[error("invalid function name {0:?}")]
    InvalidName(String),
    #[error("variadic parameter must be last, found at position {position} of {count}")]
    VariadicNotLast { position: usize, count: usize },
}

/// A bound-function call that did not produce a value.
///
/// Never raised to the caller of `bind`; converted into a
/// [`ReturnStatus::Error`] reply for the engine.
#[derive(Debug, thiserror::Error)]
pub enum CallError {
    #[error("invalid arguments: {0}")]
    Arguments(#[source] serde_json::Error),
    #[error("function arguments mismatch: expected {expected}, received {received}")]
    ArgumentMismatch { expected: String, received: usize },
    #[error("decoding argument {position} as {type_name}: {source}")]
    Decode {
        position: usize,
        type_name: &'static str,
        #[source]
        source: serde_json::Error,
    },
    /// The bound function returned an error; the message is kept verbatim.
    #[error("{0}")]
    Failed(String),
    #[error("encoding result: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("bound function panicked: {0}")]
    Panicked(String),
}

/// Failures while provisioning the listeners behind an app window.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("unix transport is not supported on {0}")]
    UnixUnsupported(String),
    #[error("invalid transport {0:?}")]
    Invalid(String),
    #[error("listen {addr}: {source}")]
    Listen {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    #[error("listen unix {}: {source}", path.display())]
    ListenUnix {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("listen tcp gateway: {0}")]
    Gateway(#[source] std::io::Error),
    #[error("create temp socket path: {0}")]
    TempPath(#[source] std::io::Error),
    #[error("stat unix socket {}: {source}", path.display())]
    Stat {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{} exists and is not a unix socket", .0.display())]
    NotASocket(PathBuf),
    #[error("remove unix socket {}: {source}", path.display())]
    Remove {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Top-level error for window creation and the app helper.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error("failed to create window")]
    CreateFailed,
    #[error(transparent)]
    Bind(#[from] BindError),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("AppOptions.handler must be set")]
    MissingHandler,
}

/// `bind_methods` stopped at `name`; `bound` lists what was bound before it.
#[derive(Debug, thiserror::Error)]
#[error("binding {name}: {source}")]
pub struct BindMethodsError {
    pub name: String,
    pub bound: Vec<String>,
    #[source]
    pub source: BindError,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_return_status_codes() {
        assert_eq!(ReturnStatus::Ok as i32, 0);
        assert_eq!(ReturnStatus::Error as i32, -1);
    }

    #[test]
    fn test_failed_keeps_message_verbatim() {
        assert_eq!(CallError::Failed("boom".into()).to_string(), "boom");
    }

    #[test]
    fn test_missing_symbol_names_the_symbol() {
        let err = LoadError::MissingSymbol {
            name: "webview_bind",
            reason: "undefined symbol".into(),
        };
        assert!(err.to_string().contains("webview_bind"));
    }
}
