//! Native library discovery, loading and symbol resolution.
//!
//! The library is opened once per process and never unloaded; every
//! resolved entry point is copied into a [`SymbolTable`] of typed function
//! pointers that stays valid for as long as the table owns the library.

use std::ffi::{c_char, c_int, c_void};
use std::path::{Path, PathBuf};

use libloading::Library;
use once_cell::sync::OnceCell;

use crate::error::LoadError;

/// Environment variable naming an extra directory to search first.
pub const LIBRARY_PATH_ENV: &str = "WEBVIEW_PATH";

/// Platform file name of the native library.
#[cfg(target_os = "windows")]
pub const LIBRARY_NAME: &str = "webview.dll";
#[cfg(target_os = "macos")]
pub const LIBRARY_NAME: &str = "libwebview.dylib";
#[cfg(not(any(target_os = "windows", target_os = "macos")))]
pub const LIBRARY_NAME: &str = "libwebview.so";

/// Raw `webview_t`. Only ever handed back to the engine.
pub type RawWindow = *mut c_void;

/// `void (*fn)(webview_t w, void *arg)` passed to `webview_dispatch`.
pub type DispatchCallback = unsafe extern "C" fn(RawWindow, *mut c_void);

/// `void (*fn)(const char *id, const char *req, void *arg)` passed to `webview_bind`.
pub type BindingCallback = unsafe extern "C" fn(*const c_char, *const c_char, *mut c_void);

pub type CreateFn = unsafe extern "C" fn(c_int, *mut c_void) -> RawWindow;
pub type WindowFn = unsafe extern "C" fn(RawWindow) -> c_int;
pub type GetWindowFn = unsafe extern "C" fn(RawWindow) -> *mut c_void;
pub type StringFn = unsafe extern "C" fn(RawWindow, *const c_char) -> c_int;
pub type SetSizeFn = unsafe extern "C" fn(RawWindow, c_int, c_int, c_int) -> c_int;
pub type DispatchFn = unsafe extern "C" fn(RawWindow, DispatchCallback, *mut c_void) -> c_int;
pub type BindFn =
    unsafe extern "C" fn(RawWindow, *const c_char, BindingCallback, *mut c_void) -> c_int;
pub type ReturnFn = unsafe extern "C" fn(RawWindow, *const c_char, c_int, *const c_char) -> c_int;

macro_rules! symbol_table {
    ($($field:ident: $ty:ty = $name:literal,)*) => {
        /// Resolved entry points of the native library.
        pub struct SymbolTable {
            $(pub(crate) $field: $ty,)*
            /// Keeps the function pointers above valid.
            pub(crate) _library: Option<Library>,
        }

        impl SymbolTable {
            /// Canonical names of every required entry point, in resolution order.
            pub const ENTRY_POINTS: &'static [&'static str] = &[$($name),*];

            fn resolve(library: Library) -> Result<Self, LoadError> {
                Ok(Self {
                    $($field: unsafe { symbol::<$ty>(&library, $name)? },)*
                    _library: Some(library),
                })
            }

            /// Address of a resolved entry point by canonical name.
            pub fn address(&self, name: &str) -> Option<usize> {
                match name {
                    $($name => Some(self.$field as usize),)*
                    _ => None,
                }
            }
        }
    };
}

symbol_table! {
    create: CreateFn = "webview_create",
    destroy: WindowFn = "webview_destroy",
    run: WindowFn = "webview_run",
    terminate: WindowFn = "webview_terminate",
    dispatch: DispatchFn = "webview_dispatch",
    get_window: GetWindowFn = "webview_get_window",
    set_title: StringFn = "webview_set_title",
    set_size: SetSizeFn = "webview_set_size",
    navigate: StringFn = "webview_navigate",
    set_html: StringFn = "webview_set_html",
    init: StringFn = "webview_init",
    eval: StringFn = "webview_eval",
    bind: BindFn = "webview_bind",
    unbind: StringFn = "webview_unbind",
    ret: ReturnFn = "webview_return",
}

impl SymbolTable {
    /// Open the library at `path` and resolve every entry point.
    ///
    /// Any unresolved symbol fails the whole load; a partial table is never
    /// returned.
    pub fn load(path: &Path) -> Result<Self, LoadError> {
        let library = open(path)?;
        let table = Self::resolve(library)?;
        tracing::debug!(path = %path.display(), "resolved native webview symbols");
        Ok(table)
    }
}

/// Copy a typed function pointer out of the library.
///
/// # Safety
///
/// `T` must match the C signature of the exported symbol.
unsafe fn symbol<T: Copy>(library: &Library, name: &'static str) -> Result<T, LoadError> {
    let symbol = unsafe { library.get::<T>(name.as_bytes()) }.map_err(|e| {
        LoadError::MissingSymbol {
            name,
            reason: e.to_string(),
        }
    })?;
    Ok(*symbol)
}

#[cfg(unix)]
fn open(path: &Path) -> Result<Library, LoadError> {
    use libloading::os::unix::{Library as UnixLibrary, RTLD_GLOBAL, RTLD_LAZY};

    let library = unsafe { UnixLibrary::open(Some(path), RTLD_LAZY | RTLD_GLOBAL) }.map_err(
        |e| LoadError::Library {
            path: path.to_path_buf(),
            reason: e.to_string(),
        },
    )?;
    let raw = library.into_raw();
    if raw.is_null() {
        return Err(LoadError::NullHandle {
            path: path.to_path_buf(),
        });
    }
    Ok(Library::from(unsafe { UnixLibrary::from_raw(raw) }))
}

#[cfg(not(unix))]
fn open(path: &Path) -> Result<Library, LoadError> {
    unsafe { Library::new(path) }.map_err(|e| LoadError::Library {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

/// Directories searched for the library, in priority order.
pub fn search_dirs() -> Vec<PathBuf> {
    let mut dirs = Vec::new();
    if let Some(dir) = std::env::var_os(LIBRARY_PATH_ENV).filter(|v| !v.is_empty()) {
        dirs.push(PathBuf::from(dir));
    }
    if let Some(exe_dir) = std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(Path::to_path_buf))
    {
        let frameworks = exe_dir.join("..").join("Frameworks");
        dirs.push(exe_dir);
        // App bundles keep shared libraries next to the MacOS/ directory.
        if cfg!(target_os = "macos") {
            dirs.push(frameworks);
        }
    }
    dirs
}

/// First `dir/name` that exists, or the bare `name` so the system loader
/// can search its own paths.
pub fn find_library(name: &str, dirs: &[PathBuf]) -> PathBuf {
    dirs.iter()
        .map(|dir| dir.join(name))
        .find(|candidate| candidate.exists())
        .unwrap_or_else(|| PathBuf::from(name))
}

/// Resolved path of the platform library.
pub fn library_path() -> PathBuf {
    find_library(LIBRARY_NAME, &search_dirs())
}

/// At-most-once initialization gate.
///
/// The first caller runs the loader; its result, success or failure, is
/// stored and handed to every later caller without retrying.
pub struct LoadGate<T> {
    cell: OnceCell<Result<T, LoadError>>,
}

impl<T> LoadGate<T> {
    pub const fn new() -> Self {
        Self {
            cell: OnceCell::new(),
        }
    }

    pub fn get_or_load(
        &self,
        load: impl FnOnce() -> Result<T, LoadError>,
    ) -> Result<&T, LoadError> {
        self.cell.get_or_init(load).as_ref().map_err(Clone::clone)
    }

    /// The loaded value, if the first attempt succeeded.
    pub fn get(&self) -> Option<&T> {
        self.cell.get().and_then(|r| r.as_ref().ok())
    }
}

impl<T> Default for LoadGate<T> {
    fn default() -> Self {
        Self::new()
    }
}
