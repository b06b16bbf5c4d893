//! Safe facade over one native webview instance.

use std::ffi::{CString, c_int, c_void};
use std::fmt;
use std::sync::Arc;

use crate::bridge::{Bindable, Invoker};
use crate::error::{BindError, Error};
use crate::loader::{RawWindow, StringFn};
use crate::methods::Binder;
use crate::runtime::Runtime;

/// Opaque native `webview_t`. Never dereferenced on the Rust side.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WindowHandle(pub(crate) usize);

impl WindowHandle {
    pub(crate) fn from_raw(raw: RawWindow) -> Option<Self> {
        (!raw.is_null()).then_some(Self(raw as usize))
    }

    pub fn as_raw(self) -> RawWindow {
        self.0 as RawWindow
    }
}

/// Window size hint passed to `webview_set_size`.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Hint {
    /// Width and height are default size.
    #[default]
    None = 0,
    /// Width and height are minimum bounds.
    Min = 1,
    /// Width and height are maximum bounds.
    Max = 2,
    /// Window size can not be changed by a user.
    Fixed = 3,
}

/// A native window and its embedded webview.
///
/// Mutating calls belong on the UI thread (the one running [`Window::run`]);
/// from elsewhere go through [`Window::dispatch`] or a [`WindowProxy`].
/// [`Window::destroy`] consumes the value, so a destroyed window cannot be
/// touched again.
pub struct Window {
    handle: WindowHandle,
    runtime: &'static Runtime,
}

impl Window {
    /// Create a new top-level window. `debug` enables developer tools where
    /// the platform supports them.
    pub fn new(debug: bool) -> Result<Self, Error> {
        unsafe { Self::with_parent(debug, std::ptr::null_mut()) }
    }

    /// Create a webview embedded into an existing native window.
    ///
    /// # Safety
    ///
    /// `parent` must be null or a live `GtkWindow`, `NSWindow` or `HWND`
    /// pointer for the current platform.
    pub unsafe fn with_parent(debug: bool, parent: *mut c_void) -> Result<Self, Error> {
        let runtime = Runtime::init()?;
        let raw = unsafe { (runtime.symbols().create)(c_int::from(debug), parent) };
        let handle = WindowHandle::from_raw(raw).ok_or(Error::CreateFailed)?;
        let dev_tools = debug;
        tracing::debug!(handle = handle.0, dev_tools, "created webview");
        Ok(Self { handle, runtime })
    }

    pub fn handle(&self) -> WindowHandle {
        self.handle
    }

    /// Run the main loop until terminated.
    pub fn run(&self) {
        unsafe {
            (self.runtime.symbols().run)(self.handle.as_raw());
        }
    }

    /// Stop the main loop. Safe to call from a background thread.
    pub fn terminate(&self) {
        self.proxy().terminate();
    }

    /// Run `f` on the UI thread.
    pub fn dispatch(&self, f: impl FnOnce() + Send + 'static) {
        self.proxy().dispatch(f);
    }

    /// Destroy the window. Bindings owned by it are dropped so their names
    /// can be bound again, along with any dispatched work it never ran.
    pub fn destroy(self) {
        let dropped = self.runtime.dispatch_table().purge_window(self.handle);
        if dropped > 0 {
            tracing::debug!(handle = self.handle.0, dropped, "dropped pending dispatches");
        }
        let freed = self.runtime.bindings().purge_window(self.handle);
        if !freed.is_empty() {
            tracing::debug!(handle = self.handle.0, ?freed, "dropped bindings");
        }
        unsafe {
            (self.runtime.symbols().destroy)(self.handle.as_raw());
        }
    }

    /// Native window pointer: `GtkWindow`, `NSWindow` or `HWND`.
    pub fn native_window(&self) -> *mut c_void {
        unsafe { (self.runtime.symbols().get_window)(self.handle.as_raw()) }
    }

    pub fn set_title(&self, title: &str) {
        self.call_str(self.runtime.symbols().set_title, title);
    }

    pub fn set_size(&self, width: i32, height: i32, hint: Hint) {
        unsafe {
            (self.runtime.symbols().set_size)(self.handle.as_raw(), width, height, hint as c_int);
        }
    }

    pub fn navigate(&self, url: &str) {
        self.call_str(self.runtime.symbols().navigate, url);
    }

    pub fn set_html(&self, html: &str) {
        self.call_str(self.runtime.symbols().set_html, html);
    }

    /// Inject JavaScript that runs before `window.onload` on every page.
    pub fn init(&self, js: &str) {
        self.call_str(self.runtime.symbols().init, js);
    }

    /// Evaluate JavaScript in the current page. The result is ignored.
    pub fn eval(&self, js: &str) {
        self.call_str(self.runtime.symbols().eval, js);
    }

    /// Expose `f` to JavaScript as a global `name` returning a promise.
    ///
    /// The request's JSON array is decoded into `f`'s parameters; the
    /// promise resolves with the JSON-encoded result or rejects with the
    /// error message. Calls run on the shared blocking pool.
    pub fn bind<F, Args, Ret>(&self, name: &str, f: F) -> Result<(), BindError>
    where
        F: Bindable<Args, Ret>,
        Args: 'static,
        Ret: 'static,
    {
        let invoker = Invoker::new(f)?;
        self.bind_invoker(name, invoker)
    }

    /// Bind an already validated invoker.
    pub fn bind_invoker(&self, name: &str, invoker: Invoker) -> Result<(), BindError> {
        if name.is_empty() || name.contains('\0') {
            return Err(BindError::InvalidName(name.to_string()));
        }
        self.runtime.bind(self.handle, name, Arc::new(invoker))
    }

    /// Remove a binding created with [`Window::bind`].
    pub fn unbind(&self, name: &str) -> Result<(), BindError> {
        self.runtime.unbind(self.handle, name)
    }

    /// A copyable handle for driving this window from other threads.
    pub fn proxy(&self) -> WindowProxy {
        WindowProxy {
            handle: self.handle,
            runtime: self.runtime,
        }
    }

    fn call_str(&self, f: StringFn, s: &str) {
        call_str(self.handle, f, s);
    }
}

impl fmt::Debug for Window {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Window").field("handle", &self.handle).finish()
    }
}

impl Binder for Window {
    fn bind_invoker(&self, name: &str, invoker: Invoker) -> Result<(), BindError> {
        Window::bind_invoker(self, name, invoker)
    }
}

/// Thread-safe remote for a [`Window`].
///
/// Every operation is posted to the UI thread except `terminate`, which the
/// engine accepts from any thread on non-Windows platforms. A proxy must not
/// outlive the window it was taken from.
#[derive(Clone, Copy)]
pub struct WindowProxy {
    handle: WindowHandle,
    runtime: &'static Runtime,
}

impl WindowProxy {
    pub fn handle(&self) -> WindowHandle {
        self.handle
    }

    pub fn dispatch(&self, f: impl FnOnce() + Send + 'static) {
        self.runtime.dispatch(self.handle, Box::new(f));
    }

    pub fn terminate(&self) {
        // WebView2 only accepts terminate from its own thread.
        if cfg!(target_os = "windows") {
            let proxy = *self;
            self.dispatch(move || proxy.terminate_now());
        } else {
            self.terminate_now();
        }
    }

    /// Evaluate `js` on the UI thread.
    pub fn eval(&self, js: impl Into<String>) {
        let js = js.into();
        let proxy = *self;
        self.dispatch(move || {
            call_str(proxy.handle, proxy.runtime.symbols().eval, &js);
        });
    }

    fn terminate_now(&self) {
        unsafe {
            (self.runtime.symbols().terminate)(self.handle.as_raw());
        }
    }
}

impl fmt::Debug for WindowProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WindowProxy")
            .field("handle", &self.handle)
            .finish()
    }
}

fn call_str(handle: WindowHandle, f: StringFn, s: &str) {
    let c = native_string(s);
    unsafe {
        f(handle.as_raw(), c.as_ptr());
    }
}

/// NUL-terminated copy of `s`, cut at the first interior NUL as C would read it.
fn native_string(s: &str) -> CString {
    CString::new(s).unwrap_or_else(|e| {
        let position = e.nul_position();
        tracing::warn!(position, "string contains interior NUL, truncating");
        let mut bytes = e.into_vec();
        bytes.truncate(position);
        CString::new(bytes).unwrap_or_default()
    })
}
