//! In-process stand-in for the native engine.
//!
//! Every entry point is a plain `extern "C"` function that records what it
//! was asked to do, keyed by window handle so tests can run in parallel.
//! `webview_dispatch` runs the callback immediately; bound callbacks are
//! fired by [`call_binding`] from a fresh thread, the way the engine calls
//! them from its own.

use std::collections::HashMap;
use std::ffi::{CString, c_char, c_int, c_void};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use once_cell::sync::Lazy;
use parking_lot::{Condvar, Mutex};

use crate::bridge::callback::read_c_str;
use crate::loader::{BindingCallback, DispatchCallback, RawWindow, SymbolTable};
use crate::runtime::Runtime;
use crate::window::WindowHandle;

/// Parent pointer that makes `webview_create` fail.
pub(crate) const REJECT_PARENT: usize = 0xdead;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Call {
    Create { debug: bool },
    Destroy,
    Run,
    Terminate,
    SetTitle(String),
    SetSize(i32, i32, i32),
    Navigate(String),
    SetHtml(String),
    Init(String),
    Eval(String),
    Bind(String),
    Unbind(String),
}

#[derive(Default)]
struct Engine {
    calls: HashMap<usize, Vec<Call>>,
    bindings: HashMap<(usize, String), (BindingCallback, usize)>,
    returns: HashMap<(usize, String), (i32, String)>,
}

static ENGINE: Lazy<Mutex<Engine>> = Lazy::new(Default::default);
static RETURNED: Condvar = Condvar::new();
static NEXT_WINDOW: AtomicUsize = AtomicUsize::new(0x1000);

static INSTALLED: Lazy<&'static Runtime> =
    Lazy::new(|| Runtime::install(Runtime::new(fake_symbols())));

/// Install the fake engine as the process runtime.
pub(crate) fn install() -> &'static Runtime {
    *INSTALLED
}

/// Everything recorded for `window`, in call order.
pub(crate) fn calls(window: WindowHandle) -> Vec<Call> {
    ENGINE
        .lock()
        .calls
        .get(&window.0)
        .cloned()
        .unwrap_or_default()
}

/// Fire the binding callback registered for `name`, the way JavaScript
/// would. Returns `false` if nothing is bound under that name.
pub(crate) fn call_binding(window: WindowHandle, name: &str, id: &str, req: &str) -> bool {
    let Some((callback, arg)) = ENGINE
        .lock()
        .bindings
        .get(&(window.0, name.to_string()))
        .copied()
    else {
        return false;
    };
    let id = CString::new(id).unwrap();
    let req = CString::new(req).unwrap();
    std::thread::spawn(move || unsafe {
        callback(id.as_ptr(), req.as_ptr(), arg as *mut c_void);
    })
    .join()
    .unwrap();
    true
}

/// Block until `webview_return` has been called for request `id`.
pub(crate) fn wait_return(window: WindowHandle, id: &str) -> (i32, String) {
    let deadline = Instant::now() + Duration::from_secs(5);
    let key = (window.0, id.to_string());
    let mut engine = ENGINE.lock();
    loop {
        if let Some(reply) = engine.returns.remove(&key) {
            return reply;
        }
        if RETURNED.wait_until(&mut engine, deadline).timed_out() {
            panic!("no reply for request {id}");
        }
    }
}

fn record(window: RawWindow, call: Call) {
    ENGINE
        .lock()
        .calls
        .entry(window as usize)
        .or_default()
        .push(call);
}

fn fake_symbols() -> SymbolTable {
    SymbolTable {
        create: fake_create,
        destroy: fake_destroy,
        run: fake_run,
        terminate: fake_terminate,
        dispatch: fake_dispatch,
        get_window: fake_get_window,
        set_title: fake_set_title,
        set_size: fake_set_size,
        navigate: fake_navigate,
        set_html: fake_set_html,
        init: fake_init,
        eval: fake_eval,
        bind: fake_bind,
        unbind: fake_unbind,
        ret: fake_return,
        _library: None,
    }
}

unsafe extern "C" fn fake_create(debug: c_int, parent: *mut c_void) -> RawWindow {
    if parent as usize == REJECT_PARENT {
        return std::ptr::null_mut();
    }
    let window = NEXT_WINDOW.fetch_add(0x10, Ordering::Relaxed) as RawWindow;
    record(window, Call::Create { debug: debug != 0 });
    window
}

unsafe extern "C" fn fake_destroy(w: RawWindow) -> c_int {
    record(w, Call::Destroy);
    0
}

unsafe extern "C" fn fake_run(w: RawWindow) -> c_int {
    record(w, Call::Run);
    0
}

unsafe extern "C" fn fake_terminate(w: RawWindow) -> c_int {
    record(w, Call::Terminate);
    0
}

unsafe extern "C" fn fake_dispatch(w: RawWindow, f: DispatchCallback, arg: *mut c_void) -> c_int {
    unsafe { f(w, arg) };
    0
}

unsafe extern "C" fn fake_get_window(w: RawWindow) -> *mut c_void {
    (w as usize + 1) as *mut c_void
}

macro_rules! fake_string_fn {
    ($($name:ident => $call:ident,)*) => {
        $(
            unsafe extern "C" fn $name(w: RawWindow, s: *const c_char) -> c_int {
                record(w, Call::$call(unsafe { read_c_str(s) }));
                0
            }
        )*
    };
}

fake_string_fn! {
    fake_set_title => SetTitle,
    fake_navigate => Navigate,
    fake_set_html => SetHtml,
    fake_init => Init,
    fake_eval => Eval,
}

unsafe extern "C" fn fake_set_size(w: RawWindow, width: c_int, height: c_int, hint: c_int) -> c_int {
    record(w, Call::SetSize(width, height, hint));
    0
}

unsafe extern "C" fn fake_bind(
    w: RawWindow,
    name: *const c_char,
    f: BindingCallback,
    arg: *mut c_void,
) -> c_int {
    let name = unsafe { read_c_str(name) };
    record(w, Call::Bind(name.clone()));
    ENGINE
        .lock()
        .bindings
        .insert((w as usize, name), (f, arg as usize));
    0
}

unsafe extern "C" fn fake_unbind(w: RawWindow, name: *const c_char) -> c_int {
    let name = unsafe { read_c_str(name) };
    record(w, Call::Unbind(name.clone()));
    ENGINE.lock().bindings.remove(&(w as usize, name));
    0
}

unsafe extern "C" fn fake_return(
    w: RawWindow,
    id: *const c_char,
    status: c_int,
    result: *const c_char,
) -> c_int {
    let id = unsafe { read_c_str(id) };
    let result = unsafe { read_c_str(result) };
    ENGINE
        .lock()
        .returns
        .insert((w as usize, id), (status, result));
    RETURNED.notify_all();
    0
}
