//! `extern "C"` trampolines handed to the native engine.
//!
//! The engine calls these from its own threads with the table key as the
//! user-data word. Neither lets a panic cross the boundary.

use std::ffi::{CStr, c_char, c_void};
use std::panic::{AssertUnwindSafe, catch_unwind};

use super::invoker::{marshal, panic_message};
use crate::RUNTIME;
use crate::loader::RawWindow;
use crate::runtime::Runtime;

/// Copy a transient C string. Null reads as empty; invalid UTF-8 is replaced.
///
/// # Safety
///
/// `ptr` must be null or point to a NUL-terminated string that stays valid
/// for the duration of the call.
pub(crate) unsafe fn read_c_str(ptr: *const c_char) -> String {
    if ptr.is_null() {
        return String::new();
    }
    unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned()
}

/// Target of `webview_dispatch`: runs the posted closure for `arg`, at most once.
pub(crate) unsafe extern "C" fn dispatch_trampoline(_window: RawWindow, arg: *mut c_void) {
    let key = arg as usize;
    let Some(runtime) = Runtime::current() else {
        tracing::warn!(key, "dispatch callback before runtime init");
        return;
    };
    let Some(task) = runtime.dispatch_table().take(key) else {
        tracing::debug!(key, "dispatch callback for unknown key");
        return;
    };
    if let Err(payload) = catch_unwind(AssertUnwindSafe(task)) {
        tracing::error!(key, "dispatched closure panicked: {}", panic_message(payload.as_ref()));
    }
}

/// Target of `webview_bind`.
///
/// Copies `id` and `req` before returning, then runs the invoker on the
/// blocking pool; the reply goes out through `webview_return` once it
/// completes.
pub(crate) unsafe extern "C" fn binding_trampoline(
    id: *const c_char,
    req: *const c_char,
    arg: *mut c_void,
) {
    let key = arg as usize;
    let Some(runtime) = Runtime::current() else {
        tracing::warn!(key, "binding callback before runtime init");
        return;
    };
    let Some(entry) = runtime.bindings().lookup(key) else {
        tracing::debug!(key, "binding callback for unknown key");
        return;
    };
    let id = unsafe { read_c_str(id) };
    let req = unsafe { read_c_str(req) };
    tracing::debug!(name = %entry.name, request = %id, "bound call");

    RUNTIME.spawn_blocking(move || {
        let (status, json) = marshal(entry.invoker.invoke(&id, &req));
        runtime.complete(entry.window, &id, status, &json);
    });
}
