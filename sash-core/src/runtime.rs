//! Process-wide runtime context.
//!
//! A [`Runtime`] bundles the resolved symbol table with the dispatch and
//! binding tables. Native callbacks carry only a single word of user data,
//! so the context is installed once per process and the `extern "C"`
//! trampolines reach it through [`Runtime::current`].

use std::ffi::{CString, c_int, c_void};
use std::sync::Arc;

use crate::bridge::Invoker;
use crate::bridge::callback::{binding_trampoline, dispatch_trampoline};
use crate::error::{BindError, LoadError, ReturnStatus};
use crate::loader::{LoadGate, SymbolTable, library_path};
use crate::registry::{BindingTable, DispatchTable, Task};
use crate::window::WindowHandle;

static GLOBAL: LoadGate<Runtime> = LoadGate::new();

pub struct Runtime {
    symbols: SymbolTable,
    dispatch: DispatchTable,
    bindings: BindingTable,
}

impl Runtime {
    pub(crate) fn new(symbols: SymbolTable) -> Self {
        Self {
            symbols,
            dispatch: DispatchTable::new(),
            bindings: BindingTable::new(),
        }
    }

    /// Load the platform library and install the runtime, once.
    ///
    /// Concurrent callers block until the first load finishes; a failure is
    /// cached and returned to every later caller.
    pub fn init() -> Result<&'static Runtime, LoadError> {
        GLOBAL.get_or_load(|| {
            let path = library_path();
            tracing::info!(path = %path.display(), "loading native webview library");
            SymbolTable::load(&path).map(Runtime::new)
        })
    }

    /// The installed runtime, if a load has succeeded.
    pub fn current() -> Option<&'static Runtime> {
        GLOBAL.get()
    }

    /// Install a prepared runtime. Loses to any earlier install or load.
    #[cfg(test)]
    pub(crate) fn install(runtime: Runtime) -> &'static Runtime {
        GLOBAL
            .get_or_load(|| Ok(runtime))
            .expect("runtime gate already holds a load failure")
    }

    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    pub fn dispatch_table(&self) -> &DispatchTable {
        &self.dispatch
    }

    pub fn bindings(&self) -> &BindingTable {
        &self.bindings
    }

    /// Queue `task` and ask the engine to run it on its UI thread.
    pub(crate) fn dispatch(&self, window: WindowHandle, task: Task) {
        let key = self.dispatch.post(window, task);
        unsafe {
            (self.symbols.dispatch)(window.as_raw(), dispatch_trampoline, key as *mut c_void);
        }
    }

    /// Register `invoker` and expose it to JavaScript as `name`.
    pub(crate) fn bind(
        &self,
        window: WindowHandle,
        name: &str,
        invoker: Arc<Invoker>,
    ) -> Result<(), BindError> {
        let c_name = CString::new(name).map_err(|_| BindError::InvalidName(name.to_string()))?;
        let key = self.bindings.register(name, invoker, window)?;
        unsafe {
            (self.symbols.bind)(
                window.as_raw(),
                c_name.as_ptr(),
                binding_trampoline,
                key as *mut c_void,
            );
        }
        Ok(())
    }

    pub(crate) fn unbind(&self, window: WindowHandle, name: &str) -> Result<(), BindError> {
        let c_name = CString::new(name).map_err(|_| BindError::NotBound(name.to_string()))?;
        self.bindings.unregister(name)?;
        unsafe {
            (self.symbols.unbind)(window.as_raw(), c_name.as_ptr());
        }
        Ok(())
    }

    /// Deliver a finished call to the engine via `webview_return`.
    pub(crate) fn complete(&self, window: WindowHandle, id: &str, status: ReturnStatus, json: &str) {
        let (Ok(c_id), Ok(c_json)) = (CString::new(id), CString::new(json)) else {
            tracing::warn!(request = id, "reply contains interior NUL, dropping");
            return;
        };
        unsafe {
            (self.symbols.ret)(
                window.as_raw(),
                c_id.as_ptr(),
                status as c_int,
                c_json.as_ptr(),
            );
        }
    }
}
