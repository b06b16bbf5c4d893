//! Handle tables routing native callbacks back to Rust.
//!
//! Native callbacks carry a single machine word of user data; these tables
//! map that word to the closure or invoker it stands for. Keys come from
//! monotonic counters and are never reused. Each table has its own lock,
//! held only for the map mutation, never while user code runs.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;

use crate::bridge::Invoker;
use crate::error::BindError;
use crate::window::WindowHandle;

/// Work posted to the engine's UI thread.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Pending dispatched closures, each delivered at most once.
pub struct DispatchTable {
    next: AtomicUsize,
    pending: Mutex<HashMap<usize, (WindowHandle, Task)>>,
}

impl DispatchTable {
    pub fn new() -> Self {
        Self {
            next: AtomicUsize::new(1),
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Register `task`, queued on `window`, under a fresh key.
    pub fn post(&self, window: WindowHandle, task: Task) -> usize {
        let key = self.next.fetch_add(1, Ordering::Relaxed);
        self.pending.lock().insert(key, (window, task));
        key
    }

    /// Remove and return the task for `key`. Unknown or already consumed
    /// keys yield `None`.
    pub fn take(&self, key: usize) -> Option<Task> {
        self.pending.lock().remove(&key).map(|(_, task)| task)
    }

    /// Drop every task still queued on `window`. Returns how many went.
    pub fn purge_window(&self, window: WindowHandle) -> usize {
        let mut pending = self.pending.lock();
        let before = pending.len();
        pending.retain(|_, (owner, _)| *owner != window);
        before - pending.len()
    }

    pub fn len(&self) -> usize {
        self.pending.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for DispatchTable {
    fn default() -> Self {
        Self::new()
    }
}

/// A live binding: the invoker and the window whose `return` receives results.
#[derive(Clone)]
pub struct BindingEntry {
    pub name: String,
    pub invoker: Arc<Invoker>,
    pub window: WindowHandle,
}

#[derive(Default)]
struct Bindings {
    next: usize,
    entries: HashMap<usize, BindingEntry>,
    names: HashMap<String, usize>,
}

/// Bound functions, keyed by handle and indexed by JavaScript name.
#[derive(Default)]
pub struct BindingTable {
    inner: Mutex<Bindings>,
}

impl BindingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `invoker` under `name`. Fails if the name is already bound.
    pub fn register(
        &self,
        name: &str,
        invoker: Arc<Invoker>,
        window: WindowHandle,
    ) -> Result<usize, BindError> {
        let mut inner = self.inner.lock();
        if inner.names.contains_key(name) {
            return Err(BindError::AlreadyBound(name.to_string()));
        }
        inner.next += 1;
        let key = inner.next;
        inner.entries.insert(
            key,
            BindingEntry {
                name: name.to_string(),
                invoker,
                window,
            },
        );
        inner.names.insert(name.to_string(), key);
        tracing::debug!(name, key, "registered binding");
        Ok(key)
    }

    /// Remove the binding for `name` from both indexes.
    pub fn unregister(&self, name: &str) -> Result<usize, BindError> {
        let mut inner = self.inner.lock();
        let key = inner
            .names
            .remove(name)
            .ok_or_else(|| BindError::NotBound(name.to_string()))?;
        inner.entries.remove(&key);
        tracing::debug!(name, key, "removed binding");
        Ok(key)
    }

    pub fn lookup(&self, key: usize) -> Option<BindingEntry> {
        self.inner.lock().entries.get(&key).cloned()
    }

    pub fn is_bound(&self, name: &str) -> bool {
        self.inner.lock().names.contains_key(name)
    }

    /// Drop every binding owned by `window`, returning the freed names.
    pub fn purge_window(&self, window: WindowHandle) -> Vec<String> {
        let mut inner = self.inner.lock();
        let keys: Vec<usize> = inner
            .entries
            .iter()
            .filter(|(_, e)| e.window == window)
            .map(|(k, _)| *k)
            .collect();
        let mut names = Vec::with_capacity(keys.len());
        for key in keys {
            if let Some(entry) = inner.entries.remove(&key) {
                inner.names.remove(&entry.name);
                names.push(entry.name);
            }
        }
        names
    }
}
