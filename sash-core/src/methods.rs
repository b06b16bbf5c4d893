//! Binding a group of related functions under a common prefix.

use crate::bridge::{Bindable, Invoker};
use crate::error::{BindError, BindMethodsError};

/// Anything that can expose an [`Invoker`] to JavaScript.
pub trait Binder {
    fn bind_invoker(&self, name: &str, invoker: Invoker) -> Result<(), BindError>;
}

/// Named methods, bound together by [`bind_methods`].
///
/// ```
/// use sash_core::MethodSet;
///
/// let calc = MethodSet::new()
///     .method("Add", |a: i64, b: i64| a + b)
///     .method("GetUserByID", |id: u32| format!("user-{id}"));
/// assert_eq!(calc.len(), 2);
/// ```
#[derive(Default)]
pub struct MethodSet {
    methods: Vec<(String, Result<Invoker, BindError>)>,
}

impl MethodSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a method under its CamelCase name. Signature problems surface
    /// from [`bind_methods`], at the method they belong to.
    pub fn method<F, Args, Ret>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Bindable<Args, Ret>,
        Args: 'static,
        Ret: 'static,
    {
        self.methods.push((name.into(), Invoker::new(f)));
        self
    }

    pub fn len(&self) -> usize {
        self.methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }
}

/// Bind every method in `set` as `{prefix}_{snake_case_name}`, in insertion
/// order.
///
/// Stops at the first failure; the error carries the names bound before it.
pub fn bind_methods(
    binder: &impl Binder,
    prefix: &str,
    set: MethodSet,
) -> Result<Vec<String>, BindMethodsError> {
    let mut bound = Vec::with_capacity(set.len());
    for (method, invoker) in set.methods {
        let name = format!("{prefix}_{}", camel_to_snake(&method));
        match invoker.and_then(|invoker| binder.bind_invoker(&name, invoker)) {
            Ok(()) => bound.push(name),
            Err(source) => {
                return Err(BindMethodsError {
                    name,
                    bound,
                    source,
                });
            }
        }
    }
    Ok(bound)
}

/// `GetUserByID` → `get_user_by_id`.
///
/// An underscore goes before an uppercase letter that follows a lowercase
/// one, or that starts a new word after an acronym (`HTMLParser` →
/// `html_parser`).
pub fn camel_to_snake(s: &str) -> String {
    let chars: Vec<char> = s.chars().collect();
    let mut out = String::with_capacity(s.len() + 4);
    for (i, &c) in chars.iter().enumerate() {
        if !c.is_uppercase() {
            out.push(c);
            continue;
        }
        if i > 0 {
            let prev_lower = chars[i - 1].is_lowercase();
            let next_lower = chars.get(i + 1).is_some_and(|n| n.is_lowercase());
            if prev_lower || next_lower {
                out.push('_');
            }
        }
        out.extend(c.to_lowercase());
    }
    out
}
