//! Typed Rust closures exposed to JavaScript.
//!
//! A bound function is validated once, when it is bound, producing an
//! [`Invoker`] that accepts the raw `(id, request)` pair handed over by the
//! native engine. The `extern "C"` trampolines in [`callback`] route native
//! callbacks to those invokers.

mod args;
pub(crate) mod callback;
mod invoker;

pub use args::{Param, ParamInfo, ReturnShape, Signature, Variadic};
pub use invoker::{Bindable, IntoReturn, Invoker, Json, encode_error, marshal};
