//! Typed closures → uniform `(request id, JSON args) → JSON` invokers.

use std::any::TypeId;
use std::collections::{BTreeMap, HashMap};
use std::fmt::Display;
use std::panic::{AssertUnwindSafe, catch_unwind};

use serde::Serialize;
use serde_json::Value;

use super::args::{Param, ParamInfo, ReturnShape, Signature};
use crate::error::{BindError, CallError, ReturnStatus};

/// Return types a bound function may declare.
///
/// `()` has no output, `Result<(), E>` is error-only, `Result<T, E>` is a
/// value plus an error, and the primitive/collection types below are bare
/// values. Wrap any other `Serialize` type in [`Json`].
pub trait IntoReturn {
    fn shape() -> ReturnShape;

    fn into_return(self) -> Result<Value, CallError>;
}

impl IntoReturn for () {
    fn shape() -> ReturnShape {
        ReturnShape::Nothing
    }

    fn into_return(self) -> Result<Value, CallError> {
        Ok(Value::Null)
    }
}

impl<T: Serialize + 'static, E: Display> IntoReturn for Result<T, E> {
    fn shape() -> ReturnShape {
        if TypeId::of::<T>() == TypeId::of::<()>() {
            ReturnShape::ErrorOnly
        } else {
            ReturnShape::ValueAndError
        }
    }

    fn into_return(self) -> Result<Value, CallError> {
        match self {
            Ok(value) => serde_json::to_value(value).map_err(CallError::Encode),
            Err(e) => Err(CallError::Failed(e.to_string())),
        }
    }
}

/// Bare return value serialized with serde.
///
/// ```
/// use sash_core::{Invoker, Json};
///
/// #[derive(serde::Serialize)]
/// struct Greeting { name: String }
///
/// let greet = Invoker::new(|name: String| Json(Greeting { name })).unwrap();
/// assert_eq!(greet.invoke("1", r#"["Alice"]"#).unwrap()["name"], "Alice");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Json<T>(pub T);

impl<T: Serialize> IntoReturn for Json<T> {
    fn shape() -> ReturnShape {
        ReturnShape::Value
    }

    fn into_return(self) -> Result<Value, CallError> {
        serde_json::to_value(self.0).map_err(CallError::Encode)
    }
}

macro_rules! bare_return {
    ($($ty:ty),* $(,)?) => {
        $(
            impl IntoReturn for $ty {
                fn shape() -> ReturnShape {
                    ReturnShape::Value
                }

                fn into_return(self) -> Result<Value, CallError> {
                    serde_json::to_value(self).map_err(CallError::Encode)
                }
            }
        )*
    };
}

bare_return!(
    bool, char, i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, f32, f64,
    String, &'static str, Value,
);

macro_rules! bare_return_generic {
    ($($ty:ident<$($p:ident),+>),* $(,)?) => {
        $(
            impl<$($p: Serialize),+> IntoReturn for $ty<$($p),+> {
                fn shape() -> ReturnShape {
                    ReturnShape::Value
                }

                fn into_return(self) -> Result<Value, CallError> {
                    serde_json::to_value(self).map_err(CallError::Encode)
                }
            }
        )*
    };
}

bare_return_generic!(Vec<T>, Option<T>, BTreeMap<K, V>);

impl<K: Serialize, V: Serialize, S> IntoReturn for HashMap<K, V, S> {
    fn shape() -> ReturnShape {
        ReturnShape::Value
    }

    fn into_return(self) -> Result<Value, CallError> {
        serde_json::to_value(self).map_err(CallError::Encode)
    }
}

/// A closure or function that can be bound under a JavaScript name.
///
/// Implemented for `Fn(A1, .., An) -> R` up to eight parameters, where every
/// `Ai` is a [`Param`] and `R` is an [`IntoReturn`]. Values that are not
/// callable, or whose return type has no error-like shape, do not implement
/// it and are rejected when the program is compiled:
///
/// ```compile_fail
/// let _ = sash_core::Invoker::new("not a function");
/// ```
///
/// ```compile_fail
/// // three outputs
/// let _ = sash_core::Invoker::new(|| (1, 2, 3));
/// ```
///
/// ```compile_fail
/// // second output is not an error
/// let _ = sash_core::Invoker::new(|| -> Result<i32, Vec<u8>> { Ok(1) });
/// ```
pub trait Bindable<Args, Ret>: Send + Sync + 'static {
    /// Parameter and return descriptor, computed once at bind time.
    fn signature() -> Result<Signature, BindError>;

    /// Decode `args` (already arity-checked) and call the function.
    fn call(&self, args: &[Value]) -> Result<Value, CallError>;
}

macro_rules! impl_bindable {
    ($($arg:ident),*) => {
        impl<F, Ret, $($arg,)*> Bindable<($($arg,)*), Ret> for F
        where
            F: Fn($($arg),*) -> Ret + Send + Sync + 'static,
            Ret: IntoReturn,
            $($arg: Param,)*
        {
            fn signature() -> Result<Signature, BindError> {
                Signature::new(vec![$(ParamInfo::of::<$arg>()),*], Ret::shape())
            }

            #[allow(non_snake_case, unused_mut, unused_variables, unused_assignments)]
            fn call(&self, args: &[Value]) -> Result<Value, CallError> {
                let mut position = 0;
                $(
                    let $arg = <$arg as Param>::decode(args, position)?;
                    position += 1;
                )*
                let ret = catch_unwind(AssertUnwindSafe(|| (self)($($arg),*)))
                    .map_err(|payload| CallError::Panicked(panic_message(payload.as_ref())))?;
                ret.into_return()
            }
        }
    };
}

impl_bindable!();
impl_bindable!(A1);
impl_bindable!(A1, A2);
impl_bindable!(A1, A2, A3);
impl_bindable!(A1, A2, A3, A4);
impl_bindable!(A1, A2, A3, A4, A5);
impl_bindable!(A1, A2, A3, A4, A5, A6);
impl_bindable!(A1, A2, A3, A4, A5, A6, A7);
impl_bindable!(A1, A2, A3, A4, A5, A6, A7, A8);

pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

type CallFn = dyn Fn(&[Value]) -> Result<Value, CallError> + Send + Sync;

/// Uniform entry point for one bound function.
///
/// ```
/// use sash_core::Invoker;
///
/// let add = Invoker::new(|a: i64, b: i64| a + b).unwrap();
/// assert_eq!(add.invoke("1", "[3, 4]").unwrap(), 7);
/// assert!(add.invoke("2", "[1]").is_err());
/// ```
pub struct Invoker {
    signature: Signature,
    call: Box<CallFn>,
}

impl Invoker {
    /// Validate `f` and build its invoker. The descriptor is computed here,
    /// once, not on every call.
    pub fn new<F, Args, Ret>(f: F) -> Result<Self, BindError>
    where
        F: Bindable<Args, Ret>,
        Args: 'static,
        Ret: 'static,
    {
        let signature = <F as Bindable<Args, Ret>>::signature()?;
        Ok(Self {
            signature,
            call: Box::new(move |args: &[Value]| <F as Bindable<Args, Ret>>::call(&f, args)),
        })
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    /// Parse `request` as a JSON array, check arity, decode and call.
    pub fn invoke(&self, id: &str, request: &str) -> Result<Value, CallError> {
        let args: Vec<Value> = serde_json::from_str(request).map_err(CallError::Arguments)?;
        self.signature.check_arity(args.len())?;
        let result = (self.call)(&args);
        if let Err(e) = &result {
            tracing::debug!(request = id, "bound call failed: {e}");
        }
        result
    }
}

impl std::fmt::Debug for Invoker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Invoker")
            .field("signature", &self.signature)
            .finish_non_exhaustive()
    }
}

/// Turn a call outcome into the status and JSON payload for `webview_return`.
pub fn marshal(result: Result<Value, CallError>) -> (ReturnStatus, String) {
    match result {
        Ok(value) => match serde_json::to_string(&value) {
            Ok(json) => (ReturnStatus::Ok, json),
            Err(e) => (ReturnStatus::Error, encode_error(&e.to_string())),
        },
        Err(e) => (ReturnStatus::Error, encode_error(&e.to_string())),
    }
}

/// Encode `msg` as a JSON string, falling back to plain quoting.
pub fn encode_error(msg: &str) -> String {
    serde_json::to_string(msg).unwrap_or_else(|_| format!("\"{msg}\""))
}
