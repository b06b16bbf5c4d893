//! Argument decoding and the per-binding signature descriptor.

use std::fmt;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{BindError, CallError};

/// Trailing parameter that absorbs zero or more arguments.
///
/// Only valid as the last parameter of a bound function; zero trailing
/// arguments decode to an empty `Vec`.
///
/// ```
/// use sash_core::{Invoker, Variadic};
///
/// let sum = Invoker::new(|Variadic(nums): Variadic<i64>| nums.iter().sum::<i64>()).unwrap();
/// assert_eq!(sum.invoke("1", "[1, 2, 3]").unwrap(), 6);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Variadic<T>(pub Vec<T>);

impl<T> Variadic<T> {
    pub fn into_inner(self) -> Vec<T> {
        self.0
    }
}

impl<T> std::ops::Deref for Variadic<T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        &self.0
    }
}

/// A parameter type a bound function may declare.
pub trait Param: Sized {
    /// Whether this parameter swallows every remaining argument.
    const VARIADIC: bool = false;

    fn type_name() -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Decode the parameter at `position` from the full argument list.
    fn decode(args: &[Value], position: usize) -> Result<Self, CallError>;
}

impl<T: DeserializeOwned> Param for T {
    fn decode(args: &[Value], position: usize) -> Result<Self, CallError> {
        let raw = args.get(position).ok_or_else(|| CallError::ArgumentMismatch {
            expected: format!("an argument at position {position}"),
            received: args.len(),
        })?;
        T::deserialize(raw).map_err(|source| CallError::Decode {
            position,
            type_name: Self::type_name(),
            source,
        })
    }
}

impl<T: DeserializeOwned> Param for Variadic<T> {
    const VARIADIC: bool = true;

    fn type_name() -> &'static str {
        std::any::type_name::<T>()
    }

    fn decode(args: &[Value], position: usize) -> Result<Self, CallError> {
        args.get(position..)
            .unwrap_or_default()
            .iter()
            .enumerate()
            .map(|(offset, raw)| {
                T::deserialize(raw).map_err(|source| CallError::Decode {
                    position: position + offset,
                    type_name: Self::type_name(),
                    source,
                })
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Variadic)
    }
}

/// Declared parameter of a bound function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParamInfo {
    pub type_name: &'static str,
    pub variadic: bool,
}

impl ParamInfo {
    pub fn of<P: Param>() -> Self {
        Self {
            type_name: P::type_name(),
            variadic: P::VARIADIC,
        }
    }
}

/// How a bound function's return value maps onto `(result, error)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnShape {
    /// `()`: always `null`, never an error.
    Nothing,
    /// `Result<(), E>`: `null` or the error.
    ErrorOnly,
    /// A plain value, never an error.
    Value,
    /// `Result<T, E>`: the value or the error.
    ValueAndError,
}

/// Descriptor computed once at bind time and consulted on every call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    params: Vec<ParamInfo>,
    returns: ReturnShape,
}

impl Signature {
    /// Validate the parameter list: a variadic parameter may only come last.
    pub fn new(params: Vec<ParamInfo>, returns: ReturnShape) -> Result<Self, BindError> {
        let count = params.len();
        if let Some(position) = params
            .iter()
            .take(count.saturating_sub(1))
            .position(|p| p.variadic)
        {
            return Err(BindError::VariadicNotLast { position, count });
        }
        Ok(Self { params, returns })
    }

    pub fn params(&self) -> &[ParamInfo] {
        &self.params
    }

    pub fn returns(&self) -> ReturnShape {
        self.returns
    }

    pub fn is_variadic(&self) -> bool {
        self.params.last().is_some_and(|p| p.variadic)
    }

    /// Parameters that must be supplied.
    pub fn required(&self) -> usize {
        if self.is_variadic() {
            self.params.len() - 1
        } else {
            self.params.len()
        }
    }

    /// Check the argument count before anything is decoded.
    pub fn check_arity(&self, received: usize) -> Result<(), CallError> {
        let required = self.required();
        let ok = if self.is_variadic() {
            received >= required
        } else {
            received == required
        };
        if ok {
            Ok(())
        } else {
            let expected = if self.is_variadic() {
                format!("at least {required}")
            } else {
                required.to_string()
            };
            Err(CallError::ArgumentMismatch { expected, received })
        }
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("fn(")?;
        for (i, p) in self.params.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            if p.variadic {
                f.write_str("...")?;
            }
            f.write_str(p.type_name)?;
        }
        write!(f, ") -> {:?}", self.returns)
    }
}
