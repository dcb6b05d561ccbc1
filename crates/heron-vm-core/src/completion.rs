//! Completion values (ES5 8.9)
//!
//! Every handler produces a [`Completion`]. Inside the core a throw travels
//! as `Err(VmError)` through `?`; the dispatch loop turns it back into
//! [`Completion::Throw`] at the frame boundary.

use crate::error::{VmError, VmResult};
use crate::value::Value;

/// Result of evaluating an operation
#[derive(Debug, Clone, Default)]
pub enum Completion {
    /// No value
    #[default]
    Empty,
    /// Normal completion with a value
    Normal(Value),
    /// Thrown exception
    Throw(Value),
    /// `return`
    Return(Value),
    /// `break`, with an optional value
    Break(Option<Value>),
    /// `continue`, with an optional value
    Continue(Option<Value>),
}

impl Completion {
    /// Empty completion
    #[inline]
    pub const fn empty() -> Self {
        Self::Empty
    }

    /// Normal completion
    #[inline]
    pub fn normal(value: Value) -> Self {
        Self::Normal(value)
    }

    /// Normal completion carrying a boolean
    #[inline]
    pub fn boolean(b: bool) -> Self {
        Self::Normal(Value::Boolean(b))
    }

    /// Normal completion carrying undefined
    #[inline]
    pub fn undefined() -> Self {
        Self::Normal(Value::Undefined)
    }

    /// Throw completion
    #[inline]
    pub fn throw(value: Value) -> Self {
        Self::Throw(value)
    }

    /// Return completion
    #[inline]
    pub fn ret(value: Value) -> Self {
        Self::Return(value)
    }

    /// Check for a throw
    #[inline]
    pub fn is_throw(&self) -> bool {
        matches!(self, Self::Throw(_))
    }

    /// Check for a normal completion
    #[inline]
    pub fn is_normal(&self) -> bool {
        matches!(self, Self::Normal(_))
    }

    /// Check for an empty completion
    #[inline]
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    /// Borrow the carried value, if any
    pub fn value(&self) -> Option<&Value> {
        match self {
            Self::Normal(v) | Self::Throw(v) | Self::Return(v) => Some(v),
            Self::Break(v) | Self::Continue(v) => v.as_ref(),
            Self::Empty => None,
        }
    }

    /// Take the carried value, if any
    pub fn into_value(self) -> Option<Value> {
        match self {
            Self::Normal(v) | Self::Throw(v) | Self::Return(v) => Some(v),
            Self::Break(v) | Self::Continue(v) => v,
            Self::Empty => None,
        }
    }

    /// Resume throw propagation with `?`; other completions yield their
    /// value or undefined
    pub fn into_result(self) -> VmResult<Value> {
        match self {
            Self::Throw(v) => Err(VmError::exception(v)),
            other => Ok(other.into_value().unwrap_or_default()),
        }
    }
}

/// Outcome of running global code, as seen by the embedder
#[derive(Debug, Clone)]
pub enum CompletionCode {
    /// Ran to completion
    Ok,
    /// An exception escaped the global code
    UnhandledException(Value),
}

impl CompletionCode {
    /// Check for a clean run
    #[inline]
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok)
    }

    /// The uncaught exception, if any
    pub fn exception(&self) -> Option<&Value> {
        match self {
            Self::UnhandledException(v) => Some(v),
            Self::Ok => None,
        }
    }
}
