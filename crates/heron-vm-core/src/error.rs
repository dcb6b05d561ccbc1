//! VM error types

use crate::value::Value;
use thiserror::Error;

/// VM execution errors
///
/// The first five variants are script errors: they become a thrown value
/// when they reach a frame boundary. `Bytecode` and `Internal` are engine
/// faults and escape every entry point untouched.
#[derive(Debug, Error)]
pub enum VmError {
    /// Type error (e.g., calling non-function)
    #[error("TypeError: {0}")]
    TypeError(String),

    /// Reference error (unresolvable identifier)
    #[error("ReferenceError: {0}")]
    ReferenceError(String),

    /// Range error (e.g., call depth exceeded)
    #[error("RangeError: {0}")]
    RangeError(String),

    /// Syntax error raised by eval code
    #[error("SyntaxError: {0}")]
    SyntaxError(String),

    /// Thrown JS exception
    #[error("Uncaught exception: {0}")]
    Exception(Box<ThrownValue>),

    /// Malformed bytecode
    #[error("Bytecode error: {0}")]
    Bytecode(#[from] heron_vm_bytecode::BytecodeError),

    /// Internal error
    #[error("InternalError: {0}")]
    Internal(String),
}

/// A thrown JavaScript value
#[derive(Debug)]
pub struct ThrownValue {
    /// The thrown value
    pub value: Value,
    /// Rendering of the value at throw time
    pub message: String,
}

impl std::fmt::Display for ThrownValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl VmError {
    /// Create a type error
    pub fn type_error(msg: impl Into<String>) -> Self {
        Self::TypeError(msg.into())
    }

    /// Create a reference error
    pub fn reference_error(msg: impl Into<String>) -> Self {
        Self::ReferenceError(msg.into())
    }

    /// Create a range error
    pub fn range_error(msg: impl Into<String>) -> Self {
        Self::RangeError(msg.into())
    }

    /// Create a syntax error
    pub fn syntax_error(msg: impl Into<String>) -> Self {
        Self::SyntaxError(msg.into())
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Create an exception from a thrown JS value
    pub fn exception(value: Value) -> Self {
        let message = value.describe();
        Self::Exception(Box::new(ThrownValue { value, message }))
    }

    /// Can script code observe this error as a thrown value
    pub fn is_script_error(&self) -> bool {
        !matches!(self, Self::Bytecode(_) | Self::Internal(_))
    }

    /// The thrown value, if this is an exception
    pub fn thrown_value(&self) -> Option<&Value> {
        match self {
            Self::Exception(thrown) => Some(&thrown.value),
            _ => None,
        }
    }
}

/// Result type for VM operations
pub type VmResult<T> = std::result::Result<T, VmError>;

#[cfg(test)]
mod tests {
    use super::*;
    use heron_vm_bytecode::BytecodeError;

    #[test]
    fn test_script_error_classification() {
        assert!(VmError::type_error("x").is_script_error());
        assert!(VmError::exception(Value::Number(1.0)).is_script_error());
        assert!(!VmError::internal("x").is_script_error());
        assert!(!VmError::from(BytecodeError::InvalidOpcode(0xff)).is_script_error());
    }

    #[test]
    fn test_exception_message() {
        let err = VmError::exception(Value::string("boom"));
        assert_eq!(err.to_string(), "Uncaught exception: boom");
        assert_eq!(err.thrown_value().and_then(Value::as_string).map(|s| s.as_str()), Some("boom"));
    }
}
