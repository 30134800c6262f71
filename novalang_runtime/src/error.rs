//! Runtime error types surfaced when a compiled NovaLang program executes.
//!
//! These are the errors a `StaticCall` dispatched against the stdlib
//! registration catalog (see [`crate::registration`]) can fail with; they
//! are distinct from the compiler's own `LexicalError`/`ParseError`/
//! `SemanticError` family, which never reach this crate.

use thiserror::Error;

/// An error raised while executing a compiled NovaLang program.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// Type mismatch error
    #[error("TypeError: {0}")]
    TypeError(String),

    /// Method not found error (dynamic dispatch failure)
    #[error("MethodError: no method matching {0}")]
    MethodError(String),

    /// Index out of bounds error
    #[error("BoundsError: attempt to access index {index} of array with length {length}")]
    BoundsError {
        /// Attempted index
        index: usize,
        /// Array length
        length: usize,
    },

    /// Division by zero error
    #[error("DivideError: integer division error")]
    DivisionByZero,

    /// Invalid argument error
    #[error("ArgumentError: {0}")]
    ArgumentError(String),

    /// Key not found in a map
    #[error("KeyError: key {0} not found")]
    KeyError(String),

    /// Field not found on a value
    #[error("FieldError: field {0} not found in type {1}")]
    FieldError(String, String),

    /// Stack overflow error
    #[error("StackOverflowError: stack overflow")]
    StackOverflow,

    /// Null dereference at runtime (a `!!` assertion failure)
    #[error("NullPointerError: {0}")]
    NullPointer(String),

    /// Assertion failure
    #[error("AssertionError: {0}")]
    AssertionError(String),

    /// An uncaught user-thrown value reaching the top level
    #[error("UncaughtError: {0}")]
    Uncaught(String),

    /// Unimplemented feature
    #[error("UnimplementedError: {0}")]
    Unimplemented(String),

    /// Generic error with custom message
    #[error("{0}")]
    Custom(String),
}

impl RuntimeError {
    /// Create a type error
    pub fn type_error<S: Into<String>>(msg: S) -> Self {
        RuntimeError::TypeError(msg.into())
    }

    /// Create a method error
    pub fn method_error<S: Into<String>>(method: S) -> Self {
        RuntimeError::MethodError(method.into())
    }

    /// Create a bounds error
    pub fn bounds_error(index: usize, length: usize) -> Self {
        RuntimeError::BoundsError { index, length }
    }

    /// Create an argument error
    pub fn argument_error<S: Into<String>>(msg: S) -> Self {
        RuntimeError::ArgumentError(msg.into())
    }

    /// Create a key error
    pub fn key_error<S: Into<String>>(key: S) -> Self {
        RuntimeError::KeyError(key.into())
    }

    /// Create a field error
    pub fn field_error<S1: Into<String>, S2: Into<String>>(field: S1, type_name: S2) -> Self {
        RuntimeError::FieldError(field.into(), type_name.into())
    }

    /// Create a null-pointer error
    pub fn null_pointer<S: Into<String>>(msg: S) -> Self {
        RuntimeError::NullPointer(msg.into())
    }

    /// Create an assertion error
    pub fn assertion_error<S: Into<String>>(msg: S) -> Self {
        RuntimeError::AssertionError(msg.into())
    }

    /// Create an uncaught-error wrapper around a thrown value's message
    pub fn uncaught<S: Into<String>>(msg: S) -> Self {
        RuntimeError::Uncaught(msg.into())
    }

    /// Create an unimplemented error
    pub fn unimplemented<S: Into<String>>(feature: S) -> Self {
        RuntimeError::Unimplemented(feature.into())
    }

    /// Create a custom error
    pub fn custom<S: Into<String>>(msg: S) -> Self {
        RuntimeError::Custom(msg.into())
    }
}

/// Result type alias for NovaLang runtime operations
pub type RuntimeResult<T> = Result<T, RuntimeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RuntimeError::type_error("expected Int, got Double");
        assert_eq!(format!("{}", err), "TypeError: expected Int, got Double");

        let err = RuntimeError::bounds_error(10, 5);
        assert_eq!(
            format!("{}", err),
            "BoundsError: attempt to access index 10 of array with length 5"
        );

        let err = RuntimeError::DivisionByZero;
        assert_eq!(format!("{}", err), "DivideError: integer division error");
    }

    #[test]
    fn test_error_constructors() {
        let _ = RuntimeError::method_error("add(Int, String)");
        let _ = RuntimeError::key_error("missing_key");
        let _ = RuntimeError::field_error("x", "Point");
    }
}
