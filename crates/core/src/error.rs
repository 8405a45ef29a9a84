//! Error types for the verdict fact store.

use crate::types::DataType;
use thiserror::Error as ThisError;

/// Result type alias for verdict operations.
pub type Result<T> = core::result::Result<T, Error>;

/// Error types for engine, statement and resolver operations.
///
/// Every variant except `ResourceExhausted` is locally recoverable: the
/// operation that produced it left the store as it was before the call.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum Error {
    /// Unknown table, column, index, target, function or transaction name.
    #[error("{kind} not found: {name}")]
    NotFound { kind: &'static str, name: String },

    /// A value or binding does not match the declared column or slot type.
    #[error("type mismatch: expected {expected}, got {got}")]
    TypeMismatch { expected: DataType, got: DataType },

    /// Unique index collision or duplicate definition.
    #[error("constraint violation: {message}")]
    ConstraintViolation { message: String },

    /// Operation on a closed, stale or out-of-order handle.
    #[error("invalid handle: {message}")]
    InvalidHandle { message: String },

    /// Malformed statement or ruleset text.
    #[error("parse error at {position}: {message}")]
    ParseError { message: String, position: usize },

    /// The resolver dependency graph has a cycle through these targets.
    #[error("dependency cycle detected: {}", targets.join(" -> "))]
    CycleDetected { targets: Vec<String> },

    /// A target update script failed.
    #[error("{script}:{line}: {message}")]
    ScriptError {
        script: String,
        line: u32,
        message: String,
    },

    /// A configured limit or allocation was exhausted.
    #[error("resource exhausted: {message}")]
    ResourceExhausted { message: String },

    /// Invalid schema definition.
    #[error("invalid schema: {message}")]
    InvalidSchema { message: String },

    /// Operation not allowed in the current state.
    #[error("invalid operation: {message}")]
    InvalidOperation { message: String },
}

/// Discriminant of an [`Error`], for callers that branch on the error class.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    TypeMismatch,
    ConstraintViolation,
    InvalidHandle,
    ParseError,
    CycleDetected,
    ScriptError,
    ResourceExhausted,
    InvalidSchema,
    InvalidOperation,
}

impl Error {
    /// Returns the class of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::NotFound { .. } => ErrorKind::NotFound,
            Error::TypeMismatch { .. } => ErrorKind::TypeMismatch,
            Error::ConstraintViolation { .. } => ErrorKind::ConstraintViolation,
            Error::InvalidHandle { .. } => ErrorKind::InvalidHandle,
            Error::ParseError { .. } => ErrorKind::ParseError,
            Error::CycleDetected { .. } => ErrorKind::CycleDetected,
            Error::ScriptError { .. } => ErrorKind::ScriptError,
            Error::ResourceExhausted { .. } => ErrorKind::ResourceExhausted,
            Error::InvalidSchema { .. } => ErrorKind::InvalidSchema,
            Error::InvalidOperation { .. } => ErrorKind::InvalidOperation,
        }
    }

    /// Returns true unless this error is fatal to the calling operation.
    pub fn is_recoverable(&self) -> bool {
        self.kind() != ErrorKind::ResourceExhausted
    }

    /// Creates a not found error for an arbitrary object kind.
    pub fn not_found(kind: &'static str, name: impl Into<String>) -> Self {
        Error::NotFound {
            kind,
            name: name.into(),
        }
    }

    /// Creates a table not found error.
    pub fn table_not_found(name: impl Into<String>) -> Self {
        Self::not_found("table", name)
    }

    /// Creates a column not found error.
    pub fn column_not_found(table: &str, column: &str) -> Self {
        Self::not_found("column", format!("{}.{}", table, column))
    }

    /// Creates a type mismatch error.
    pub fn type_mismatch(expected: DataType, got: DataType) -> Self {
        Error::TypeMismatch { expected, got }
    }

    /// Creates a constraint violation error.
    pub fn constraint(message: impl Into<String>) -> Self {
        Error::ConstraintViolation {
            message: message.into(),
        }
    }

    /// Creates an invalid handle error.
    pub fn invalid_handle(message: impl Into<String>) -> Self {
        Error::InvalidHandle {
            message: message.into(),
        }
    }

    /// Creates a parse error at the given position.
    pub fn parse(message: impl Into<String>, position: usize) -> Self {
        Error::ParseError {
            message: message.into(),
            position,
        }
    }

    /// Creates a cycle error naming the targets involved.
    pub fn cycle(targets: Vec<String>) -> Self {
        Error::CycleDetected { targets }
    }

    /// Creates a script error located at `script:line`.
    pub fn script(script: impl Into<String>, line: u32, message: impl Into<String>) -> Self {
        Error::ScriptError {
            script: script.into(),
            line,
            message: message.into(),
        }
    }

    /// Creates a resource exhausted error.
    pub fn exhausted(message: impl Into<String>) -> Self {
        Error::ResourceExhausted {
            message: message.into(),
        }
    }

    /// Creates an invalid schema error.
    pub fn invalid_schema(message: impl Into<String>) -> Self {
        Error::InvalidSchema {
            message: message.into(),
        }
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Error::InvalidOperation {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::type_mismatch(DataType::Integer, DataType::String);
        assert_eq!(err.to_string(), "type mismatch: expected INTEGER, got STRING");

        let err = Error::table_not_found("temp");
        assert_eq!(err.to_string(), "table not found: temp");

        let err = Error::script("rules.conf", 12, "unknown function frob");
        assert_eq!(err.to_string(), "rules.conf:12: unknown function frob");

        let err = Error::cycle(vec!["a".into(), "b".into(), "a".into()]);
        assert!(err.to_string().contains("a -> b -> a"));
    }

    #[test]
    fn test_error_kind() {
        assert_eq!(Error::column_not_found("t", "c").kind(), ErrorKind::NotFound);
        assert_eq!(Error::parse("x", 3).kind(), ErrorKind::ParseError);
        assert_eq!(Error::invalid_handle("stale").kind(), ErrorKind::InvalidHandle);
    }

    #[test]
    fn test_error_recoverable() {
        assert!(Error::constraint("dup").is_recoverable());
        assert!(!Error::exhausted("depth").is_recoverable());
    }
}
