//! Error types for Linq Core

use thiserror::Error;

/// Result type alias using Linq Error
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for the linq query engine
///
/// Everything except the arithmetic and type variants is raised while a
/// query is planned, before the first row is read.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// A symbol does not resolve against the row it is evaluated on
    #[error("Unknown field: {0}")]
    UnknownField(String),

    /// A symbol is carried by more than one bound table
    #[error("Ambiguous field: {0} is present in more than one table")]
    AmbiguousField(String),

    /// Two fields (or record keys) share a name
    #[error("Duplicate field: {0}")]
    DuplicateField(String),

    /// Two tables are bound under the same alias
    #[error("Duplicate alias: {0}")]
    DuplicateAlias(String),

    /// A single-occurrence clause was given twice
    #[error("Duplicate clause: {0}")]
    DuplicateClause(String),

    /// The request has no `from` clause
    #[error("Query has no source table")]
    MissingSource,

    /// Aggregate used outside the top level of a select field
    #[error("Invalid aggregate: {0}")]
    InvalidAggregate(String),

    /// A grouped, non-aggregating query was materialized as rows
    #[error("Query emits groups, not rows")]
    GroupedOutput,

    /// Table rows do not agree with the declared columns
    #[error("Schema error: {0}")]
    Schema(String),

    /// An emitted row does not have the inferred output shape
    #[error("Shape mismatch: expected {expected}, got {actual}")]
    ShapeMismatch {
        /// Inferred shape
        expected: String,
        /// Shape of the offending row
        actual: String,
    },

    /// Type mismatch errors
    #[error("Type mismatch: expected {expected}, got {actual}")]
    TypeMismatch {
        /// Expected type
        expected: String,
        /// Actual type
        actual: String,
    },

    /// Integer arithmetic overflowed
    #[error("Integer overflow")]
    Overflow,

    /// Integer division or modulo by zero
    #[error("Division by zero")]
    DivisionByZero,

    /// JSON (de)serialization errors
    #[error("JSON error: {0}")]
    Json(String),

    /// Query executor errors
    #[error("Executor error: {0}")]
    Executor(String),
}

impl Error {
    /// Create an unknown field error
    pub fn unknown_field(name: impl Into<String>) -> Self {
        Self::UnknownField(name.into())
    }

    /// Create a duplicate field error
    pub fn duplicate_field(name: impl Into<String>) -> Self {
        Self::DuplicateField(name.into())
    }

    /// Create a schema error
    pub fn schema(msg: impl Into<String>) -> Self {
        Self::Schema(msg.into())
    }

    /// Create an executor error
    pub fn executor(msg: impl Into<String>) -> Self {
        Self::Executor(msg.into())
    }

    /// Create a type mismatch error
    pub fn type_mismatch(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Self::TypeMismatch {
            expected: expected.into(),
            actual: actual.into(),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_mismatch_renders_both_sides() {
        let err = Error::type_mismatch("number", "string");
        assert_eq!(err.to_string(), "Type mismatch: expected number, got string");
    }

    #[test]
    fn json_errors_convert() {
        let err: Error = serde_json::from_str::<i64>("nope").unwrap_err().into();
        assert!(matches!(err, Error::Json(_)));
    }
}
