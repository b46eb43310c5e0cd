//! Error types for SQLite operations.
//!
//! Provides a unified error type covering engine failures, value rendering,
//! configuration, and the schema walking and copying operations.

use dba_core::CoreError;
use thiserror::Error;

/// Errors that can occur while working with a [`Dba`](crate::Dba).
#[derive(Debug, Error)]
pub enum DbaError {
    /// SQLite engine failure, passed through unchanged.
    #[error("database error: {0}")]
    DatabaseError(#[from] rusqlite::Error),

    /// Literal rendering, interpolation, empty result or key codec failure.
    #[error("value error: {0}")]
    ValueError(#[from] CoreError),

    /// File I/O failure.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// YAML configuration parsing or serialization failure.
    #[error("config error: {0}")]
    ConfigError(#[from] serde_yaml::Error),

    /// Schema argument does not name an attached schema.
    #[error("invalid schema '{0}'")]
    InvalidSchema(String),

    /// Schema named in a copy does not exist on this connection.
    #[error("unknown schema '{0}'")]
    UnknownSchema(String),

    /// Object ordering is neither `natural` nor `drop`.
    #[error("invalid ordering '{0}': expected 'natural' or 'drop'")]
    InvalidOrdering(String),

    /// Path argument is empty or not valid UTF-8.
    #[error("invalid path '{0}'")]
    InvalidPath(String),

    /// Catalog object of a type that cannot be copied.
    #[error("unsupported type '{kind}' for DB object '{name}'")]
    UnsupportedObjectType {
        /// Object type as reported by the catalog.
        kind: String,
        /// Object name.
        name: String,
    },

    /// The `CREATE` clause of an object's SQL could not be retargeted.
    #[error("unexpected SQL string '{0}'")]
    RewriteFailed(String),

    /// The foreign key check after a copy reported violations.
    #[error("foreign key check failed for schema '{schema}': {count} violation(s) in {tables:?}")]
    ForeignKeyViolation {
        /// Schema that was checked.
        schema: String,
        /// Number of violating rows.
        count: usize,
        /// Distinct tables holding violating rows.
        tables: Vec<String>,
    },

    /// A lazy cursor over the same SQL text is still open.
    #[error("statement is busy with an open cursor: {0}")]
    StatementBusy(String),

    /// Named parameter not present in the statement.
    #[error("unknown parameter '{0}'")]
    UnknownParameter(String),

    /// Engine value could not be mapped to the expected shape.
    #[error("conversion error: {0}")]
    ConversionError(String),
}

/// Convenience alias for results with [`DbaError`].
pub type Result<T> = std::result::Result<T, DbaError>;
