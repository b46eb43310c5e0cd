//! Error types for value rendering, row adapters and key encoding.

use thiserror::Error;

/// Errors raised by the engine-independent parts of the toolkit.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A value has no SQL literal form (e.g. [`Value::Undefined`](crate::Value::Undefined)).
    #[error("unable to express {kind} as SQL literal, got {repr}")]
    UnrepresentableValue {
        /// Kind name of the offending value.
        kind: &'static str,
        /// Debug representation of the offending value.
        repr: String,
    },

    /// Rendering a placeholder during interpolation failed.
    #[error(
        "when trying to express placeholder '{placeholder}' as SQL literal, an error occurred: {message}"
    )]
    InterpolationError {
        /// Name of the placeholder, without `$` or braces.
        placeholder: String,
        /// Message of the inner rendering failure.
        message: String,
    },

    /// A single-row or single-value adapter found no rows.
    #[error("expected at least one row, got none")]
    EmptyResult,

    /// Sort-key encoding or decoding failure.
    #[error("hollerith codec error: {0}")]
    HollerithError(String),

    /// JSON serialization failure while rendering a list.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// Convenience alias for results with [`CoreError`].
pub type Result<T> = std::result::Result<T, CoreError>;
