//! Error types for pgsq

use std::any::Any;
use std::panic::Location;
use thiserror::Error;

/// Result type alias for pgsq operations
pub type SqResult<T> = Result<T, SqError>;

/// Error types for rendering and row binding.
///
/// Rendering failures (`Composition`, `RowArity`, `UnknownParam`, `Panicked`)
/// are returned from `to_sql`. Binding failures (`Binding`, `Scan`) are
/// programming errors and end the current row iteration.
#[derive(Debug, Error)]
pub enum SqError {
    /// Invalid construction signalled while composing a query
    #[error("Composition error: {0}")]
    Composition(String),

    /// A row of values whose width differs from the first row
    #[error("Row arity mismatch in row {row}: expected {expected} values, got {got}")]
    RowArity {
        row: usize,
        expected: usize,
        got: usize,
    },

    /// A named parameter referenced before it was bound
    #[error("Unknown named parameter: {0}")]
    UnknownParam(String),

    /// A panic caught while composing a query
    #[error("Panic during composition: {0}")]
    Panicked(String),

    /// Accessor sequence mismatch between the discovery and extraction passes
    #[error("Row binding failed on {location}: {message}")]
    Binding { location: String, message: String },

    /// Driver scan failure
    #[error("Row scan failed on {location}: {message}")]
    Scan { location: String, message: String },

    /// Raw value that does not fit the requested destination
    #[error("Decode error on column '{column}': {message}")]
    Decode { column: String, message: String },

    /// Query execution error
    #[error("Query error: {0}")]
    Query(#[from] tokio_postgres::Error),

    /// Other errors
    #[error("{0}")]
    Other(String),
}

impl SqError {
    /// Create a composition error
    pub fn composition(message: impl Into<String>) -> Self {
        Self::Composition(message.into())
    }

    /// Create a binding error attributed to a caller location
    pub fn binding(location: &Location<'_>, message: impl Into<String>) -> Self {
        Self::Binding {
            location: format!("{}:{}", location.file(), location.line()),
            message: message.into(),
        }
    }

    /// Create a scan error attributed to a caller location
    pub fn scan(location: &Location<'_>, message: impl Into<String>) -> Self {
        Self::Scan {
            location: format!("{}:{}", location.file(), location.line()),
            message: message.into(),
        }
    }

    /// Create a decode error for a specific column
    pub fn decode(column: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            column: column.into(),
            message: message.into(),
        }
    }

    /// Attach a column index to a decode error that was raised without one.
    pub(crate) fn at_column(self, idx: usize) -> Self {
        match self {
            Self::Decode { column, message } if column.is_empty() => Self::Decode {
                column: idx.to_string(),
                message,
            },
            other => other,
        }
    }

    /// Build an error from a caught panic payload.
    pub(crate) fn from_panic(payload: &(dyn Any + Send)) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_string()
        };
        Self::Panicked(message)
    }

    /// Whether this error ends a row iteration (binding-time failure).
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Binding { .. } | Self::Scan { .. })
    }

    /// Check if this error was raised while composing SQL
    pub fn is_composition(&self) -> bool {
        matches!(
            self,
            Self::Composition(_) | Self::RowArity { .. } | Self::UnknownParam(_) | Self::Panicked(_)
        )
    }

    /// Convert a tokio_postgres error
    pub fn from_db_error(err: tokio_postgres::Error) -> Self {
        Self::Query(err)
    }
}
