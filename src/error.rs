//! Error types for the query engine
//!
//! Every failure that a caller can fix by changing its request is reported
//! through [`QueryError`] and classified by [`ErrorKind`]. Database failures
//! raised while executing a compiled query are passed through unchanged.

use thiserror::Error;

/// Broad classification of a [`QueryError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Operator/value arity or shape is wrong (caught at construction).
    MalformedCriteria,
    /// A logical field path does not resolve against the entity schema.
    PropertyNotFound,
    /// A value cannot be coerced to the column's semantic type.
    TypeConversion,
    /// Any other structurally invalid request.
    InvalidFilterCriteria,
    /// Entity or projection lookups that reference unregistered names.
    UnknownTarget,
    /// Schema declarations rejected at startup.
    Registration,
    /// Execution failure in the database adapter.
    Database,
}

/// The main error type for query construction, compilation and execution.
#[derive(Error, Debug)]
pub enum QueryError {
    // ========== Caller-fixable request errors ==========
    #[error("Malformed criteria: {0}")]
    MalformedCriteria(String),

    #[error("Property not found: '{path}' on entity '{entity}'")]
    PropertyNotFound { entity: String, path: String },

    #[error("Cannot convert {found} to {expected} for field '{field}'")]
    TypeConversion {
        field: String,
        expected: String,
        found: String,
    },

    #[error("Invalid filter criteria: {0}")]
    InvalidFilterCriteria(String),

    #[error("Invalid cursor: {0}")]
    InvalidCursor(&'static str),

    // ========== Registry errors ==========
    #[error("Unknown entity: {0}")]
    UnknownEntity(String),

    #[error("Unknown projection '{name}' for entity '{entity}'")]
    UnknownProjection { entity: String, name: String },

    #[error("Registration error: {0}")]
    Registration(String),

    // ========== Execution errors ==========
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl QueryError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            QueryError::MalformedCriteria(_) => ErrorKind::MalformedCriteria,
            QueryError::PropertyNotFound { .. } => ErrorKind::PropertyNotFound,
            QueryError::TypeConversion { .. } => ErrorKind::TypeConversion,
            QueryError::InvalidFilterCriteria(_) | QueryError::InvalidCursor(_) => {
                ErrorKind::InvalidFilterCriteria
            }
            QueryError::UnknownEntity(_) | QueryError::UnknownProjection { .. } => {
                ErrorKind::UnknownTarget
            }
            QueryError::Registration(_) => ErrorKind::Registration,
            QueryError::Database(_) => ErrorKind::Database,
        }
    }

    /// True for errors the caller caused and can fix (a web layer maps these to 4xx).
    pub fn is_client_error(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::MalformedCriteria
                | ErrorKind::PropertyNotFound
                | ErrorKind::TypeConversion
                | ErrorKind::InvalidFilterCriteria
                | ErrorKind::UnknownTarget
        )
    }

    pub(crate) fn property_not_found(entity: &str, path: &str) -> Self {
        QueryError::PropertyNotFound {
            entity: entity.to_string(),
            path: path.to_string(),
        }
    }

    pub(crate) fn type_conversion(
        field: &str,
        expected: impl std::fmt::Display,
        found: impl std::fmt::Display,
    ) -> Self {
        QueryError::TypeConversion {
            field: field.to_string(),
            expected: expected.to_string(),
            found: found.to_string(),
        }
    }
}

/// Result type alias for query engine operations
pub type Result<T, E = QueryError> = std::result::Result<T, E>;
