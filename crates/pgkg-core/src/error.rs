use std::fmt;

use thiserror::Error;

/// A record or triple failed its shape rules. Recoverable: the caller may
/// retry with corrected input.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid {field}: {reason}")]
pub struct ValidationError {
    /// The first violated field (`type`, `title`, `time`, `id`, `relation`, ...).
    pub field: &'static str,
    pub reason: String,
}

impl ValidationError {
    pub fn new(field: &'static str, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }
}

/// Lifecycle state of a database handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Uninitialized,
    Open,
    Closed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uninitialized => f.write_str("uninitialized"),
            Self::Open => f.write_str("open"),
            Self::Closed => f.write_str("closed"),
        }
    }
}

/// Top-level error type for the pgkg data-access layer.
#[derive(Error, Debug)]
pub enum KgError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Schema error while running `{statement}`: {cause}")]
    Schema { statement: String, cause: String },

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Referential error: {field} vertex {id} does not exist")]
    Referential { field: &'static str, id: String },

    #[error("Persistence error in {operation}: {cause}")]
    Persistence { operation: String, cause: String },

    #[error("Lifecycle error: cannot {operation} while handler is {state}")]
    Lifecycle {
        operation: &'static str,
        state: SessionState,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Coarse error category, stable enough for a UI to switch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Config,
    Connection,
    Schema,
    Validation,
    Referential,
    Persistence,
    Lifecycle,
    Serialization,
}

impl KgError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Config(_) => ErrorKind::Config,
            Self::Connection(_) => ErrorKind::Connection,
            Self::Schema { .. } => ErrorKind::Schema,
            Self::Validation(_) => ErrorKind::Validation,
            Self::Referential { .. } => ErrorKind::Referential,
            Self::Persistence { .. } => ErrorKind::Persistence,
            Self::Lifecycle { .. } => ErrorKind::Lifecycle,
            Self::Serialization(_) => ErrorKind::Serialization,
        }
    }

    /// The offending field for validation and referential failures.
    pub fn field(&self) -> Option<&'static str> {
        match self {
            Self::Validation(v) => Some(v.field),
            Self::Referential { field, .. } => Some(field),
            _ => None,
        }
    }

    pub fn persistence(operation: &str, cause: impl fmt::Display) -> Self {
        Self::Persistence {
            operation: operation.to_string(),
            cause: cause.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, KgError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_error_names_field() {
        let err: KgError = ValidationError::new("type", "must not be empty").into();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(err.field(), Some("type"));
        assert_eq!(
            err.to_string(),
            "Validation error: invalid type: must not be empty"
        );
    }

    #[test]
    fn lifecycle_error_mentions_state() {
        let err = KgError::Lifecycle {
            operation: "insert_vertex",
            state: SessionState::Closed,
        };
        assert_eq!(err.kind(), ErrorKind::Lifecycle);
        assert!(err.to_string().contains("insert_vertex"));
        assert!(err.to_string().contains("closed"));
    }

    #[test]
    fn referential_error_exposes_field() {
        let err = KgError::Referential {
            field: "object",
            id: "r2".to_string(),
        };
        assert_eq!(err.field(), Some("object"));
        assert_eq!(
            err.to_string(),
            "Referential error: object vertex r2 does not exist"
        );
    }
}
