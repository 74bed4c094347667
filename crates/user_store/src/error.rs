//! User store error types.

use thiserror::Error;

/// Errors that can occur during user store operations.
#[derive(Debug, Error)]
pub enum UserStoreError {
    /// No record matches the lookup key.
    #[error("User not found: {key}")]
    NotFound { key: String },

    /// A record with the same key already exists.
    #[error("User already exists: {key}")]
    AlreadyExists { key: String },

    /// The backend could not be reached.
    #[error("Connection failure: {0}")]
    ConnectionFailure(String),

    /// The caller cancelled the operation.
    #[error("Operation cancelled")]
    Cancelled,

    /// The caller's deadline passed before the operation finished.
    #[error("Deadline exceeded")]
    DeadlineExceeded,

    /// The backend does not support the operation.
    #[error("Operation not supported by this backend: {0}")]
    Unimplemented(&'static str),

    /// The table name is not a plain SQL identifier.
    #[error("Invalid table name: {0}")]
    InvalidTableName(String),

    /// Any other backend failure.
    #[error("Unexpected storage error: {0}")]
    Unexpected(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl UserStoreError {
    /// Creates a not found error.
    pub fn not_found(key: impl Into<String>) -> Self {
        Self::NotFound { key: key.into() }
    }

    /// Creates an already exists error.
    pub fn already_exists(key: impl Into<String>) -> Self {
        Self::AlreadyExists { key: key.into() }
    }

    /// Wraps an arbitrary error as an unexpected failure.
    pub fn unexpected(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::Unexpected(err.into())
    }

    /// Returns true if the error means the record does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Classifies a sqlx error into the store taxonomy.
    ///
    /// `key` names the record the statement was about and is used for
    /// not-found and duplicate errors.
    pub fn from_sqlx(err: sqlx::Error, key: impl Into<String>) -> Self {
        match err {
            sqlx::Error::RowNotFound => Self::not_found(key),
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                Self::already_exists(key)
            }
            sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::Io(_)
            | sqlx::Error::Tls(_) => Self::ConnectionFailure(err.to_string()),
            other => Self::unexpected(other),
        }
    }
}

/// Result type for user store operations.
pub type UserStoreResult<T> = Result<T, UserStoreError>;
