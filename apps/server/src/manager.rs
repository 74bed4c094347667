//! Users manager
//!
//! The single path between the RPC layer and storage. It delegates every
//! call unchanged, logs failures with the operation and the record key, and
//! narrows storage errors into an [`ErrorKind`] the RPC layer can map to a
//! wire status.

use std::sync::Arc;

use entities::User;
use thiserror::Error;
use tracing::{debug, warn};
use user_store::{CallContext, UserStore, UserStoreError};
use uuid::Uuid;

/// Caller-facing error category
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    AlreadyExists,
    /// The caller cancelled or the deadline passed
    Cancelled,
    /// The backend could not be reached
    Unavailable,
    /// The backend does not support the operation
    Unimplemented,
    Internal,
}

impl ErrorKind {
    /// Stable lowercase name, also sent to clients for internal-class errors
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::AlreadyExists => "already_exists",
            Self::Cancelled => "cancelled",
            Self::Unavailable => "unavailable",
            Self::Unimplemented => "unimplemented",
            Self::Internal => "internal",
        }
    }
}

impl From<&UserStoreError> for ErrorKind {
    fn from(err: &UserStoreError) -> Self {
        match err {
            UserStoreError::NotFound { .. } => Self::NotFound,
            UserStoreError::AlreadyExists { .. } => Self::AlreadyExists,
            UserStoreError::Cancelled | UserStoreError::DeadlineExceeded => Self::Cancelled,
            UserStoreError::ConnectionFailure(_) => Self::Unavailable,
            UserStoreError::Unimplemented(_) => Self::Unimplemented,
            UserStoreError::InvalidTableName(_) | UserStoreError::Unexpected(_) => Self::Internal,
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failed manager operation, keeping the storage error as its source
#[derive(Debug, Error)]
#[error("{op} failed ({kind}): {source}")]
pub struct ManagerError {
    pub op: &'static str,
    pub kind: ErrorKind,
    #[source]
    pub source: UserStoreError,
}

impl ManagerError {
    pub fn is_not_found(&self) -> bool {
        self.kind == ErrorKind::NotFound
    }
}

pub type ManagerResult<T> = Result<T, ManagerError>;

/// Log a storage failure and wrap it.
fn fail(op: &'static str, key: &str, source: UserStoreError) -> ManagerError {
    let kind = ErrorKind::from(&source);
    match kind {
        ErrorKind::NotFound | ErrorKind::AlreadyExists | ErrorKind::Cancelled => {
            debug!(op, key, kind = %kind, error = %source, "User operation failed");
        }
        _ => {
            warn!(op, key, kind = %kind, error = %source, "User operation failed");
        }
    }
    ManagerError { op, kind, source }
}

/// Users manager over a shared storage backend
#[derive(Clone)]
pub struct UsersManager {
    store: Arc<dyn UserStore>,
}

impl UsersManager {
    pub fn new(store: Arc<dyn UserStore>) -> Self {
        Self { store }
    }

    pub async fn get_users(&self, ctx: &CallContext) -> ManagerResult<Vec<User>> {
        self.store
            .get_users(ctx)
            .await
            .map_err(|e| fail("get_users", "*", e))
    }

    pub async fn get_user_by_id(&self, ctx: &CallContext, id: Uuid) -> ManagerResult<User> {
        self.store
            .get_user_by_id(ctx, id)
            .await
            .map_err(|e| fail("get_user_by_id", &id.to_string(), e))
    }

    pub async fn get_user_by_email(&self, ctx: &CallContext, email: &str) -> ManagerResult<User> {
        self.store
            .get_user_by_email(ctx, email)
            .await
            .map_err(|e| fail("get_user_by_email", email, e))
    }

    pub async fn insert(&self, ctx: &CallContext, user: User) -> ManagerResult<()> {
        let key = user.id.to_string();
        self.store
            .insert(ctx, user)
            .await
            .map_err(|e| fail("insert", &key, e))
    }

    pub async fn update(&self, ctx: &CallContext, id: Uuid, user: User) -> ManagerResult<()> {
        self.store
            .update(ctx, id, user)
            .await
            .map_err(|e| fail("update", &id.to_string(), e))
    }

    pub async fn delete(&self, ctx: &CallContext, id: Uuid) -> ManagerResult<User> {
        self.store
            .delete(ctx, id)
            .await
            .map_err(|e| fail("delete", &id.to_string(), e))
    }
}
