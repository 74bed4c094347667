//! User store trait

use async_trait::async_trait;
use entities::User;
use uuid::Uuid;

use crate::{CallContext, UserStoreError, UserStoreResult};

/// Trait for user storage operations.
///
/// Every method has a default body returning
/// [`UserStoreError::Unimplemented`], so a partial backend reports "not
/// supported" instead of aborting. The shipped backends override all six.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Returns every stored user, in backend-defined order.
    async fn get_users(&self, ctx: &CallContext) -> UserStoreResult<Vec<User>> {
        let _ = ctx;
        Err(UserStoreError::Unimplemented("get_users"))
    }

    /// Gets a user by ID.
    async fn get_user_by_id(&self, ctx: &CallContext, id: Uuid) -> UserStoreResult<User> {
        let _ = (ctx, id);
        Err(UserStoreError::Unimplemented("get_user_by_id"))
    }

    /// Gets a user by email.
    async fn get_user_by_email(&self, ctx: &CallContext, email: &str) -> UserStoreResult<User> {
        let _ = (ctx, email);
        Err(UserStoreError::Unimplemented("get_user_by_email"))
    }

    /// Persists a new user.
    async fn insert(&self, ctx: &CallContext, user: User) -> UserStoreResult<()> {
        let _ = (ctx, user);
        Err(UserStoreError::Unimplemented("insert"))
    }

    /// Replaces every field of the user stored under `id`.
    ///
    /// The stored record keeps `id` as its identifier.
    async fn update(&self, ctx: &CallContext, id: Uuid, user: User) -> UserStoreResult<()> {
        let _ = (ctx, id, user);
        Err(UserStoreError::Unimplemented("update"))
    }

    /// Removes a user and returns the record as it was before deletion.
    async fn delete(&self, ctx: &CallContext, id: Uuid) -> UserStoreResult<User> {
        let _ = (ctx, id);
        Err(UserStoreError::Unimplemented("delete"))
    }
}
