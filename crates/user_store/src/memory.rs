//! In-memory user store implementation.

use std::collections::HashMap;

use async_trait::async_trait;
use entities::User;
use tokio::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use uuid::Uuid;

use crate::{CallContext, UserStore, UserStoreError, UserStoreResult};

/// In-memory user store.
///
/// Records live for as long as the store does. A single lock serializes
/// writers, so concurrent writes touching the same id never interleave.
/// Email addresses are kept unique, mirroring the relational schema.
#[derive(Debug, Default)]
pub struct MemoryUserStore {
    users: RwLock<HashMap<Uuid, User>>,
}

impl MemoryUserStore {
    /// Creates a new, empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    async fn read(
        &self,
        ctx: &CallContext,
    ) -> UserStoreResult<RwLockReadGuard<'_, HashMap<Uuid, User>>> {
        ctx.run(async { Ok(self.users.read().await) }).await
    }

    async fn write(
        &self,
        ctx: &CallContext,
    ) -> UserStoreResult<RwLockWriteGuard<'_, HashMap<Uuid, User>>> {
        ctx.run(async { Ok(self.users.write().await) }).await
    }
}

fn email_taken(users: &HashMap<Uuid, User>, email: &str, except: Option<Uuid>) -> bool {
    users
        .values()
        .any(|u| u.email == email && Some(u.id) != except)
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn get_users(&self, ctx: &CallContext) -> UserStoreResult<Vec<User>> {
        let users = self.read(ctx).await?;
        Ok(users.values().cloned().collect())
    }

    async fn get_user_by_id(&self, ctx: &CallContext, id: Uuid) -> UserStoreResult<User> {
        let users = self.read(ctx).await?;
        users
            .get(&id)
            .cloned()
            .ok_or_else(|| UserStoreError::not_found(id.to_string()))
    }

    async fn get_user_by_email(&self, ctx: &CallContext, email: &str) -> UserStoreResult<User> {
        let users = self.read(ctx).await?;
        users
            .values()
            .find(|u| u.email == email)
            .cloned()
            .ok_or_else(|| UserStoreError::not_found(email))
    }

    async fn insert(&self, ctx: &CallContext, user: User) -> UserStoreResult<()> {
        let mut users = self.write(ctx).await?;
        if users.contains_key(&user.id) {
            return Err(UserStoreError::already_exists(user.id.to_string()));
        }
        if email_taken(&users, &user.email, None) {
            return Err(UserStoreError::already_exists(user.email));
        }
        users.insert(user.id, user);
        Ok(())
    }

    async fn update(&self, ctx: &CallContext, id: Uuid, user: User) -> UserStoreResult<()> {
        let mut users = self.write(ctx).await?;
        if !users.contains_key(&id) {
            return Err(UserStoreError::not_found(id.to_string()));
        }
        if email_taken(&users, &user.email, Some(id)) {
            return Err(UserStoreError::already_exists(user.email));
        }
        users.insert(id, User { id, ..user });
        Ok(())
    }

    async fn delete(&self, ctx: &CallContext, id: Uuid) -> UserStoreResult<User> {
        let mut users = self.write(ctx).await?;
        users
            .remove(&id)
            .ok_or_else(|| UserStoreError::not_found(id.to_string()))
    }
}
