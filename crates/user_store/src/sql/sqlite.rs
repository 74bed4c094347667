//! SQLite user store.

use std::time::Duration;

use async_trait::async_trait;
use entities::User;
use sqlx::{sqlite::SqlitePoolOptions, Pool, Sqlite};
use uuid::Uuid;

use super::{
    create_table_sql, db_error, rows_into_users, validate_table_name, write_error, UserRow,
};
use crate::{CallContext, UserStore, UserStoreError, UserStoreResult};

/// SQLite user store (for single-process deployments)
#[derive(Debug, Clone)]
pub struct SqliteUserStore {
    pool: Pool<Sqlite>,
    table: String,
}

impl SqliteUserStore {
    /// Create a store over an existing pool
    pub fn new(pool: Pool<Sqlite>, table: &str) -> UserStoreResult<Self> {
        Ok(Self {
            pool,
            table: validate_table_name(table)?,
        })
    }

    /// Open the database at `url` (e.g. `sqlite:users.db?mode=rwc`)
    ///
    /// An in-memory database (`sqlite::memory:`) is private to a single
    /// connection, so it is opened with exactly one connection that is never
    /// recycled.
    pub async fn connect(
        url: &str,
        table: &str,
        max_connections: u32,
        acquire_timeout: Duration,
    ) -> UserStoreResult<Self> {
        let table = validate_table_name(table)?;
        let options = if url.contains(":memory:") {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None::<Duration>)
                .max_lifetime(None::<Duration>)
        } else {
            SqlitePoolOptions::new().max_connections(max_connections)
        };

        let pool = options
            .acquire_timeout(acquire_timeout)
            .connect(url)
            .await
            .map_err(|e| UserStoreError::ConnectionFailure(e.to_string()))?;

        Ok(Self { pool, table })
    }

    /// Create the users table if it does not exist yet
    pub async fn init(&self) -> UserStoreResult<()> {
        sqlx::query(&create_table_sql(&self.table))
            .execute(&self.pool)
            .await
            .map_err(|e| db_error("sqlite.init", &self.table, e))?;
        Ok(())
    }

    /// Close every pooled connection
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl UserStore for SqliteUserStore {
    async fn get_users(&self, ctx: &CallContext) -> UserStoreResult<Vec<User>> {
        const OP: &str = "sqlite.get_users";
        let sql = format!("SELECT id, email, password, role, nick FROM {}", self.table);

        let rows: Vec<UserRow> = ctx
            .run(async {
                sqlx::query_as(&sql)
                    .fetch_all(&self.pool)
                    .await
                    .map_err(|e| db_error(OP, &self.table, e))
            })
            .await?;

        Ok(rows_into_users(OP, rows))
    }

    async fn get_user_by_id(&self, ctx: &CallContext, id: Uuid) -> UserStoreResult<User> {
        const OP: &str = "sqlite.get_user_by_id";
        let key = id.to_string();
        let sql = format!(
            "SELECT id, email, password, role, nick FROM {} WHERE id = ?",
            self.table
        );

        let row: UserRow = ctx
            .run(async {
                sqlx::query_as(&sql)
                    .bind(&key)
                    .fetch_one(&self.pool)
                    .await
                    .map_err(|e| db_error(OP, &key, e))
            })
            .await?;

        row.into_user()
    }

    async fn get_user_by_email(&self, ctx: &CallContext, email: &str) -> UserStoreResult<User> {
        const OP: &str = "sqlite.get_user_by_email";
        let sql = format!(
            "SELECT id, email, password, role, nick FROM {} WHERE email = ?",
            self.table
        );

        let row: UserRow = ctx
            .run(async {
                sqlx::query_as(&sql)
                    .bind(email)
                    .fetch_one(&self.pool)
                    .await
                    .map_err(|e| db_error(OP, email, e))
            })
            .await?;

        row.into_user()
    }

    async fn insert(&self, ctx: &CallContext, user: User) -> UserStoreResult<()> {
        const OP: &str = "sqlite.insert";
        let key = user.id.to_string();
        let sql = format!(
            "INSERT INTO {} (id, email, password, role, nick) VALUES (?, ?, ?, ?, ?)",
            self.table
        );

        let result = ctx
            .run(async {
                sqlx::query(&sql)
                    .bind(&key)
                    .bind(&user.email)
                    .bind(&user.password)
                    .bind(&user.role)
                    .bind(&user.nick)
                    .execute(&self.pool)
                    .await
                    .map_err(|e| write_error(OP, &key, &user.email, e))
            })
            .await?;

        if result.rows_affected() == 0 {
            return Err(UserStoreError::unexpected(format!(
                "insert of user {key} affected no rows"
            )));
        }
        Ok(())
    }

    async fn update(&self, ctx: &CallContext, id: Uuid, user: User) -> UserStoreResult<()> {
        const OP: &str = "sqlite.update";
        let key = id.to_string();
        let sql = format!(
            "UPDATE {} SET email = ?, password = ?, role = ?, nick = ? WHERE id = ?",
            self.table
        );

        let result = ctx
            .run(async {
                sqlx::query(&sql)
                    .bind(&user.email)
                    .bind(&user.password)
                    .bind(&user.role)
                    .bind(&user.nick)
                    .bind(&key)
                    .execute(&self.pool)
                    .await
                    .map_err(|e| write_error(OP, &key, &user.email, e))
            })
            .await?;

        if result.rows_affected() == 0 {
            return Err(UserStoreError::not_found(key));
        }
        Ok(())
    }

    async fn delete(&self, ctx: &CallContext, id: Uuid) -> UserStoreResult<User> {
        const OP: &str = "sqlite.delete";
        let key = id.to_string();

        // The read and the delete are separate statements; see the module docs.
        let user = self.get_user_by_id(ctx, id).await?;

        let sql = format!("DELETE FROM {} WHERE id = ?", self.table);
        let result = ctx
            .run(async {
                sqlx::query(&sql)
                    .bind(&key)
                    .execute(&self.pool)
                    .await
                    .map_err(|e| db_error(OP, &key, e))
            })
            .await?;

        if result.rows_affected() == 0 {
            return Err(UserStoreError::not_found(key));
        }
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use tokio_test::assert_ok;

    use super::*;

    async fn memory_store() -> SqliteUserStore {
        let store = SqliteUserStore::connect("sqlite::memory:", "users", 4, Duration::from_secs(5))
            .await
            .unwrap();
        store.init().await.unwrap();
        store
    }

    #[tokio::test]
    async fn test_sqlite_user_crud() {
        let store = memory_store().await;
        let ctx = CallContext::new();
        let user = User::new("a@x.com", "p", "user", "A");

        assert_ok!(store.insert(&ctx, user.clone()).await);
        assert_eq!(store.get_user_by_id(&ctx, user.id).await.unwrap(), user);
        assert_eq!(
            store.get_user_by_email(&ctx, "a@x.com").await.unwrap(),
            user
        );

        let replacement = User::with_id(user.id, "b@x.com", "q", "admin", "B");
        assert_ok!(store.update(&ctx, user.id, replacement.clone()).await);
        assert_eq!(
            store.get_user_by_id(&ctx, user.id).await.unwrap(),
            replacement
        );

        let deleted = store.delete(&ctx, user.id).await.unwrap();
        assert_eq!(deleted, replacement);
        assert!(store
            .get_user_by_id(&ctx, user.id)
            .await
            .unwrap_err()
            .is_not_found());
        assert!(store.get_users(&ctx).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_sqlite_duplicates_are_already_exists() {
        let store = memory_store().await;
        let ctx = CallContext::new();
        let user = User::new("a@x.com", "p", "user", "A");
        store.insert(&ctx, user.clone()).await.unwrap();

        let same_id = User::with_id(user.id, "other@x.com", "z", "admin", "Z");
        let err = store.insert(&ctx, same_id).await.unwrap_err();
        assert_eq!(err.to_string(), format!("User already exists: {}", user.id));

        let same_email = User::new("a@x.com", "z", "admin", "Z");
        let err = store.insert(&ctx, same_email).await.unwrap_err();
        assert_eq!(err.to_string(), "User already exists: a@x.com");

        let other = User::new("c@x.com", "p", "user", "C");
        store.insert(&ctx, other.clone()).await.unwrap();
        let clash = User::with_id(other.id, "a@x.com", "p", "user", "C");
        let err = store.update(&ctx, other.id, clash).await.unwrap_err();
        assert_eq!(err.to_string(), "User already exists: a@x.com");

        assert_eq!(store.get_user_by_id(&ctx, user.id).await.unwrap(), user);
    }

    #[tokio::test]
    async fn test_sqlite_missing_rows_are_not_found() {
        let store = memory_store().await;
        let ctx = CallContext::new();
        let id = Uuid::new_v4();

        assert!(store.get_user_by_id(&ctx, id).await.unwrap_err().is_not_found());
        assert!(store
            .get_user_by_email(&ctx, "nobody@x.com")
            .await
            .unwrap_err()
            .is_not_found());
        let body = User::with_id(id, "a@x.com", "p", "user", "A");
        assert!(store.update(&ctx, id, body).await.unwrap_err().is_not_found());
        assert!(store.delete(&ctx, id).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_sqlite_skips_corrupt_rows_when_listing() {
        let store = memory_store().await;
        let ctx = CallContext::new();
        store
            .insert(&ctx, User::new("a@x.com", "p", "user", "A"))
            .await
            .unwrap();
        sqlx::query("INSERT INTO users (id, email, password, role, nick) VALUES (?, ?, ?, ?, ?)")
            .bind("not-a-uuid")
            .bind("broken@x.com")
            .bind("p")
            .bind("user")
            .bind("X")
            .execute(&store.pool)
            .await
            .unwrap();

        let users = store.get_users(&ctx).await.unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].email, "a@x.com");

        let err = store
            .get_user_by_email(&ctx, "broken@x.com")
            .await
            .unwrap_err();
        assert!(matches!(err, UserStoreError::Unexpected(_)));
    }

    #[tokio::test]
    async fn test_sqlite_cancelled_context() {
        let store = memory_store().await;
        let ctx = CallContext::new();
        ctx.cancel();

        let err = store.get_users(&ctx).await.unwrap_err();
        assert!(matches!(err, UserStoreError::Cancelled));
    }
}
