//! PostgreSQL user store.

use std::time::Duration;

use async_trait::async_trait;
use entities::User;
use sqlx::{postgres::PgPoolOptions, Pool, Postgres};
use uuid::Uuid;

use super::{
    create_table_sql, db_error, rows_into_users, validate_table_name, write_error, UserRow,
};
use crate::{CallContext, UserStore, UserStoreError, UserStoreResult};

/// PostgreSQL user store (for shared, durable deployments)
#[derive(Debug, Clone)]
pub struct PostgresUserStore {
    pool: Pool<Postgres>,
    table: String,
}

impl PostgresUserStore {
    /// Create a store over an existing pool
    pub fn new(pool: Pool<Postgres>, table: &str) -> UserStoreResult<Self> {
        Ok(Self {
            pool,
            table: validate_table_name(table)?,
        })
    }

    /// Connect to the database at `url`
    ///
    /// Fails with [`UserStoreError::ConnectionFailure`] when the server cannot
    /// be reached within `acquire_timeout`.
    pub async fn connect(
        url: &str,
        table: &str,
        max_connections: u32,
        acquire_timeout: Duration,
    ) -> UserStoreResult<Self> {
        let table = validate_table_name(table)?;
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
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
            .map_err(|e| db_error("postgres.init", &self.table, e))?;
        Ok(())
    }

    /// Close every pooled connection
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl UserStore for PostgresUserStore {
    async fn get_users(&self, ctx: &CallContext) -> UserStoreResult<Vec<User>> {
        const OP: &str = "postgres.get_users";
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
        const OP: &str = "postgres.get_user_by_id";
        let key = id.to_string();
        let sql = format!(
            "SELECT id, email, password, role, nick FROM {} WHERE id = $1",
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
        const OP: &str = "postgres.get_user_by_email";
        let sql = format!(
            "SELECT id, email, password, role, nick FROM {} WHERE email = $1",
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
        const OP: &str = "postgres.insert";
        let key = user.id.to_string();
        let sql = format!(
            "INSERT INTO {} (id, email, password, role, nick) VALUES ($1, $2, $3, $4, $5)",
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
        const OP: &str = "postgres.update";
        let key = id.to_string();
        let sql = format!(
            "UPDATE {} SET email = $1, password = $2, role = $3, nick = $4 WHERE id = $5",
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
        const OP: &str = "postgres.delete";
        let key = id.to_string();

        // Read and delete are separate statements; a concurrent delete of the
        // same id can make the second one affect no rows.
        let user = self.get_user_by_id(ctx, id).await?;

        let sql = format!("DELETE FROM {} WHERE id = $1", self.table);
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
