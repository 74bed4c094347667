//! Relational user stores.
//!
//! Both backends share the row shape and the table layout:
//!
//! ```sql
//! CREATE TABLE users (
//!     id TEXT PRIMARY KEY,
//!     email TEXT NOT NULL UNIQUE,
//!     password TEXT NOT NULL,
//!     role TEXT NOT NULL,
//!     nick TEXT NOT NULL
//! )
//! ```
//!
//! Each call issues independent statements; nothing spans a transaction.

mod postgres;
mod sqlite;

pub use postgres::*;
pub use sqlite::*;

use entities::User;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{UserStoreError, UserStoreResult};

/// Default table name.
pub const DEFAULT_TABLE_NAME: &str = "users";

/// A row of the users table.
#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: String,
    email: String,
    password: String,
    role: String,
    nick: String,
}

impl UserRow {
    fn into_user(self) -> UserStoreResult<User> {
        let id = Uuid::parse_str(&self.id).map_err(UserStoreError::unexpected)?;
        if id.is_nil() {
            return Err(UserStoreError::unexpected(format!(
                "stored user has a nil id (email {})",
                self.email
            )));
        }
        Ok(User::with_id(id, self.email, self.password, self.role, self.nick))
    }
}

/// Converts fetched rows, skipping rows that do not hold a valid user.
fn rows_into_users(op: &'static str, rows: Vec<UserRow>) -> Vec<User> {
    rows.into_iter()
        .filter_map(|row| {
            let raw_id = row.id.clone();
            match row.into_user() {
                Ok(user) => Some(user),
                Err(e) => {
                    warn!(op, raw_id = %raw_id, error = %e, "Skipping unreadable user row");
                    None
                }
            }
        })
        .collect()
}

/// Checks that `name` is a plain identifier so it can be spliced into SQL.
pub fn validate_table_name(name: &str) -> UserStoreResult<String> {
    let mut chars = name.chars();
    let valid_start = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    let valid_rest = chars.all(|c| c.is_ascii_alphanumeric() || c == '_');

    if valid_start && valid_rest && name.len() <= 63 {
        Ok(name.to_string())
    } else {
        Err(UserStoreError::InvalidTableName(name.to_string()))
    }
}

/// Classifies and logs a failed statement.
fn db_error(op: &'static str, key: &str, err: sqlx::Error) -> UserStoreError {
    let err = UserStoreError::from_sqlx(err, key);
    if err.is_not_found() {
        debug!(op, key, "No matching user row");
    } else {
        warn!(op, key, error = %err, "User statement failed");
    }
    err
}

/// Classifies a failed insert or update, naming the email when it is the
/// column that clashed.
fn write_error(op: &'static str, id: &str, email: &str, err: sqlx::Error) -> UserStoreError {
    let key = if is_email_clash(&err) { email } else { id };
    db_error(op, key, err)
}

fn is_email_clash(err: &sqlx::Error) -> bool {
    let sqlx::Error::Database(db) = err else {
        return false;
    };
    // Postgres names the constraint `<table>_email_key`; SQLite only reports
    // `UNIQUE constraint failed: <table>.email` in the message.
    db.is_unique_violation()
        && (db.constraint().is_some_and(|c| c.ends_with("_email_key"))
            || db.message().ends_with(".email"))
}

fn create_table_sql(table: &str) -> String {
    format!(
        r#"
        CREATE TABLE IF NOT EXISTS {table} (
            id TEXT PRIMARY KEY,
            email TEXT NOT NULL UNIQUE,
            password TEXT NOT NULL,
            role TEXT NOT NULL,
            nick TEXT NOT NULL
        )
        "#
    )
}
