//! User entity definition.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A user record managed by the service.
///
/// The identifier is generated by whoever creates the record, never by
/// storage. The password is carried verbatim and is redacted from `Debug`
/// and `Display` output so it cannot end up in logs.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Unique identifier.
    pub id: Uuid,
    /// Email address, used as the secondary lookup key.
    pub email: String,
    /// Opaque password material, stored as given.
    pub password: String,
    /// Free-form role tag.
    pub role: String,
    /// Display name.
    pub nick: String,
}

impl User {
    /// Creates a new user with a freshly generated identifier.
    pub fn new(
        email: impl Into<String>,
        password: impl Into<String>,
        role: impl Into<String>,
        nick: impl Into<String>,
    ) -> Self {
        Self::with_id(Uuid::new_v4(), email, password, role, nick)
    }

    /// Creates a user with a caller-supplied identifier.
    pub fn with_id(
        id: Uuid,
        email: impl Into<String>,
        password: impl Into<String>,
        role: impl Into<String>,
        nick: impl Into<String>,
    ) -> Self {
        Self {
            id,
            email: email.into(),
            password: password.into(),
            role: role.into(),
            nick: nick.into(),
        }
    }
}

impl fmt::Debug for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("User")
            .field("id", &self.id)
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .field("role", &self.role)
            .field("nick", &self.nick)
            .finish()
    }
}

impl fmt::Display for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} <{}> nick={} role={}",
            self.id, self.email, self.nick, self.role
        )
    }
}
