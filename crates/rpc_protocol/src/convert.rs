//! Conversions between [`WireUser`] and [`User`].

use entities::User;
use thiserror::Error;
use uuid::Uuid;

use crate::WireUser;

/// Failure converting between the wire and domain user forms.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConversionError {
    #[error("missing required field `{0}`")]
    MissingField(&'static str),

    #[error("invalid user id {id:?}: {reason}")]
    InvalidId { id: String, reason: String },

    #[error("user id must not be nil")]
    NilId,
}

/// Parses a UUID identifier received on the wire.
///
/// Empty, malformed and nil identifiers are all rejected.
pub fn parse_user_id(raw: &str) -> Result<Uuid, ConversionError> {
    if raw.is_empty() {
        return Err(ConversionError::MissingField("id"));
    }
    let id = Uuid::parse_str(raw).map_err(|e| ConversionError::InvalidId {
        id: raw.to_string(),
        reason: e.to_string(),
    })?;
    if id.is_nil() {
        return Err(ConversionError::NilId);
    }
    Ok(id)
}

impl TryFrom<WireUser> for User {
    type Error = ConversionError;

    fn try_from(wire: WireUser) -> Result<Self, Self::Error> {
        let id = parse_user_id(&wire.id)?;
        if wire.email.is_empty() {
            return Err(ConversionError::MissingField("email"));
        }
        Ok(User::with_id(id, wire.email, wire.password, wire.role, wire.nick))
    }
}

impl TryFrom<&User> for WireUser {
    type Error = ConversionError;

    fn try_from(user: &User) -> Result<Self, Self::Error> {
        if user.id.is_nil() {
            return Err(ConversionError::NilId);
        }
        if user.email.is_empty() {
            return Err(ConversionError::MissingField("email"));
        }
        Ok(WireUser {
            id: user.id.to_string(),
            email: user.email.clone(),
            password: user.password.clone(),
            role: user.role.clone(),
            nick: user.nick.clone(),
        })
    }
}
