//! RPC method definitions and request/response types

use serde::{Deserialize, Serialize};

use crate::WireUser;

/// All RPC method names
pub mod method_names {
    pub const GET_USERS: &str = "getUsers";
    pub const GET_USER_BY_ID: &str = "getUserById";
    pub const GET_USER_BY_EMAIL: &str = "getUserByEmail";
    pub const INSERT: &str = "insert";
    pub const UPDATE: &str = "update";
    pub const DELETE: &str = "delete";
}

// ========== Read Requests/Responses ==========

/// Request to list every user
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GetUsersRequest {}

/// Response for get users
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GetUsersResponse {
    #[serde(default)]
    pub users: Vec<WireUser>,
}

/// Request to get a user by ID
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GetUserByIdRequest {
    /// User ID (UUID string)
    #[serde(default)]
    pub id: String,
}

/// Request to get a user by email
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GetUserByEmailRequest {
    #[serde(default)]
    pub email: String,
}

/// Response carrying a single user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserResponse {
    pub user: WireUser,
}

// ========== Write Requests/Responses ==========

/// Request to insert a new user
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InsertRequest {
    /// The user to insert; required
    #[serde(default)]
    pub user: Option<WireUser>,
}

/// Request to replace the user stored under `id`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateRequest {
    /// Target user ID (UUID string)
    #[serde(default)]
    pub id: String,
    /// Replacement record; required. Its `id` must match the target.
    #[serde(default)]
    pub user: Option<WireUser>,
}

/// Request to delete a user
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeleteRequest {
    #[serde(default)]
    pub id: String,
}

/// Response for a write that returns nothing
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EmptyResponse {}

/// Response for delete, carrying the removed record
pub type DeleteResponse = UserResponse;
