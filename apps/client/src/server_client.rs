//! Client for the user-management server

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use entities::User;
use rpc_protocol::{
    method_names, ConversionError, DeleteRequest, EmptyResponse, ErrorCode,
    GetUserByEmailRequest, GetUserByIdRequest, GetUsersRequest, GetUsersResponse, InsertRequest,
    JsonRpcError, JsonRpcRequest, JsonRpcResponse, UpdateRequest, UserResponse, WireUser,
};
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

/// Client for the user-management server
///
/// Each call opens its own HTTP connection and is bounded by the configured
/// timeout. Failed calls are reported once; nothing is retried.
pub struct UsersClient {
    /// Server URL
    server_url: String,
    /// Per-call deadline
    timeout: Duration,
    /// Request counter for JSON-RPC IDs
    request_id: AtomicU64,
}

impl UsersClient {
    /// Create a new client
    pub fn new(server_url: &str, timeout: Duration) -> Self {
        Self {
            server_url: server_url.trim_end_matches('/').to_string(),
            timeout,
            request_id: AtomicU64::new(1),
        }
    }

    /// Generate the next request ID
    fn next_id(&self) -> u64 {
        self.request_id.fetch_add(1, Ordering::SeqCst)
    }

    /// Build a connection for a single call
    fn http_client(&self) -> Result<reqwest::Client, ClientError> {
        reqwest::Client::builder()
            .timeout(self.timeout)
            .pool_max_idle_per_host(0)
            .build()
            .map_err(|e| ClientError::Network(e.to_string()))
    }

    /// Make an RPC call to the server
    async fn call<P, T>(&self, method: &str, params: &P) -> Result<T, ClientError>
    where
        P: serde::Serialize,
        T: serde::de::DeserializeOwned,
    {
        let params =
            serde_json::to_value(params).map_err(|e| ClientError::Serialization(e.to_string()))?;
        let request = JsonRpcRequest::new(self.next_id(), method, params);

        debug!(method = %method, "Making RPC call");

        let response = self
            .http_client()?
            .post(format!("{}/rpc", self.server_url))
            .json(&request)
            .send()
            .await
            .map_err(ClientError::from_reqwest)?;

        if !response.status().is_success() {
            return Err(ClientError::ServerError(format!(
                "Server returned status {}",
                response.status()
            )));
        }

        let rpc_response: JsonRpcResponse =
            response.json().await.map_err(ClientError::from_reqwest)?;

        match (rpc_response.result, rpc_response.error) {
            (_, Some(error)) => Err(ClientError::Rpc(error)),
            (Some(result), None) => serde_json::from_value(result)
                .map_err(|e| ClientError::Deserialization(e.to_string())),
            (None, None) => Err(ClientError::ServerError(
                "Response missing both result and error".to_string(),
            )),
        }
    }

    /// List every user
    ///
    /// Records that fail to convert are skipped with a warning.
    pub async fn get_users(&self) -> Result<Vec<User>, ClientError> {
        let response: GetUsersResponse = self
            .call(method_names::GET_USERS, &GetUsersRequest {})
            .await?;

        Ok(response
            .users
            .into_iter()
            .filter_map(|wire| match User::try_from(wire) {
                Ok(user) => Some(user),
                Err(e) => {
                    warn!(error = %e, "Skipping user that cannot be converted");
                    None
                }
            })
            .collect())
    }

    /// Get a user by ID
    pub async fn get_user_by_id(&self, id: Uuid) -> Result<User, ClientError> {
        let request = GetUserByIdRequest { id: id.to_string() };
        let response: UserResponse = self.call(method_names::GET_USER_BY_ID, &request).await?;
        Ok(User::try_from(response.user)?)
    }

    /// Get a user by email
    pub async fn get_user_by_email(&self, email: &str) -> Result<User, ClientError> {
        let request = GetUserByEmailRequest {
            email: email.to_string(),
        };
        let response: UserResponse = self
            .call(method_names::GET_USER_BY_EMAIL, &request)
            .await?;
        Ok(User::try_from(response.user)?)
    }

    /// Insert a new user
    pub async fn insert(&self, user: &User) -> Result<(), ClientError> {
        let request = InsertRequest {
            user: Some(WireUser::try_from(user)?),
        };
        let _: EmptyResponse = self.call(method_names::INSERT, &request).await?;
        Ok(())
    }

    /// Replace the user stored under `id`
    pub async fn update(&self, id: Uuid, user: &User) -> Result<(), ClientError> {
        let request = UpdateRequest {
            id: id.to_string(),
            user: Some(WireUser::try_from(user)?),
        };
        let _: EmptyResponse = self.call(method_names::UPDATE, &request).await?;
        Ok(())
    }

    /// Delete a user, returning the removed record
    pub async fn delete(&self, id: Uuid) -> Result<User, ClientError> {
        let request = DeleteRequest { id: id.to_string() };
        let response: UserResponse = self.call(method_names::DELETE, &request).await?;
        Ok(User::try_from(response.user)?)
    }

    /// Check server health
    pub async fn health_check(&self) -> Result<(), ClientError> {
        let response = self
            .http_client()?
            .get(format!("{}/health", self.server_url))
            .send()
            .await
            .map_err(ClientError::from_reqwest)?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(ClientError::ServerError(format!(
                "Health check failed with status {}",
                response.status()
            )))
        }
    }
}

/// Client errors
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("Invalid user record: {0}")]
    Conversion(#[from] ConversionError),

    /// The server answered with a JSON-RPC error, passed through as received
    #[error("RPC error {0}")]
    Rpc(JsonRpcError),
}

impl ClientError {
    fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_decode() {
            Self::Deserialization(err.to_string())
        } else {
            Self::Network(err.to_string())
        }
    }

    /// Returns the server's error code, if the server answered with one
    pub fn rpc_code(&self) -> Option<ErrorCode> {
        match self {
            Self::Rpc(error) => Some(error.error_code()),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.rpc_code() == Some(ErrorCode::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = UsersClient::new("http://localhost:8080/", Duration::from_secs(1));
        assert_eq!(client.server_url, "http://localhost:8080");
    }

    #[test]
    fn test_next_id() {
        let client = UsersClient::new("http://localhost:8080", Duration::from_secs(1));
        assert_eq!(client.next_id(), 1);
        assert_eq!(client.next_id(), 2);
        assert_eq!(client.next_id(), 3);
    }

    #[test]
    fn test_rpc_errors_pass_through() {
        let err = ClientError::Rpc(JsonRpcError::not_found("User not found"));
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "RPC error [-32003] User not found");

        assert!(!ClientError::Timeout.is_not_found());
        assert_eq!(ClientError::Timeout.rpc_code(), None);
    }

    #[tokio::test]
    async fn test_unreachable_server_is_network_error() {
        let client = UsersClient::new("http://127.0.0.1:1", Duration::from_secs(2));
        let err = client.get_users().await.unwrap_err();
        assert!(matches!(err, ClientError::Network(_)));
    }

    #[tokio::test]
    async fn test_nil_user_is_rejected_before_sending() {
        let client = UsersClient::new("http://127.0.0.1:1", Duration::from_secs(2));
        let user = User::with_id(Uuid::nil(), "a@x.com", "p", "user", "A");

        let err = client.insert(&user).await.unwrap_err();
        assert!(matches!(err, ClientError::Conversion(ConversionError::NilId)));
    }
}
