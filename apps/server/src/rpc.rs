//! JSON-RPC request handling

use axum::{extract::rejection::JsonRejection, extract::State, http::StatusCode, Json};
use entities::User;
use rpc_protocol::{
    method_names, parse_user_id, DeleteRequest, DeleteResponse, EmptyResponse, ErrorCode,
    GetUserByEmailRequest, GetUserByIdRequest, GetUsersRequest, GetUsersResponse, InsertRequest,
    JsonRpcError, JsonRpcRequest, JsonRpcResponse, UpdateRequest, UserResponse, WireUser,
    JSONRPC_VERSION,
};
use tracing::{error, info, warn};
use user_store::CallContext;
use uuid::Uuid;

use crate::{
    manager::{ErrorKind, ManagerError},
    state::AppState,
};

/// Handle a JSON-RPC request
pub async fn handle_rpc(
    State(state): State<AppState>,
    payload: Result<Json<JsonRpcRequest>, JsonRejection>,
) -> (StatusCode, Json<JsonRpcResponse>) {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            let error = rejection_error(&rejection);
            warn!(code = error.code, error = %rejection.body_text(), "Rejected request body");
            return (StatusCode::OK, Json(JsonRpcResponse::error(None, error)));
        }
    };

    let response = match dispatch_method(&state, &request).await {
        Ok(result) => JsonRpcResponse::success(request.id, result),
        Err(error) => JsonRpcResponse::error(request.id, error),
    };

    (StatusCode::OK, Json(response))
}

/// Valid JSON that is not a request object is an invalid request, not a parse error
fn rejection_error(rejection: &JsonRejection) -> JsonRpcError {
    match rejection {
        JsonRejection::JsonDataError(_) | JsonRejection::MissingJsonContentType(_) => {
            JsonRpcError::invalid_request(rejection.body_text())
        }
        _ => JsonRpcError::parse_error(rejection.body_text()),
    }
}

/// Log a request rejected before it reaches the manager.
fn reject(op: &str, key: &str, error: JsonRpcError) -> JsonRpcError {
    warn!(op, key, code = error.code, error = %error.message, "Rejected request");
    error
}

/// Dispatch a method call to the appropriate handler
pub async fn dispatch_method(
    state: &AppState,
    request: &JsonRpcRequest,
) -> Result<serde_json::Value, JsonRpcError> {
    if request.jsonrpc != JSONRPC_VERSION {
        let error = JsonRpcError::invalid_request(format!(
            "unsupported jsonrpc version {:?}",
            request.jsonrpc
        ));
        return Err(reject(&request.method, &request.jsonrpc, error));
    }

    let ctx = state.call_context();

    match request.method.as_str() {
        method_names::GET_USERS => {
            let _params: GetUsersRequest = parse_params(&request.method, &request.params)?;
            handle_get_users(state, &ctx).await
        }
        method_names::GET_USER_BY_ID => {
            let params: GetUserByIdRequest = parse_params(&request.method, &request.params)?;
            handle_get_user_by_id(state, &ctx, params).await
        }
        method_names::GET_USER_BY_EMAIL => {
            let params: GetUserByEmailRequest = parse_params(&request.method, &request.params)?;
            handle_get_user_by_email(state, &ctx, params).await
        }
        method_names::INSERT => {
            let params: InsertRequest = parse_params(&request.method, &request.params)?;
            handle_insert(state, &ctx, params).await
        }
        method_names::UPDATE => {
            let params: UpdateRequest = parse_params(&request.method, &request.params)?;
            handle_update(state, &ctx, params).await
        }
        method_names::DELETE => {
            let params: DeleteRequest = parse_params(&request.method, &request.params)?;
            handle_delete(state, &ctx, params).await
        }

        method => Err(reject(method, "-", JsonRpcError::method_not_found(method))),
    }
}

/// Parse JSON-RPC params; absent params parse as an empty object
fn parse_params<T: serde::de::DeserializeOwned>(
    method: &str,
    params: &serde_json::Value,
) -> Result<T, JsonRpcError> {
    let params = if params.is_null() {
        serde_json::Value::Object(Default::default())
    } else {
        params.clone()
    };
    serde_json::from_value(params)
        .map_err(|e| reject(method, "params", JsonRpcError::invalid_params(e.to_string())))
}

fn to_value<T: serde::Serialize>(response: T) -> Result<serde_json::Value, JsonRpcError> {
    serde_json::to_value(response).map_err(|e| JsonRpcError::internal_error(e.to_string()))
}

fn parse_id(op: &str, raw: &str) -> Result<Uuid, JsonRpcError> {
    parse_user_id(raw)
        .map_err(|e| reject(op, raw, JsonRpcError::invalid_params(format!("id: {e}"))))
}

fn inbound_user(op: &str, user: Option<WireUser>) -> Result<User, JsonRpcError> {
    let Some(wire) = user else {
        return Err(reject(op, "-", JsonRpcError::invalid_params("user is required")));
    };
    let key = wire.id.clone();
    User::try_from(wire)
        .map_err(|e| reject(op, &key, JsonRpcError::invalid_params(format!("user: {e}"))))
}

/// Convert a stored user for the response.
///
/// A stored record that cannot be represented on the wire is an internal
/// error; the storage call itself already succeeded.
fn outbound_user(op: &'static str, user: &User) -> Result<WireUser, JsonRpcError> {
    WireUser::try_from(user).map_err(|e| {
        error!(op, user_id = %user.id, error = %e, "Stored user cannot be converted to wire format");
        internal(ErrorKind::Internal, "stored user cannot be converted")
    })
}

fn internal(kind: ErrorKind, message: &str) -> JsonRpcError {
    JsonRpcError::with_data(
        ErrorCode::InternalError,
        message,
        serde_json::json!({ "kind": kind.as_str() }),
    )
}

/// Map a manager error onto exactly one wire status class
pub fn rpc_error(err: ManagerError) -> JsonRpcError {
    match err.kind {
        ErrorKind::NotFound => JsonRpcError::not_found(err.source.to_string()),
        ErrorKind::AlreadyExists => JsonRpcError::already_exists(err.source.to_string()),
        ErrorKind::Cancelled => internal(err.kind, "operation cancelled"),
        ErrorKind::Unavailable => internal(err.kind, "storage unavailable"),
        ErrorKind::Unimplemented => internal(err.kind, "operation not supported"),
        ErrorKind::Internal => internal(err.kind, "internal error"),
    }
}

// ========== Read Handlers ==========

async fn handle_get_users(
    state: &AppState,
    ctx: &CallContext,
) -> Result<serde_json::Value, JsonRpcError> {
    let users = state.manager.get_users(ctx).await.map_err(rpc_error)?;

    let mut wire_users = Vec::with_capacity(users.len());
    for user in &users {
        match WireUser::try_from(user) {
            Ok(wire) => wire_users.push(wire),
            Err(e) => {
                warn!(user_id = %user.id, error = %e, "Skipping user that cannot be converted");
            }
        }
    }

    to_value(GetUsersResponse { users: wire_users })
}

async fn handle_get_user_by_id(
    state: &AppState,
    ctx: &CallContext,
    params: GetUserByIdRequest,
) -> Result<serde_json::Value, JsonRpcError> {
    let id = parse_id("get_user_by_id", &params.id)?;
    let user = state
        .manager
        .get_user_by_id(ctx, id)
        .await
        .map_err(rpc_error)?;

    to_value(UserResponse {
        user: outbound_user("get_user_by_id", &user)?,
    })
}

async fn handle_get_user_by_email(
    state: &AppState,
    ctx: &CallContext,
    params: GetUserByEmailRequest,
) -> Result<serde_json::Value, JsonRpcError> {
    if params.email.is_empty() {
        let error = JsonRpcError::invalid_params("email is required");
        return Err(reject("get_user_by_email", "-", error));
    }
    let user = state
        .manager
        .get_user_by_email(ctx, &params.email)
        .await
        .map_err(rpc_error)?;

    to_value(UserResponse {
        user: outbound_user("get_user_by_email", &user)?,
    })
}

// ========== Write Handlers ==========

async fn handle_insert(
    state: &AppState,
    ctx: &CallContext,
    params: InsertRequest,
) -> Result<serde_json::Value, JsonRpcError> {
    let user = inbound_user("insert", params.user)?;
    let user_id = user.id;

    state.manager.insert(ctx, user).await.map_err(rpc_error)?;

    info!(user_id = %user_id, "Inserted user");
    to_value(EmptyResponse {})
}

async fn handle_update(
    state: &AppState,
    ctx: &CallContext,
    params: UpdateRequest,
) -> Result<serde_json::Value, JsonRpcError> {
    let id = parse_id("update", &params.id)?;
    let user = inbound_user("update", params.user)?;
    if user.id != id {
        let error = JsonRpcError::invalid_params(format!(
            "user id {} does not match target id {}",
            user.id, id
        ));
        return Err(reject("update", &id.to_string(), error));
    }

    state
        .manager
        .update(ctx, id, user)
        .await
        .map_err(rpc_error)?;

    info!(user_id = %id, "Updated user");
    to_value(EmptyResponse {})
}

async fn handle_delete(
    state: &AppState,
    ctx: &CallContext,
    params: DeleteRequest,
) -> Result<serde_json::Value, JsonRpcError> {
    let id = parse_id("delete", &params.id)?;
    let user = state.manager.delete(ctx, id).await.map_err(rpc_error)?;

    info!(user_id = %id, "Deleted user");
    to_value(DeleteResponse {
        user: outbound_user("delete", &user)?,
    })
}

#[cfg(test)]
mod tests {
    use std::fmt::{self, Write as _};
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use rpc_protocol::RequestId;
    use serde_json::json;
    use tracing::field::{Field, Visit};
    use tracing_subscriber::layer::{Context, SubscriberExt};
    use tracing_subscriber::Layer;
    use user_store::{MemoryUserStore, UserStore, UserStoreError, UserStoreResult};

    use super::*;
    use crate::config::ServerConfig;

    fn state() -> AppState {
        AppState::with_store(ServerConfig::default(), Arc::new(MemoryUserStore::new()))
    }

    fn request(method: &str, params: serde_json::Value) -> JsonRpcRequest {
        JsonRpcRequest::new(1, method, params)
    }

    fn wire(user: &User) -> serde_json::Value {
        serde_json::to_value(WireUser::try_from(user).unwrap()).unwrap()
    }

    async fn call(
        state: &AppState,
        method: &str,
        params: serde_json::Value,
    ) -> Result<serde_json::Value, JsonRpcError> {
        dispatch_method(state, &request(method, params)).await
    }

    /// Collects the fields of every event as `name=value` text.
    #[derive(Clone, Default)]
    struct Recorder(Arc<Mutex<Vec<String>>>);

    struct Line<'a>(&'a mut String);

    impl Visit for Line<'_> {
        fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
            let _ = write!(self.0, "{}={:?} ", field.name(), value);
        }
    }

    impl<S: tracing::Subscriber> Layer<S> for Recorder {
        fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
            let mut line = String::new();
            event.record(&mut Line(&mut line));
            self.0.lock().unwrap().push(line);
        }
    }

    impl Recorder {
        fn take(&self) -> Vec<String> {
            std::mem::take(&mut *self.0.lock().unwrap())
        }
    }

    /// Store returning a record that cannot be sent back to callers.
    struct NilIdStore;

    #[async_trait]
    impl UserStore for NilIdStore {
        async fn get_users(&self, _ctx: &CallContext) -> UserStoreResult<Vec<User>> {
            Ok(vec![
                User::with_id(Uuid::nil(), "ghost@x.com", "p", "user", "G"),
                User::new("a@x.com", "p", "user", "A"),
            ])
        }

        async fn get_user_by_email(&self, _ctx: &CallContext, email: &str) -> UserStoreResult<User> {
            Ok(User::with_id(Uuid::nil(), email, "p", "user", "G"))
        }

        async fn get_user_by_id(&self, _ctx: &CallContext, _id: Uuid) -> UserStoreResult<User> {
            Err(UserStoreError::ConnectionFailure("refused".to_string()))
        }
    }

    #[tokio::test]
    async fn test_example_scenario() {
        let state = state();
        let user = User::new("a@x.com", "p", "user", "A");

        call(&state, "insert", json!({ "user": wire(&user) }))
            .await
            .unwrap();

        let found = call(&state, "getUserByEmail", json!({ "email": "a@x.com" }))
            .await
            .unwrap();
        assert_eq!(found["user"], wire(&user));

        let deleted = call(&state, "delete", json!({ "id": user.id.to_string() }))
            .await
            .unwrap();
        assert_eq!(deleted["user"], wire(&user));

        let err = call(&state, "getUserById", json!({ "id": user.id.to_string() }))
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), ErrorCode::NotFound);
    }

    #[tokio::test]
    async fn test_get_users_lists_every_record() {
        let state = state();
        for i in 0..3 {
            let user = User::new(format!("u{i}@x.com"), "p", "user", format!("U{i}"));
            call(&state, "insert", json!({ "user": wire(&user) }))
                .await
                .unwrap();
        }

        let result = call(&state, "getUsers", serde_json::Value::Null)
            .await
            .unwrap();
        assert_eq!(result["users"].as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_malformed_ids_are_invalid_params() {
        let state = state();

        for id in ["", "not-a-uuid", "00000000-0000-0000-0000-000000000000"] {
            let err = call(&state, "getUserById", json!({ "id": id }))
                .await
                .unwrap_err();
            assert_eq!(err.error_code(), ErrorCode::InvalidParams, "id {id:?}");

            let err = call(&state, "delete", json!({ "id": id })).await.unwrap_err();
            assert_eq!(err.error_code(), ErrorCode::InvalidParams);
        }

        let err = call(&state, "getUserById", json!({})).await.unwrap_err();
        assert_eq!(err.error_code(), ErrorCode::InvalidParams);

        let err = call(&state, "getUserByEmail", json!({ "email": "" }))
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), ErrorCode::InvalidParams);
    }

    #[tokio::test]
    async fn test_insert_requires_a_complete_user() {
        let state = state();

        let err = call(&state, "insert", json!({})).await.unwrap_err();
        assert_eq!(err.error_code(), ErrorCode::InvalidParams);

        let err = call(&state, "insert", json!({ "user": null }))
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), ErrorCode::InvalidParams);

        let err = call(&state, "insert", json!({ "user": { "email": "a@x.com" } }))
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), ErrorCode::InvalidParams);

        let users = call(&state, "getUsers", json!({})).await.unwrap();
        assert!(users["users"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_insert_is_already_exists() {
        let state = state();
        let user = User::new("a@x.com", "p", "user", "A");
        call(&state, "insert", json!({ "user": wire(&user) }))
            .await
            .unwrap();

        let err = call(&state, "insert", json!({ "user": wire(&user) }))
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), ErrorCode::AlreadyExists);
    }

    #[tokio::test]
    async fn test_update_replaces_every_field() {
        let state = state();
        let user = User::new("a@x.com", "p", "user", "A");
        call(&state, "insert", json!({ "user": wire(&user) }))
            .await
            .unwrap();

        let replacement = User::with_id(user.id, "b@x.com", "q", "admin", "B");
        call(
            &state,
            "update",
            json!({ "id": user.id.to_string(), "user": wire(&replacement) }),
        )
        .await
        .unwrap();

        let found = call(&state, "getUserById", json!({ "id": user.id.to_string() }))
            .await
            .unwrap();
        assert_eq!(found["user"], wire(&replacement));
    }

    #[tokio::test]
    async fn test_update_rejects_mismatched_body_id() {
        let state = state();
        let user = User::new("a@x.com", "p", "user", "A");
        call(&state, "insert", json!({ "user": wire(&user) }))
            .await
            .unwrap();

        let other = User::new("b@x.com", "q", "admin", "B");
        let err = call(
            &state,
            "update",
            json!({ "id": user.id.to_string(), "user": wire(&other) }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.error_code(), ErrorCode::InvalidParams);
    }

    #[tokio::test]
    async fn test_update_missing_user_is_not_found() {
        let state = state();
        let user = User::new("a@x.com", "p", "user", "A");

        let err = call(
            &state,
            "update",
            json!({ "id": user.id.to_string(), "user": wire(&user) }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.error_code(), ErrorCode::NotFound);
    }

    #[tokio::test]
    async fn test_unconvertible_records() {
        let state = AppState::with_store(ServerConfig::default(), Arc::new(NilIdStore));

        // Listing skips the bad record
        let result = call(&state, "getUsers", json!({})).await.unwrap();
        let users = result["users"].as_array().unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0]["email"], "a@x.com");

        // A single read reports it as internal
        let err = call(&state, "getUserByEmail", json!({ "email": "ghost@x.com" }))
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), ErrorCode::InternalError);
        assert_eq!(err.data.unwrap()["kind"], "internal");
    }

    #[tokio::test]
    async fn test_backend_failures_are_internal_with_kind() {
        let state = AppState::with_store(ServerConfig::default(), Arc::new(NilIdStore));

        let err = call(&state, "getUserById", json!({ "id": Uuid::new_v4().to_string() }))
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), ErrorCode::InternalError);
        assert_eq!(err.data.unwrap()["kind"], "unavailable");

        let err = call(&state, "delete", json!({ "id": Uuid::new_v4().to_string() }))
            .await
            .unwrap_err();
        assert_eq!(err.data.unwrap()["kind"], "unimplemented");
    }

    #[tokio::test]
    async fn test_shutdown_cancels_calls() {
        let state = state();
        state.shutdown.cancel();

        let err = call(&state, "getUsers", json!({})).await.unwrap_err();
        assert_eq!(err.error_code(), ErrorCode::InternalError);
        assert_eq!(err.data.unwrap()["kind"], "cancelled");
    }

    #[tokio::test]
    async fn test_rejected_requests_are_logged() {
        let recorder = Recorder::default();
        let subscriber = tracing_subscriber::registry().with(recorder.clone());
        let _guard = tracing::subscriber::set_default(subscriber);
        let state = state();

        let err = call(&state, "getUserById", json!({ "id": "not-a-uuid" }))
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), ErrorCode::InvalidParams);
        let events = recorder.take();
        assert_eq!(events.len(), 1);
        assert!(events[0].contains("op=\"get_user_by_id\""));
        assert!(events[0].contains("key=\"not-a-uuid\""));

        let err = call(&state, "insert", json!({ "user": null }))
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), ErrorCode::InvalidParams);
        let events = recorder.take();
        assert_eq!(events.len(), 1);
        assert!(events[0].contains("op=\"insert\""));

        let user = User::new("a@x.com", "p", "user", "A");
        let other = User::new("b@x.com", "q", "admin", "B");
        let err = call(
            &state,
            "update",
            json!({ "id": user.id.to_string(), "user": wire(&other) }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.error_code(), ErrorCode::InvalidParams);
        let events = recorder.take();
        assert_eq!(events.len(), 1);
        assert!(events[0].contains(&user.id.to_string()));

        call(&state, "getUserByEmail", json!({ "email": "" }))
            .await
            .unwrap_err();
        call(&state, "frobnicate", json!({})).await.unwrap_err();
        call(&state, "getUserById", json!({ "id": 5 })).await.unwrap_err();
        let events = recorder.take();
        assert_eq!(events.len(), 3);
        assert!(events[1].contains("op=\"frobnicate\""));
    }

    #[tokio::test]
    async fn test_unknown_method_and_version() {
        let state = state();

        let err = call(&state, "frobnicate", json!({})).await.unwrap_err();
        assert_eq!(err.error_code(), ErrorCode::MethodNotFound);

        let mut bad = request("getUsers", json!({}));
        bad.jsonrpc = "1.0".to_string();
        let err = dispatch_method(&state, &bad).await.unwrap_err();
        assert_eq!(err.error_code(), ErrorCode::InvalidRequest);

        let named = JsonRpcRequest {
            id: Some(RequestId::String("x".to_string())),
            ..request("getUsers", json!({}))
        };
        assert!(dispatch_method(&state, &named).await.is_ok());
    }
}
