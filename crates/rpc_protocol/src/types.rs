//! JSON-RPC envelope and wire record types.

use serde::{Deserialize, Serialize};

use crate::JsonRpcError;

/// JSON-RPC protocol version carried by every envelope
pub const JSONRPC_VERSION: &str = "2.0";

/// JSON-RPC request identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    Number(u64),
    String(String),
}

impl From<u64> for RequestId {
    fn from(id: u64) -> Self {
        RequestId::Number(id)
    }
}

/// JSON-RPC request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<RequestId>,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

impl JsonRpcRequest {
    /// Creates a request with the current protocol version.
    pub fn new(
        id: impl Into<RequestId>,
        method: impl Into<String>,
        params: serde_json::Value,
    ) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: Some(id.into()),
            method: method.into(),
            params,
        }
    }
}

/// JSON-RPC response.
///
/// Exactly one of `result` and `error` is set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    pub id: Option<RequestId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    pub fn success(id: Option<RequestId>, result: serde_json::Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn error(id: Option<RequestId>, error: JsonRpcError) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: None,
            error: Some(error),
        }
    }
}

/// Wire form of a user record.
///
/// Every field is a plain string. Missing fields deserialize as empty
/// strings so that conversion, not parsing, decides what is acceptable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WireUser {
    pub id: String,
    pub email: String,
    pub password: String,
    pub role: String,
    pub nick: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_id_is_untagged() {
        let numeric: RequestId = serde_json::from_str("7").unwrap();
        assert_eq!(numeric, RequestId::Number(7));

        let text: RequestId = serde_json::from_str("\"abc\"").unwrap();
        assert_eq!(text, RequestId::String("abc".to_string()));
    }

    #[test]
    fn test_request_without_params() {
        let request: JsonRpcRequest =
            serde_json::from_str(r#"{"jsonrpc":"2.0","id":1,"method":"getUsers"}"#).unwrap();

        assert_eq!(request.method, "getUsers");
        assert!(request.params.is_null());
    }

    #[test]
    fn test_error_response_omits_result() {
        let response = JsonRpcResponse::error(
            Some(RequestId::Number(3)),
            JsonRpcError::method_not_found("frobnicate"),
        );
        let json = serde_json::to_value(&response).unwrap();

        assert_eq!(json["id"], 3);
        assert_eq!(json["error"]["code"], -32601);
        assert!(json.get("result").is_none());
    }

    #[test]
    fn test_partial_wire_user_defaults_to_empty() {
        let wire: WireUser = serde_json::from_str(r#"{"email":"a@x.com"}"#).unwrap();

        assert_eq!(wire.email, "a@x.com");
        assert!(wire.id.is_empty());
        assert!(wire.nick.is_empty());
    }
}
