//! RPC envelope types for the procedure gateway.
//!
//! The gateway accepts either a single call or a batch of calls in one
//! HTTP request. Each call names a procedure path and carries an optional
//! JSON input; each reply pairs the call id with a result or a structured
//! error. The envelope itself is plain JSON; extended types (dates) ride
//! inside results as RFC 3339 strings.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single procedure call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcRequest {
    /// Caller-chosen id, echoed back on the matching response.
    pub id: u64,
    /// Procedure path, e.g. `user.getAll`.
    pub path: String,
    /// Procedure input, validated per procedure before dispatch.
    #[serde(default)]
    pub input: Option<Value>,
}

/// Request body of the gateway endpoint: one call or a batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RpcCall {
    Single(RpcRequest),
    Batch(Vec<RpcRequest>),
}

/// Response body, mirroring the shape of the request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RpcReply {
    Single(RpcResponse),
    Batch(Vec<RpcResponse>),
}

/// Outcome of one procedure call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcResponse {
    pub id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

impl RpcResponse {
    pub fn ok(id: u64, result: Value) -> Self {
        Self {
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn error(id: u64, error: RpcError) -> Self {
        Self {
            id,
            result: None,
            error: Some(error),
        }
    }
}

/// Structured procedure failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcError {
    pub code: RpcErrorCode,
    pub message: String,
    /// Per-field validation detail, present for `BadRequest` only.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub field_errors: Vec<FieldError>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RpcErrorCode {
    Unauthorized,
    BadRequest,
    NotFound,
    InternalServerError,
}

/// One failed input constraint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl RpcError {
    /// Protected procedure invoked without an authenticated session.
    pub fn unauthorized() -> Self {
        Self {
            code: RpcErrorCode::Unauthorized,
            message: "UNAUTHORIZED".to_string(),
            field_errors: Vec::new(),
        }
    }

    pub fn bad_request(message: impl Into<String>, field_errors: Vec<FieldError>) -> Self {
        Self {
            code: RpcErrorCode::BadRequest,
            message: message.into(),
            field_errors,
        }
    }

    pub fn not_found(path: &str) -> Self {
        Self {
            code: RpcErrorCode::NotFound,
            message: format!("No procedure on path \"{}\"", path),
            field_errors: Vec::new(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            code: RpcErrorCode::InternalServerError,
            message: message.into(),
            field_errors: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_single_call_deserializes() {
        let body = r#"{"id":1,"path":"user.getAll"}"#;
        let call: RpcCall = serde_json::from_str(body).unwrap();
        match call {
            RpcCall::Single(req) => {
                assert_eq!(req.id, 1);
                assert_eq!(req.path, "user.getAll");
                assert!(req.input.is_none());
            }
            RpcCall::Batch(_) => panic!("expected single call"),
        }
    }

    #[test]
    fn test_batch_call_deserializes() {
        let body = r#"[{"id":1,"path":"user.getAll"},{"id":2,"path":"user.getCurrent","input":null}]"#;
        let call: RpcCall = serde_json::from_str(body).unwrap();
        match call {
            RpcCall::Batch(reqs) => assert_eq!(reqs.len(), 2),
            RpcCall::Single(_) => panic!("expected batch"),
        }
    }

    #[test]
    fn test_ok_response_omits_error() {
        let response = RpcResponse::ok(3, json!([1, 2]));
        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains(r#""result":[1,2]"#));
        assert!(!json.contains("error"));
    }

    #[test]
    fn test_error_response_omits_result() {
        let response = RpcResponse::error(4, RpcError::unauthorized());
        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains(r#""code":"UNAUTHORIZED""#));
        assert!(!json.contains("result"));
    }

    #[test]
    fn test_bad_request_carries_field_errors() {
        let error = RpcError::bad_request(
            "Invalid input",
            vec![FieldError::new("name", "String must contain at least 1 character(s)")],
        );
        let json = serde_json::to_string(&error).unwrap();
        assert!(json.contains(r#""field":"name""#));
        assert!(json.contains("at least 1 character"));
    }

    #[test]
    fn test_unauthorized_has_no_field_errors_key() {
        let json = serde_json::to_string(&RpcError::unauthorized()).unwrap();
        assert!(!json.contains("field_errors"));
    }

    #[test]
    fn test_error_code_wire_names() {
        assert_eq!(
            serde_json::to_string(&RpcErrorCode::InternalServerError).unwrap(),
            r#""INTERNAL_SERVER_ERROR""#
        );
        assert_eq!(
            serde_json::to_string(&RpcErrorCode::BadRequest).unwrap(),
            r#""BAD_REQUEST""#
        );
    }
}
