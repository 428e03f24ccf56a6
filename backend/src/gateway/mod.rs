//! Typed procedure gateway exposed at `POST /rpc`.
//!
//! One HTTP endpoint accepts a single call or a batch; each call is
//! dispatched by path to a procedure. Procedures come in two tiers:
//! public, and protected behind [`RequestContext::require_session`].

pub mod user;

use std::sync::Arc;

use axum::{extract::State, http::HeaderMap, routing::post, Json, Router};

use portal_common::rpc::{RpcCall, RpcError, RpcReply, RpcRequest, RpcResponse};

use crate::auth::bridge;
use crate::auth::session::{bearer_token, Session};
use crate::store::{StoreError, UserStore};
use crate::AppState;

/// Per-request context handed to every procedure.
pub struct RequestContext {
    /// Resolved session, absent for anonymous callers.
    pub session: Option<Session>,
    pub store: Arc<UserStore>,
}

impl RequestContext {
    /// Authorization gate for protected procedures: short-circuits with
    /// `UNAUTHORIZED` before any handler logic runs.
    pub fn require_session(&self) -> Result<&Session, RpcError> {
        self.session.as_ref().ok_or_else(RpcError::unauthorized)
    }
}

/// Resolve the caller's session (if any) and bind the store handle.
pub fn build_context(state: &AppState, headers: &HeaderMap) -> RequestContext {
    let session = bearer_token(headers).and_then(|raw| match state.session_codec.decode(raw) {
        Ok(token) => Some(bridge::materialize_session(&token)),
        Err(e) => {
            tracing::debug!("Discarding invalid session token: {}", e);
            None
        }
    });

    RequestContext {
        session,
        store: state.store.clone(),
    }
}

pub fn dispatch(ctx: &RequestContext, request: RpcRequest) -> RpcResponse {
    let result = match request.path.as_str() {
        "user.getAll" => user::get_all(ctx),
        "user.getCurrent" => user::get_current(ctx),
        "user.updateProfile" => user::update_profile(ctx, request.input),
        other => Err(RpcError::not_found(other)),
    };

    match result {
        Ok(value) => RpcResponse::ok(request.id, value),
        Err(error) => RpcResponse::error(request.id, error),
    }
}

/// Store failures surface to the caller as opaque internal errors; the
/// detail stays in the server log.
pub(crate) fn store_error(e: StoreError) -> RpcError {
    tracing::error!("Store error during procedure call: {}", e);
    RpcError::internal("Internal server error")
}

async fn handle_rpc(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(call): Json<RpcCall>,
) -> Json<RpcReply> {
    let ctx = build_context(&state, &headers);

    let reply = match call {
        RpcCall::Single(request) => RpcReply::Single(dispatch(&ctx, request)),
        RpcCall::Batch(requests) => RpcReply::Batch(
            requests
                .into_iter()
                .map(|request| dispatch(&ctx, request))
                .collect(),
        ),
    };

    Json(reply)
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/rpc", post(handle_rpc))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use portal_common::rpc::RpcErrorCode;
    use serde_json::json;

    use crate::test_util::{seeded_context, test_context};

    #[test]
    fn test_dispatch_unknown_path() {
        let ctx = test_context(None);
        let response = dispatch(
            &ctx,
            RpcRequest {
                id: 1,
                path: "user.delete".to_string(),
                input: None,
            },
        );

        let error = response.error.unwrap();
        assert_eq!(error.code, RpcErrorCode::NotFound);
        assert!(error.message.contains("user.delete"));
    }

    #[test]
    fn test_dispatch_echoes_request_id() {
        let (ctx, _user) = seeded_context();
        let response = dispatch(
            &ctx,
            RpcRequest {
                id: 42,
                path: "user.getAll".to_string(),
                input: None,
            },
        );
        assert_eq!(response.id, 42);
        assert!(response.result.is_some());
    }

    #[test]
    fn test_require_session_without_session() {
        let ctx = test_context(None);
        let error = ctx.require_session().unwrap_err();
        assert_eq!(error.code, RpcErrorCode::Unauthorized);
    }

    #[test]
    fn test_require_session_with_session() {
        let (ctx, user) = seeded_context();
        let session = ctx.require_session().unwrap();
        assert_eq!(session.user.local_user_id, Some(user.id));
    }

    #[test]
    fn test_dispatch_protected_before_input_validation() {
        // An unauthenticated call with invalid input fails on the tier
        // gate, not on validation.
        let ctx = test_context(None);
        let response = dispatch(
            &ctx,
            RpcRequest {
                id: 1,
                path: "user.updateProfile".to_string(),
                input: Some(json!({ "name": "" })),
            },
        );
        assert_eq!(response.error.unwrap().code, RpcErrorCode::Unauthorized);
    }
}
