//! Authentication handshake endpoints.
//!
//! The browser drives the provider's authorization-code flow and hands
//! the resulting code to `POST /auth/callback`. The backend exchanges
//! it, verifies the access token, runs the identity-bridge hooks and
//! returns a signed session token. `GET /auth/session` materializes the
//! session for whatever token the caller presents, for frontend
//! hydration.

use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::auth::bridge;
use crate::auth::session::{bearer_token, Session};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct CallbackRequest {
    pub code: String,
    pub redirect_uri: String,
}

#[derive(Debug, Serialize)]
pub struct CallbackResponse {
    pub session_token: String,
    pub session: Session,
}

/// POST /auth/callback - complete the sign-in handshake.
async fn callback(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CallbackRequest>,
) -> Result<Json<CallbackResponse>, (StatusCode, String)> {
    let access_token = state
        .oidc_client
        .exchange_code(&request.code, &request.redirect_uri)
        .await
        .map_err(|e| {
            tracing::warn!("Code exchange failed: {}", e);
            (StatusCode::BAD_GATEWAY, "Authentication failed".to_string())
        })?;

    let account = state
        .oidc_client
        .verify_access_token(&access_token)
        .await
        .map_err(|e| {
            tracing::warn!("Access token verification failed: {}", e);
            (StatusCode::UNAUTHORIZED, "Authentication failed".to_string())
        })?;

    // Sign-in hook: reconcile the provider account with a local row.
    // Denials carry no detail; the cause is already in the server log.
    if !state.bridge.sign_in(&account) {
        return Err((StatusCode::FORBIDDEN, "Sign-in denied".to_string()));
    }

    // Token hook: stamp the local id onto the fresh session token.
    let mut token = state.session_codec.issue(&account, access_token);
    state.bridge.stamp_token(&mut token, &account).map_err(|e| {
        tracing::error!("Token stamping failed for {}: {}", account.id, e);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Authentication failed".to_string(),
        )
    })?;

    let session_token = state.session_codec.encode(&token).map_err(|e| {
        tracing::error!("Session token encoding failed: {}", e);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Authentication failed".to_string(),
        )
    })?;

    // Session hook: hand the materialized session back for hydration.
    let session = bridge::materialize_session(&token);

    Ok(Json(CallbackResponse {
        session_token,
        session,
    }))
}

/// GET /auth/session - materialize the session for the presented token,
/// or `null` for anonymous callers.
async fn session(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Json<Option<Session>> {
    let session = bearer_token(&headers)
        .and_then(|raw| state.session_codec.decode(raw).ok())
        .map(|token| bridge::materialize_session(&token));

    Json(session)
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/auth/callback", post(callback))
        .route("/auth/session", get(session))
        .with_state(state)
}
