use axum::http::HeaderMap;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::auth::oidc::ExternalAccount;
use crate::config::SessionConfig;

/// Claims of the server-issued session token. The token is handed to the
/// browser at the end of the handshake and presented back as a bearer
/// credential; nothing is stored server-side.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionToken {
    /// External account id (`sub` of the provider token).
    pub sub: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    /// Provider access token, carried opaquely.
    pub access_token: String,
    /// Local user id stamped at sign-in, absent if reconciliation raced.
    #[serde(default)]
    pub local_user_id: Option<i64>,
    pub exp: u64,
    pub iat: u64,
}

/// Session shape exposed to procedures and the frontend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub user: SessionUser,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionUser {
    pub email: Option<String>,
    pub name: Option<String>,
    pub local_user_id: Option<i64>,
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Failed to encode session token: {0}")]
    Encode(String),
    #[error("Invalid session token: {0}")]
    Invalid(String),
}

/// Encoder/decoder for HS256 session tokens.
pub struct SessionCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl: Duration,
}

impl SessionCodec {
    pub fn new(config: &SessionConfig) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.secret.as_bytes()),
            ttl: Duration::seconds(config.ttl_seconds as i64),
        }
    }

    /// Build a fresh, unstamped token for a verified account.
    pub fn issue(&self, account: &ExternalAccount, access_token: String) -> SessionToken {
        let now = Utc::now();
        SessionToken {
            sub: account.id.clone(),
            email: account.email.clone(),
            name: account.name.clone(),
            access_token,
            local_user_id: None,
            exp: (now + self.ttl).timestamp() as u64,
            iat: now.timestamp() as u64,
        }
    }

    pub fn encode(&self, token: &SessionToken) -> Result<String, SessionError> {
        encode(&Header::new(Algorithm::HS256), token, &self.encoding_key)
            .map_err(|e| SessionError::Encode(e.to_string()))
    }

    /// Decode and validate a session token. Expired or tampered tokens fail.
    pub fn decode(&self, raw: &str) -> Result<SessionToken, SessionError> {
        let validation = Validation::new(Algorithm::HS256);
        decode::<SessionToken>(raw, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| SessionError::Invalid(e.to_string()))
    }
}

/// Extract the bearer token from an Authorization header, if present.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("authorization")?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}
