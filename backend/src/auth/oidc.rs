use std::collections::HashMap;
use std::sync::Arc;

use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use reqwest::Client;
use serde::Deserialize;
use tokio::sync::RwLock;

use crate::config::OidcConfig;

/// Provider name attached to accounts reconciled by this service.
pub const PROVIDER_KEYCLOAK: &str = "keycloak";

/// Identity-provider account extracted from a verified access token.
#[derive(Debug, Clone)]
pub struct ExternalAccount {
    /// Which provider issued the account.
    pub provider: &'static str,
    /// Provider account id (`sub` claim).
    pub id: String,
    pub email: Option<String>,
    pub name: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("OIDC discovery error: {0}")]
    DiscoveryError(String),
    #[error("JWKS fetch error: {0}")]
    JwksFetchError(String),
    #[error("Code exchange failed: {0}")]
    ExchangeError(String),
    #[error("Invalid token: {0}")]
    InvalidToken(String),
    #[error("Key not found for kid: {0}")]
    KeyNotFound(String),
}

/// Subset of the provider discovery document this service needs.
#[derive(Debug, Deserialize)]
struct ProviderMetadata {
    token_endpoint: String,
    jwks_uri: String,
}

/// JWKS key set response.
#[derive(Debug, Deserialize)]
struct JwksResponse {
    keys: Vec<Jwk>,
}

#[derive(Debug, Clone, Deserialize)]
struct Jwk {
    kid: String,
    kty: String,
    n: Option<String>,
    e: Option<String>,
}

/// Claims read from a verified provider access token.
#[derive(Debug, Deserialize)]
struct ProviderClaims {
    sub: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    preferred_username: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Client for one OIDC provider: discovery, cached JWKS keys,
/// authorization-code exchange and access-token verification.
pub struct OidcClient {
    http_client: Client,
    issuer: String,
    client_id: String,
    client_secret: String,
    token_endpoint: String,
    jwks_uri: String,
    keys: Arc<RwLock<HashMap<String, DecodingKey>>>,
}

impl OidcClient {
    pub async fn new(config: &OidcConfig) -> Result<Self, AuthError> {
        let http_client = Client::new();

        // Fetch the discovery document for the token endpoint and JWKS URI
        let discovery_url = format!(
            "{}/.well-known/openid-configuration",
            config.issuer.trim_end_matches('/')
        );
        let metadata: ProviderMetadata = http_client
            .get(&discovery_url)
            .send()
            .await
            .map_err(|e| AuthError::DiscoveryError(e.to_string()))?
            .json()
            .await
            .map_err(|e| AuthError::DiscoveryError(e.to_string()))?;

        let client = Self {
            http_client,
            issuer: config.issuer.clone(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            token_endpoint: metadata.token_endpoint,
            jwks_uri: metadata.jwks_uri,
            keys: Arc::new(RwLock::new(HashMap::new())),
        };

        // Fetch keys initially
        client.refresh_keys().await?;

        Ok(client)
    }

    async fn refresh_keys(&self) -> Result<(), AuthError> {
        tracing::info!("Fetching JWKS from {}", self.jwks_uri);

        let response: JwksResponse = self
            .http_client
            .get(&self.jwks_uri)
            .send()
            .await
            .map_err(|e| AuthError::JwksFetchError(e.to_string()))?
            .json()
            .await
            .map_err(|e| AuthError::JwksFetchError(e.to_string()))?;

        let mut keys = self.keys.write().await;
        keys.clear();

        for jwk in response.keys {
            if jwk.kty == "RSA" {
                if let (Some(n), Some(e)) = (&jwk.n, &jwk.e) {
                    match DecodingKey::from_rsa_components(n, e) {
                        Ok(key) => {
                            keys.insert(jwk.kid.clone(), key);
                        }
                        Err(e) => {
                            tracing::warn!("Failed to parse RSA key {}: {}", jwk.kid, e);
                        }
                    }
                }
            }
        }

        tracing::info!("Loaded {} JWKS keys", keys.len());
        Ok(())
    }

    /// Exchange an authorization code at the provider token endpoint.
    /// Returns the provider access token.
    pub async fn exchange_code(&self, code: &str, redirect_uri: &str) -> Result<String, AuthError> {
        let params = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", redirect_uri),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
        ];

        let response = self
            .http_client
            .post(&self.token_endpoint)
            .form(&params)
            .send()
            .await
            .map_err(|e| AuthError::ExchangeError(e.to_string()))?;

        if !response.status().is_success() {
            return Err(AuthError::ExchangeError(format!(
                "token endpoint returned {}",
                response.status()
            )));
        }

        let tokens: TokenResponse = response
            .json()
            .await
            .map_err(|e| AuthError::ExchangeError(e.to_string()))?;

        Ok(tokens.access_token)
    }

    /// Verify a provider access token against the cached JWKS keys and
    /// extract the external account it describes.
    pub async fn verify_access_token(&self, token: &str) -> Result<ExternalAccount, AuthError> {
        // Decode header to get kid
        let header = decode_header(token).map_err(|e| AuthError::InvalidToken(e.to_string()))?;

        let kid = header
            .kid
            .ok_or_else(|| AuthError::InvalidToken("Missing kid in token header".to_string()))?;

        // Get key for kid
        let keys = self.keys.read().await;
        let key = keys
            .get(&kid)
            .ok_or_else(|| AuthError::KeyNotFound(kid.clone()))?;

        // Validate token
        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_issuer(&[&self.issuer]);
        // Keycloak access tokens set aud to "account"; skip audience validation
        validation.validate_aud = false;

        let token_data = decode::<ProviderClaims>(token, key, &validation)
            .map_err(|e| AuthError::InvalidToken(e.to_string()))?;

        let claims = token_data.claims;
        Ok(ExternalAccount {
            provider: PROVIDER_KEYCLOAK,
            id: claims.sub,
            email: claims.email,
            name: claims.name.or(claims.preferred_username),
        })
    }
}
