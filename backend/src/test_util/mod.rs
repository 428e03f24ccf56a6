//! Shared helpers for unit and integration tests.

use std::sync::Arc;

use crate::auth::oidc::{ExternalAccount, PROVIDER_KEYCLOAK};
use crate::auth::session::{Session, SessionCodec, SessionUser};
use crate::config::{
    Config, CorsConfig, DatabaseConfig, LoggingConfig, OidcConfig, ServerConfig, SessionConfig,
};
use crate::gateway::RequestContext;
use crate::store::{NewUser, UserStore};
use portal_common::User;

pub const TEST_SESSION_SECRET: &str = "portal-test-secret";

pub fn test_config(issuer: &str) -> Config {
    Config {
        server: ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 8080,
        },
        oidc: OidcConfig {
            issuer: issuer.to_string(),
            client_id: "portal-web".to_string(),
            client_secret: "test-client-secret".to_string(),
        },
        session: SessionConfig {
            secret: TEST_SESSION_SECRET.to_string(),
            ttl_seconds: 3600,
        },
        database: DatabaseConfig {
            url: ":memory:".to_string(),
        },
        logging: LoggingConfig {
            level: "debug".to_string(),
        },
        cors: CorsConfig {
            origins: "*".to_string(),
        },
    }
}

pub fn test_store() -> Arc<UserStore> {
    Arc::new(UserStore::new(":memory:").unwrap())
}

pub fn test_codec() -> SessionCodec {
    SessionCodec::new(&SessionConfig {
        secret: TEST_SESSION_SECRET.to_string(),
        ttl_seconds: 3600,
    })
}

pub fn test_account(id: &str, email: Option<&str>, name: Option<&str>) -> ExternalAccount {
    ExternalAccount {
        provider: PROVIDER_KEYCLOAK,
        id: id.to_string(),
        email: email.map(String::from),
        name: name.map(String::from),
    }
}

pub fn session_for(local_user_id: Option<i64>) -> Session {
    Session {
        user: SessionUser {
            email: Some("a@x.com".to_string()),
            name: Some("A".to_string()),
            local_user_id,
        },
    }
}

/// Context over an empty in-memory store.
pub fn test_context(session: Option<Session>) -> RequestContext {
    RequestContext {
        session,
        store: test_store(),
    }
}

/// Context with one user row and a session bound to it.
pub fn seeded_context() -> (RequestContext, User) {
    let store = test_store();
    let user = store
        .insert(&NewUser {
            external_id: "kc-1".to_string(),
            email: "a@x.com".to_string(),
            display_name: Some("A".to_string()),
        })
        .unwrap();

    let ctx = RequestContext {
        session: Some(session_for(Some(user.id))),
        store,
    };
    (ctx, user)
}

/// Mint a signed session token the way the handshake would.
pub fn mint_session_token(codec: &SessionCodec, local_user_id: Option<i64>) -> String {
    let account = test_account("kc-1", Some("a@x.com"), Some("A"));
    let mut token = codec.issue(&account, "provider-access-token".to_string());
    token.local_user_id = local_user_id;
    codec.encode(&token).expect("Failed to encode session token")
}
