pub mod auth;
pub mod config;
pub mod gateway;
pub mod logging;
pub mod routes;
pub mod store;
pub mod test_util;

pub use auth::{IdentityBridge, OidcClient, SessionCodec};
pub use config::Config;
pub use store::UserStore;

use std::sync::Arc;

/// Shared application state, built once at startup.
pub struct AppState {
    pub config: Config,
    pub oidc_client: OidcClient,
    pub session_codec: SessionCodec,
    pub bridge: IdentityBridge,
    pub store: Arc<UserStore>,
}
