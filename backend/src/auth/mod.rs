pub mod bridge;
pub mod oidc;
pub mod session;

pub use bridge::IdentityBridge;
pub use oidc::{AuthError, ExternalAccount, OidcClient};
pub use session::{Session, SessionCodec, SessionToken, SessionUser};
