//! Identity bridge: the three lifecycle hooks that keep the local user
//! table consistent with the identity provider's account set.
//!
//! Each hook is a plain function of the state it is given, so the
//! sequence can be tested without driving a real handshake:
//!
//! 1. [`IdentityBridge::sign_in`] - reconcile the provider account with a
//!    local row, deciding whether sign-in may proceed.
//! 2. [`IdentityBridge::stamp_token`] - stamp the local id onto the
//!    freshly issued session token.
//! 3. [`materialize_session`] - project the decoded token onto the
//!    session shape procedures see. No store access.

use std::sync::Arc;

use crate::auth::oidc::{ExternalAccount, PROVIDER_KEYCLOAK};
use crate::auth::session::{Session, SessionToken, SessionUser};
use crate::store::{NewUser, StoreError, UserStore};

pub struct IdentityBridge {
    store: Arc<UserStore>,
}

#[derive(Debug, thiserror::Error)]
enum ReconcileError {
    #[error("{0}")]
    Store(#[from] StoreError),
    #[error("provider payload has no email")]
    MissingEmail,
}

impl IdentityBridge {
    pub fn new(store: Arc<UserStore>) -> Self {
        Self { store }
    }

    /// Sign-in hook. Looks up the user by external id and inserts a new
    /// row on first sign-in. Store failures are logged and converted
    /// into a denial rather than surfaced to the browser. Accounts from
    /// unrecognized providers pass through without reconciliation.
    pub fn sign_in(&self, account: &ExternalAccount) -> bool {
        if account.provider != PROVIDER_KEYCLOAK {
            return true;
        }

        match self.reconcile(account) {
            Ok(()) => true,
            Err(e) => {
                tracing::error!("Sign-in reconciliation failed for {}: {}", account.id, e);
                false
            }
        }
    }

    fn reconcile(&self, account: &ExternalAccount) -> Result<(), ReconcileError> {
        if self.store.find_by_external_id(&account.id)?.is_some() {
            return Ok(());
        }

        let email = account.email.clone().ok_or(ReconcileError::MissingEmail)?;
        self.store.insert(&NewUser {
            external_id: account.id.clone(),
            email,
            display_name: account.name.clone(),
        })?;
        Ok(())
    }

    /// Token hook, run only on the initial handshake. Stamps the local
    /// id onto the token if a row exists; a token for a row that went
    /// missing (e.g. the reconciliation race) is issued unstamped.
    /// Store errors are not caught here and abort the handshake.
    pub fn stamp_token(
        &self,
        token: &mut SessionToken,
        account: &ExternalAccount,
    ) -> Result<(), StoreError> {
        if account.provider != PROVIDER_KEYCLOAK {
            return Ok(());
        }

        if let Some(user) = self.store.find_by_external_id(&account.id)? {
            token.local_user_id = Some(user.id);
        }
        Ok(())
    }
}

/// Session hook: copy the token's identity fields onto the externally
/// visible session object.
pub fn materialize_session(token: &SessionToken) -> Session {
    Session {
        user: SessionUser {
            email: token.email.clone(),
            name: token.name.clone(),
            local_user_id: token.local_user_id,
        },
    }
}
