use shared::{SessionIdentity, UserType};
use std::sync::Arc;

use super::SessionManager;
use crate::auth::TokenStore;
use crate::channel::ConnectionHandle;
use crate::error::{SessionError, SessionResult};
use crate::profile::ProfileService;

/// Login / app-start / logout flow around a [`SessionManager`].
///
/// `stored token -> GET /profile -> identity -> initialize`
#[derive(Clone)]
pub struct SessionBootstrap {
    manager: SessionManager,
    tokens: Arc<dyn TokenStore>,
    profiles: Arc<dyn ProfileService>,
}

impl SessionBootstrap {
    pub fn new(
        manager: SessionManager,
        tokens: Arc<dyn TokenStore>,
        profiles: Arc<dyn ProfileService>,
    ) -> Self {
        Self {
            manager,
            tokens,
            profiles,
        }
    }

    pub fn manager(&self) -> &SessionManager {
        &self.manager
    }

    /// Resume the session from the stored token (app start).
    ///
    /// No token: `MissingToken`, nothing is started. A failed profile
    /// lookup clears the token so the next launch goes through login.
    pub async fn resume(&self, user_type: UserType) -> SessionResult<ConnectionHandle> {
        let token = self.tokens.get_token().ok_or_else(|| {
            tracing::info!(%user_type, "No stored token, login required");
            SessionError::MissingToken
        })?;

        let profile = match self.profiles.fetch_profile(&token).await {
            Ok(profile) => profile,
            Err(e) => {
                tracing::warn!(%user_type, error = %e, "Profile lookup failed, clearing stored token");
                if let Err(clear_err) = self.tokens.clear_token() {
                    tracing::error!(error = %clear_err, "Failed to clear stored token");
                }
                return Err(SessionError::Profile(e));
            }
        };

        self.manager
            .initialize(SessionIdentity::new(user_type, profile.id))
    }

    /// Persist a freshly issued token, then resume
    pub async fn login(&self, token: &str, user_type: UserType) -> SessionResult<ConnectionHandle> {
        self.tokens.set_token(token)?;
        self.resume(user_type).await
    }

    /// Tear the channel down, then forget the token
    pub fn logout(&self) -> SessionResult<()> {
        self.manager.teardown();
        self.tokens.clear_token()?;
        tracing::info!("Logged out");
        Ok(())
    }
}

impl std::fmt::Debug for SessionBootstrap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionBootstrap")
            .field("manager", &self.manager)
            .finish_non_exhaustive()
    }
}
