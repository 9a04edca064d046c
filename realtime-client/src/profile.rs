//! Profile Service: resolves a stored token into the user's id

use async_trait::async_trait;
use shared::client::Profile;

use crate::{ClientConfig, ClientResult, HttpClient};

/// Looks up the profile that owns a bearer token
#[async_trait]
pub trait ProfileService: Send + Sync {
    async fn fetch_profile(&self, token: &str) -> ClientResult<Profile>;
}

/// [`ProfileService`] backed by `GET /profile`
#[derive(Debug, Clone)]
pub struct HttpProfileService {
    http: HttpClient,
}

impl HttpProfileService {
    pub fn new(http: HttpClient) -> Self {
        Self { http }
    }

    pub fn from_config(config: &ClientConfig) -> ClientResult<Self> {
        Ok(Self::new(HttpClient::new(config)?))
    }
}

#[async_trait]
impl ProfileService for HttpProfileService {
    async fn fetch_profile(&self, token: &str) -> ClientResult<Profile> {
        let profile = self.http.clone().with_token(token).profile().await?;
        tracing::debug!(user_id = %profile.id, "Profile resolved");
        Ok(profile)
    }
}
