//! OAuth2 bearer tokens for Google Cloud REST APIs

use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use crate::error::{Result, WatchError};

pub const CLOUD_PLATFORM_SCOPE: &str = "https://www.googleapis.com/auth/cloud-platform";

/// Supplies the bearer token attached to Google API requests
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn bearer_token(&self) -> Result<String>;
}

/// Application Default Credentials (service account, metadata server, gcloud)
pub struct AdcTokenSource {
    provider: Arc<dyn gcp_auth::TokenProvider>,
}

impl AdcTokenSource {
    pub async fn discover() -> Result<Self> {
        let provider = gcp_auth::provider().await.map_err(|e| {
            WatchError::InvalidConfig(format!("failed to initialize GCP authentication: {e}"))
        })?;
        Ok(Self { provider })
    }
}

#[async_trait]
impl TokenSource for AdcTokenSource {
    async fn bearer_token(&self) -> Result<String> {
        debug!("fetching GCP access token");
        let token = self
            .provider
            .token(&[CLOUD_PLATFORM_SCOPE])
            .await
            .map_err(|e| WatchError::Internal(format!("failed to get GCP access token: {e}")))?;
        Ok(token.as_str().to_string())
    }
}

/// Fixed token, for emulators and tests
#[derive(Debug, Clone)]
pub struct StaticToken(pub String);

#[async_trait]
impl TokenSource for StaticToken {
    async fn bearer_token(&self) -> Result<String> {
        Ok(self.0.clone())
    }
}
