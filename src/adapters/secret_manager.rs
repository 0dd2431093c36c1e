//! GCP Secret Manager adapter
//!
//! Always reads the `latest` version; nothing is cached between calls.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64_STANDARD, Engine};
use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use super::gcp_token::TokenSource;
use crate::error::{Result, WatchError};
use crate::secrets::SecretProvider;

const DEFAULT_SECRET_MANAGER_BASE: &str = "https://secretmanager.googleapis.com";

#[derive(Deserialize)]
struct AccessSecretVersionResponse {
    payload: SecretPayload,
}

#[derive(Deserialize)]
struct SecretPayload {
    #[serde(default)]
    data: String,
}

#[derive(Clone)]
pub struct SecretManagerClient {
    http: Client,
    base_url: String,
    project_id: String,
    tokens: Arc<dyn TokenSource>,
}

impl SecretManagerClient {
    pub fn new(
        base_url: Option<&str>,
        project_id: &str,
        tokens: Arc<dyn TokenSource>,
        timeout: Duration,
    ) -> Result<Self> {
        let base_url = base_url
            .unwrap_or(DEFAULT_SECRET_MANAGER_BASE)
            .trim_end_matches('/')
            .to_string();

        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                WatchError::Internal(format!("failed to build Secret Manager HTTP client: {}", e))
            })?;

        Ok(Self {
            http,
            base_url,
            project_id: project_id.to_string(),
            tokens,
        })
    }

    fn version_path(&self, name: &str) -> String {
        format!(
            "projects/{}/secrets/{}/versions/latest",
            self.project_id, name
        )
    }
}

#[async_trait]
impl SecretProvider for SecretManagerClient {
    async fn resolve(&self, name: &str) -> Result<String> {
        let token = self
            .tokens
            .bearer_token()
            .await
            .map_err(|e| WatchError::secret_unavailable(name, e))?;

        let url = format!("{}/v1/{}:access", self.base_url, self.version_path(name));
        debug!("Accessing secret {}", self.version_path(name));

        let resp = self
            .http
            .get(&url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| WatchError::secret_unavailable(name, e))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(WatchError::secret_unavailable(
                name,
                format!("HTTP {}: {}", status, body),
            ));
        }

        let parsed: AccessSecretVersionResponse = resp
            .json()
            .await
            .map_err(|e| WatchError::secret_unavailable(name, format!("bad response: {}", e)))?;

        let bytes = BASE64_STANDARD
            .decode(parsed.payload.data.as_bytes())
            .map_err(|e| {
                WatchError::secret_unavailable(name, format!("bad payload encoding: {}", e))
            })?;

        String::from_utf8(bytes)
            .map_err(|_| WatchError::secret_unavailable(name, "payload is not valid UTF-8"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::gcp_token::StaticToken;
    use crate::error::ErrorKind;

    fn client(base_url: &str) -> SecretManagerClient {
        SecretManagerClient::new(
            Some(base_url),
            "acme-prod",
            Arc::new(StaticToken("ya29.test".to_string())),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_resolve_latest_version() {
        let mut server = mockito::Server::new_async().await;
        let payload = BASE64_STANDARD.encode("shpat_abc123");
        let mock = server
            .mock(
                "GET",
                "/v1/projects/acme-prod/secrets/SHOPIFY_ACCESS_TOKEN/versions/latest:access",
            )
            .match_header("authorization", "Bearer ya29.test")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(format!(
                r#"{{"name": "projects/123/secrets/SHOPIFY_ACCESS_TOKEN/versions/3", "payload": {{"data": "{}"}}}}"#,
                payload
            ))
            .create_async()
            .await;

        let value = client(&server.url())
            .resolve("SHOPIFY_ACCESS_TOKEN")
            .await
            .unwrap();

        assert_eq!(value, "shpat_abc123");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_permission_denied_is_secret_unavailable() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock(
                "GET",
                "/v1/projects/acme-prod/secrets/SENDGRID_API_KEY/versions/latest:access",
            )
            .with_status(403)
            .with_body(r#"{"error": {"code": 403, "status": "PERMISSION_DENIED"}}"#)
            .create_async()
            .await;

        let err = client(&server.url())
            .resolve("SENDGRID_API_KEY")
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::SecretUnavailable);
        assert!(err.to_string().contains("403"));
    }
}
