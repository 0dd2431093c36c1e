//! Google Cloud Storage JSON API adapter

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, StatusCode};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use super::gcp_token::TokenSource;
use crate::error::{Result, WatchError};
use crate::persistence::BlobStore;

const DEFAULT_STORAGE_BASE: &str = "https://storage.googleapis.com";

#[derive(Clone)]
pub struct GcsBlobStore {
    http: Client,
    base_url: String,
    bucket: String,
    tokens: Arc<dyn TokenSource>,
}

impl GcsBlobStore {
    pub fn new(
        base_url: Option<&str>,
        bucket: &str,
        tokens: Arc<dyn TokenSource>,
        timeout: Duration,
    ) -> Result<Self> {
        let base_url = base_url
            .unwrap_or(DEFAULT_STORAGE_BASE)
            .trim_end_matches('/')
            .to_string();

        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| WatchError::Internal(format!("failed to build GCS HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url,
            bucket: bucket.to_string(),
            tokens,
        })
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    fn object_url(&self, name: &str) -> String {
        format!(
            "{}/storage/v1/b/{}/o/{}",
            self.base_url,
            urlencoding::encode(&self.bucket),
            urlencoding::encode(name)
        )
    }

    fn upload_url(&self) -> String {
        format!(
            "{}/upload/storage/v1/b/{}/o",
            self.base_url,
            urlencoding::encode(&self.bucket)
        )
    }

    async fn failure(&self, resp: reqwest::Response, action: &str, name: &str) -> WatchError {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        WatchError::Storage(format!(
            "{} gs://{}/{}: HTTP {}: {}",
            action, self.bucket, name, status, body
        ))
    }
}

#[async_trait]
impl BlobStore for GcsBlobStore {
    async fn exists(&self, name: &str) -> Result<bool> {
        let token = self.tokens.bearer_token().await?;
        let resp = self
            .http
            .get(self.object_url(name))
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| WatchError::Storage(e.to_string()))?;

        match resp.status() {
            StatusCode::NOT_FOUND => Ok(false),
            s if s.is_success() => Ok(true),
            _ => Err(self.failure(resp, "stat", name).await),
        }
    }

    async fn download(&self, name: &str) -> Result<Vec<u8>> {
        let token = self.tokens.bearer_token().await?;
        let resp = self
            .http
            .get(self.object_url(name))
            .query(&[("alt", "media")])
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| WatchError::Storage(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(self.failure(resp, "download", name).await);
        }

        let bytes = resp
            .bytes()
            .await
            .map_err(|e| WatchError::Storage(format!("reading {}: {}", name, e)))?;
        debug!("Downloaded {} bytes from gs://{}/{}", bytes.len(), self.bucket, name);
        Ok(bytes.to_vec())
    }

    async fn upload(&self, name: &str, data: Vec<u8>, content_type: &str) -> Result<()> {
        let token = self.tokens.bearer_token().await?;
        let len = data.len();
        let resp = self
            .http
            .post(self.upload_url())
            .query(&[("uploadType", "media"), ("name", name)])
            .bearer_auth(token)
            .header(CONTENT_TYPE, content_type)
            .body(data)
            .send()
            .await
            .map_err(|e| WatchError::Storage(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(self.failure(resp, "upload", name).await);
        }
        debug!("Uploaded {} bytes to gs://{}/{}", len, self.bucket, name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::gcp_token::StaticToken;
    use mockito::Matcher;

    fn store(base_url: &str) -> GcsBlobStore {
        GcsBlobStore::new(
            Some(base_url),
            "acme-order-alerts",
            Arc::new(StaticToken("ya29.test".to_string())),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_exists_maps_404_to_false() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/storage/v1/b/acme-order-alerts/o/alerts.json")
            .with_status(404)
            .create_async()
            .await;

        assert!(!store(&server.url()).exists("alerts.json").await.unwrap());
    }

    #[tokio::test]
    async fn test_download_uses_media_alt() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/storage/v1/b/acme-order-alerts/o/alerts.json")
            .match_query(Matcher::UrlEncoded("alt".into(), "media".into()))
            .match_header("authorization", "Bearer ya29.test")
            .with_status(200)
            .with_body(r#"["1001","1002"]"#)
            .create_async()
            .await;

        let data = store(&server.url()).download("alerts.json").await.unwrap();
        assert_eq!(data, br#"["1001","1002"]"#.to_vec());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_upload_overwrites_named_object() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/upload/storage/v1/b/acme-order-alerts/o")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("uploadType".into(), "media".into()),
                Matcher::UrlEncoded("name".into(), "alerts.json".into()),
            ]))
            .match_header("content-type", "application/json")
            .match_body(r#"["1001"]"#)
            .with_status(200)
            .with_body(r#"{"name": "alerts.json", "generation": "2"}"#)
            .create_async()
            .await;

        store(&server.url())
            .upload("alerts.json", br#"["1001"]"#.to_vec(), "application/json")
            .await
            .unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_forbidden_is_storage_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/upload/storage/v1/b/acme-order-alerts/o")
            .match_query(Matcher::Any)
            .with_status(403)
            .with_body("caller does not have storage.objects.create access")
            .create_async()
            .await;

        let err = store(&server.url())
            .upload("alerts.json", b"[]".to_vec(), "application/json")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("403"));
    }
}
