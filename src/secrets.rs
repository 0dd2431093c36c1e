//! Credential resolution
//!
//! Secrets are resolved once during init into an explicit [`Secrets`] value
//! that is handed to the components that need it. Values are zeroized on
//! drop and never printed.

use async_trait::async_trait;
use std::collections::HashMap;
use tracing::info;
use zeroize::Zeroizing;

use crate::config::SecretsConfig;
use crate::error::{Result, WatchError};

/// Resolves a named secret to its current value
#[async_trait]
pub trait SecretProvider: Send + Sync {
    /// Latest value of `name`. Fails with `WatchError::SecretUnavailable`.
    async fn resolve(&self, name: &str) -> Result<String>;
}

/// Credentials needed for one invocation
pub struct Secrets {
    pub shopify_access_token: Zeroizing<String>,
    pub shopify_store_name: String,
    /// Only resolved when email delivery is configured
    pub email_api_key: Option<Zeroizing<String>>,
}

impl std::fmt::Debug for Secrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Secrets")
            .field("shopify_access_token", &redact(&self.shopify_access_token))
            .field("shopify_store_name", &self.shopify_store_name)
            .field(
                "email_api_key",
                &self.email_api_key.as_ref().map(|k| redact(k)),
            )
            .finish()
    }
}

/// Keep a short prefix so operators can tell keys apart in logs
pub fn redact(value: &str) -> String {
    let prefix: String = value.chars().take(4).collect();
    if value.chars().count() <= 8 {
        "****".to_string()
    } else {
        format!("{prefix}****")
    }
}

impl Secrets {
    /// Resolve every credential named in `config`. Any failure is fatal.
    pub async fn resolve(
        provider: &dyn SecretProvider,
        config: &SecretsConfig,
        needs_email_key: bool,
    ) -> Result<Self> {
        let shopify_access_token =
            Zeroizing::new(provider.resolve(&config.access_token_name).await?);
        info!("Accessed {} from secret store", config.access_token_name);

        let shopify_store_name = provider
            .resolve(&config.store_name_name)
            .await?
            .trim()
            .to_string();
        if shopify_store_name.is_empty() {
            return Err(WatchError::secret_unavailable(
                &config.store_name_name,
                "secret value is empty",
            ));
        }
        info!("Accessed {} from secret store", config.store_name_name);

        let email_api_key = if needs_email_key {
            let key = Zeroizing::new(provider.resolve(&config.email_api_key_name).await?);
            info!("Accessed {} from secret store", config.email_api_key_name);
            Some(key)
        } else {
            None
        };

        Ok(Self {
            shopify_access_token,
            shopify_store_name,
            email_api_key,
        })
    }
}

/// Reads secrets from process environment variables of the same name
#[derive(Debug, Default, Clone)]
pub struct EnvSecretProvider;

#[async_trait]
impl SecretProvider for EnvSecretProvider {
    async fn resolve(&self, name: &str) -> Result<String> {
        match std::env::var(name) {
            Ok(value) if !value.is_empty() => Ok(value),
            Ok(_) => Err(WatchError::secret_unavailable(name, "environment variable is empty")),
            Err(e) => Err(WatchError::secret_unavailable(name, e)),
        }
    }
}

/// Fixed in-memory secrets, for tests and local runs
#[derive(Debug, Default, Clone)]
pub struct StaticSecretProvider {
    values: HashMap<String, String>,
}

impl StaticSecretProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, value: &str) -> Self {
        self.values.insert(name.to_string(), value.to_string());
        self
    }
}

#[async_trait]
impl SecretProvider for StaticSecretProvider {
    async fn resolve(&self, name: &str) -> Result<String> {
        self.values
            .get(name)
            .cloned()
            .ok_or_else(|| WatchError::secret_unavailable(name, "no such secret"))
    }
}
