use config::{Config, ConfigBuilder, ConfigError, Environment, File, FileFormat, Map};
use serde::Deserialize;
use std::path::Path;

use crate::error::{Result, WatchError};

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub shopify: ShopifyConfig,
    pub secrets: SecretsConfig,
    pub ledger: LedgerConfig,
    pub notify: NotifyConfig,
    pub check: CheckConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ShopifyConfig {
    /// Admin REST API version segment (e.g., "2023-10")
    pub api_version: String,
    /// Overrides `https://{store}.myshopify.com` (tests, proxies)
    #[serde(default)]
    pub base_url: Option<String>,
    /// Per-request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_request_timeout() -> u64 {
    30
}

/// Where named credentials are resolved from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SecretBackend {
    /// GCP Secret Manager, latest version
    Gcp,
    /// Process environment variables of the same name
    Env,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SecretsConfig {
    pub provider: SecretBackend,
    /// GCP project that owns the secrets
    #[serde(default)]
    pub project_id: Option<String>,
    pub access_token_name: String,
    pub store_name_name: String,
    pub email_api_key_name: String,
    /// Overrides the Secret Manager endpoint
    #[serde(default)]
    pub base_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LedgerConfig {
    /// Disable to notify every breaching order on every cycle
    pub enabled: bool,
    #[serde(default)]
    pub bucket_name: Option<String>,
    pub object_name: String,
    /// Overrides the Cloud Storage endpoint
    #[serde(default)]
    pub base_url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelKind {
    Log,
    Email,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationMode {
    /// One message covering every selected order
    Batch,
    /// One message per selected order
    PerOrder,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NotifyConfig {
    pub channel: ChannelKind,
    pub mode: NotificationMode,
    #[serde(default)]
    pub sender_email: Option<String>,
    /// Single address or comma-separated list
    #[serde(default)]
    pub recipient_email: Option<String>,
    /// Overrides the SendGrid endpoint
    #[serde(default)]
    pub base_url: Option<String>,
}

impl NotifyConfig {
    /// Recipient list with whitespace trimmed and empty entries dropped
    pub fn recipients(&self) -> Vec<String> {
        self.recipient_email
            .as_deref()
            .map(split_addresses)
            .unwrap_or_default()
    }
}

pub fn split_addresses(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[derive(Debug, Clone, Deserialize)]
pub struct CheckConfig {
    /// Days an order may stay unfulfilled before it breaches
    pub fulfillment_day_threshold: u32,
}

impl CheckConfig {
    pub fn threshold(&self) -> chrono::Duration {
        chrono::Duration::days(i64::from(self.fulfillment_day_threshold))
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Enable JSON formatted logs
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
        }
    }
}

/// Ten years; anything longer is a misconfiguration
pub const MAX_THRESHOLD_DAYS: u32 = 3650;

fn default_port() -> u16 {
    8080
}

/// Plain environment variables read by the deployed function, mapped onto
/// config keys. `ORDERWATCH_*` variables take precedence over these.
const LEGACY_ENV_KEYS: &[(&str, &str)] = &[
    ("GCS_BUCKET_NAME", "LEDGER__BUCKET_NAME"),
    ("GCP_PROJECT", "SECRETS__PROJECT_ID"),
    ("GOOGLE_CLOUD_PROJECT", "SECRETS__PROJECT_ID"),
    ("ALERT_SENDER_EMAIL", "NOTIFY__SENDER_EMAIL"),
    ("ALERT_RECIPIENT_EMAIL", "NOTIFY__RECIPIENT_EMAIL"),
    ("FULFILLMENT_DAY_THRESHOLD", "CHECK__FULFILLMENT_DAY_THRESHOLD"),
];

fn legacy_env_map<F>(lookup: F) -> Map<String, String>
where
    F: Fn(&str) -> Option<String>,
{
    let mut map = Map::new();
    for (legacy, key) in LEGACY_ENV_KEYS {
        // First match wins, so GCP_PROJECT shadows GOOGLE_CLOUD_PROJECT
        if map.contains_key(*key) {
            continue;
        }
        if let Some(value) = lookup(legacy).filter(|v| !v.trim().is_empty()) {
            map.insert((*key).to_string(), value);
        }
    }
    map
}

impl AppConfig {
    /// Load configuration from a specific directory and the process environment
    pub fn load_from<P: AsRef<Path>>(config_dir: P) -> Result<Self> {
        Self::load_with_env(config_dir, std::env::vars().collect())
    }

    /// Load configuration using `env` in place of the process environment
    pub fn load_with_env<P: AsRef<Path>>(config_dir: P, env: Map<String, String>) -> Result<Self> {
        let config_dir = config_dir.as_ref();
        let profile = env
            .get("ORDERWATCH_ENV")
            .cloned()
            .unwrap_or_else(|| "development".to_string());

        let builder = Self::defaults()?
            // Load default config file
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            // Load environment-specific config (e.g., config/production.toml)
            .add_source(File::from(config_dir.join(profile)).required(false))
            // Deployed-function variables (GCS_BUCKET_NAME, ALERT_SENDER_EMAIL, ...)
            .add_source(
                Environment::default()
                    .separator("__")
                    .source(Some(legacy_env_map(|k| env.get(k).cloned())))
                    .try_parsing(true),
            )
            // Override with environment variables (ORDERWATCH_LEDGER__BUCKET_NAME, etc.)
            .add_source(
                Environment::with_prefix("ORDERWATCH")
                    .prefix_separator("_")
                    .separator("__")
                    .source(Some(env))
                    .try_parsing(true),
            );

        let config: Self = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML document layered over the built-in defaults
    pub fn from_toml_str(toml: &str) -> Result<Self> {
        let config: Self = Self::defaults()?
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    fn defaults() -> std::result::Result<ConfigBuilder<config::builder::DefaultState>, ConfigError>
    {
        Config::builder()
            .set_default("shopify.api_version", "2023-10")?
            .set_default("shopify.request_timeout_secs", 30)?
            .set_default("secrets.provider", "gcp")?
            .set_default("secrets.access_token_name", "SHOPIFY_ACCESS_TOKEN")?
            .set_default("secrets.store_name_name", "SHOPIFY_STORE_NAME")?
            .set_default("secrets.email_api_key_name", "SENDGRID_API_KEY")?
            .set_default("ledger.enabled", true)?
            .set_default("ledger.object_name", "alerts.json")?
            .set_default("notify.channel", "email")?
            .set_default("notify.mode", "batch")?
            .set_default("check.fulfillment_day_threshold", 5)?
            .set_default("logging.level", "info")?
            .set_default("logging.json", false)?
            .set_default("server.port", 8080)
    }

    /// Reject combinations that cannot run a cycle
    pub fn validate(&self) -> Result<()> {
        if !(1..=MAX_THRESHOLD_DAYS).contains(&self.check.fulfillment_day_threshold) {
            return Err(WatchError::InvalidConfig(format!(
                "check.fulfillment_day_threshold must be between 1 and {}",
                MAX_THRESHOLD_DAYS
            )));
        }

        if self.ledger.enabled && blank(&self.ledger.bucket_name) {
            return Err(WatchError::InvalidConfig(
                "ledger.bucket_name (or GCS_BUCKET_NAME) is required when the ledger is enabled"
                    .to_string(),
            ));
        }

        if self.secrets.provider == SecretBackend::Gcp && blank(&self.secrets.project_id) {
            return Err(WatchError::InvalidConfig(
                "secrets.project_id (or GCP_PROJECT) is required for the gcp secret provider"
                    .to_string(),
            ));
        }

        for (key, value) in [
            ("shopify.base_url", &self.shopify.base_url),
            ("secrets.base_url", &self.secrets.base_url),
            ("ledger.base_url", &self.ledger.base_url),
            ("notify.base_url", &self.notify.base_url),
        ] {
            if let Some(raw) = value {
                check_endpoint(key, raw)?;
            }
        }

        if self.notify.channel == ChannelKind::Email {
            if blank(&self.notify.sender_email) {
                return Err(WatchError::InvalidConfig(
                    "notify.sender_email (or ALERT_SENDER_EMAIL) is required for email alerts"
                        .to_string(),
                ));
            }
            if self.notify.recipients().is_empty() {
                return Err(WatchError::InvalidConfig(
                    "notify.recipient_email (or ALERT_RECIPIENT_EMAIL) is required for email alerts"
                        .to_string(),
                ));
            }
        }

        Ok(())
    }

    /// Log-only configuration that needs no cloud resources
    pub fn local(threshold_days: u32) -> Self {
        Self {
            shopify: ShopifyConfig {
                api_version: "2023-10".to_string(),
                base_url: None,
                request_timeout_secs: default_request_timeout(),
            },
            secrets: SecretsConfig {
                provider: SecretBackend::Env,
                project_id: None,
                access_token_name: "SHOPIFY_ACCESS_TOKEN".to_string(),
                store_name_name: "SHOPIFY_STORE_NAME".to_string(),
                email_api_key_name: "SENDGRID_API_KEY".to_string(),
                base_url: None,
            },
            ledger: LedgerConfig {
                enabled: false,
                bucket_name: None,
                object_name: "alerts.json".to_string(),
                base_url: None,
            },
            notify: NotifyConfig {
                channel: ChannelKind::Log,
                mode: NotificationMode::Batch,
                sender_email: None,
                recipient_email: None,
                base_url: None,
            },
            check: CheckConfig {
                fulfillment_day_threshold: threshold_days,
            },
            logging: LoggingConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

fn blank(value: &Option<String>) -> bool {
    value.as_deref().map(str::trim).unwrap_or_default().is_empty()
}

/// Endpoint overrides must be absolute http(s) URLs
fn check_endpoint(key: &str, raw: &str) -> Result<()> {
    let parsed = url::Url::parse(raw)
        .map_err(|e| WatchError::InvalidConfig(format!("{} is not a valid URL: {}", key, e)))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => Err(WatchError::InvalidConfig(format!(
            "{} must use http or https, got {}",
            key, other
        ))),
    }
}
