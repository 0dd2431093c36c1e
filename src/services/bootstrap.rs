//! Cycle bootstrap: wires a [`CycleRunner`] from config
//!
//! This is the INIT stage. Secrets are resolved here, once, and handed to
//! the adapters that need them. Any failure here is fatal for the
//! invocation; nothing else has run yet.

use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

use super::cycle::{CycleReport, CycleRunner, CycleStage};
use super::notifier::{LogChannel, Notifier};
use crate::adapters::gcp_token::{AdcTokenSource, TokenSource};
use crate::adapters::{GcsBlobStore, SecretManagerClient, SendGridMailer, ShopifyClient};
use crate::config::{AppConfig, ChannelKind, SecretBackend};
use crate::error::{Result, WatchError};
use crate::persistence::LedgerStore;
use crate::secrets::{EnvSecretProvider, SecretProvider, Secrets};
use crate::traits::NotificationChannel;

/// Per-invocation switches that are not part of the deployed config
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Log alerts instead of emailing them and never write the ledger
    pub dry_run: bool,
}

/// Build a runner using the real credential sources named in `config`
pub async fn init(config: &AppConfig, options: RunOptions) -> Result<CycleRunner> {
    let needs_gcp = config.secrets.provider == SecretBackend::Gcp || config.ledger.enabled;
    let tokens: Option<Arc<dyn TokenSource>> = if needs_gcp {
        Some(Arc::new(AdcTokenSource::discover().await?))
    } else {
        None
    };

    let timeout = Duration::from_secs(config.shopify.request_timeout_secs);
    let provider: Box<dyn SecretProvider> = match config.secrets.provider {
        SecretBackend::Gcp => {
            let project_id = config.secrets.project_id.as_deref().ok_or_else(|| {
                WatchError::InvalidConfig("secrets.project_id is required".to_string())
            })?;
            let tokens = tokens.clone().ok_or_else(|| {
                WatchError::Internal("GCP token source not initialized".to_string())
            })?;
            Box::new(SecretManagerClient::new(
                config.secrets.base_url.as_deref(),
                project_id,
                tokens,
                timeout,
            )?)
        }
        SecretBackend::Env => Box::new(EnvSecretProvider),
    };

    init_with(config, options, provider.as_ref(), tokens).await
}

/// Build a runner from explicit credential sources
pub async fn init_with(
    config: &AppConfig,
    options: RunOptions,
    provider: &dyn SecretProvider,
    tokens: Option<Arc<dyn TokenSource>>,
) -> Result<CycleRunner> {
    config.validate()?;

    let channel_kind = if options.dry_run {
        ChannelKind::Log
    } else {
        config.notify.channel
    };
    let timeout = Duration::from_secs(config.shopify.request_timeout_secs);

    let needs_email_key = channel_kind == ChannelKind::Email;
    let secrets = Secrets::resolve(provider, &config.secrets, needs_email_key).await?;
    info!("Resolved credentials: {:?}", secrets);

    let source = ShopifyClient::new(
        &secrets.shopify_store_name,
        &secrets.shopify_access_token,
        &config.shopify.api_version,
        config.shopify.base_url.as_deref(),
        timeout,
    )?;
    info!("Order source: {}", source.orders_url());

    let ledger = if config.ledger.enabled {
        let bucket = config.ledger.bucket_name.as_deref().ok_or_else(|| {
            WatchError::InvalidConfig("ledger.bucket_name is required".to_string())
        })?;
        let tokens = tokens.ok_or_else(|| {
            WatchError::Internal("GCP token source not initialized".to_string())
        })?;
        let store = GcsBlobStore::new(config.ledger.base_url.as_deref(), bucket, tokens, timeout)?;
        let bucket = store.bucket().to_string();
        let ledger = LedgerStore::new(Arc::new(store), &config.ledger.object_name);
        info!("Alert ledger: gs://{}/{}", bucket, ledger.object_name());
        Some(ledger)
    } else {
        info!("Alert ledger disabled, every breaching order is notified each cycle");
        None
    };

    let channel: Arc<dyn NotificationChannel> = match channel_kind {
        ChannelKind::Log => Arc::new(LogChannel),
        ChannelKind::Email => {
            let api_key = secrets.email_api_key.clone().ok_or_else(|| {
                WatchError::secret_unavailable(&config.secrets.email_api_key_name, "not resolved")
            })?;
            let sender = config.notify.sender_email.as_deref().unwrap_or_default();
            Arc::new(SendGridMailer::new(
                config.notify.base_url.as_deref(),
                api_key,
                sender,
                config.notify.recipients(),
                timeout,
            )?)
        }
    };

    let notifier = Notifier::new(
        channel,
        config.notify.mode,
        config.check.fulfillment_day_threshold,
    );
    info!(
        "Notifications via {} ({:?}), threshold {} days",
        notifier.channel_name(),
        config.notify.mode,
        config.check.fulfillment_day_threshold
    );

    let runner = CycleRunner::new(
        Arc::new(source),
        ledger,
        notifier,
        config.check.threshold(),
    );
    Ok(if options.dry_run {
        runner.without_persist()
    } else {
        runner
    })
}

/// INIT then one cycle. `Err` only when INIT failed.
pub async fn run_once(config: &AppConfig, options: RunOptions) -> Result<CycleReport> {
    let runner = match init(config, options).await {
        Ok(runner) => runner,
        Err(e) => {
            error!("{} failed, cycle {}: {}", CycleStage::Init, CycleStage::Failed, e);
            return Err(e);
        }
    };
    Ok(runner.run().await)
}
