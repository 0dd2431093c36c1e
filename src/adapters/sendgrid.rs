//! SendGrid v3 mail adapter
//!
//! Sends plain-text alert emails to one or more recipients.

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, error, info};
use zeroize::Zeroizing;

use crate::domain::AlertMessage;
use crate::error::{Result, WatchError};
use crate::traits::NotificationChannel;

const DEFAULT_SENDGRID_BASE: &str = "https://api.sendgrid.com";

#[derive(Serialize)]
struct MailSend<'a> {
    personalizations: Vec<Personalization<'a>>,
    from: Address<'a>,
    subject: &'a str,
    content: Vec<Content<'a>>,
}

#[derive(Serialize)]
struct Personalization<'a> {
    to: Vec<Address<'a>>,
}

#[derive(Serialize)]
struct Address<'a> {
    email: &'a str,
}

#[derive(Serialize)]
struct Content<'a> {
    #[serde(rename = "type")]
    content_type: &'a str,
    value: &'a str,
}

/// Email notification channel backed by SendGrid
#[derive(Clone)]
pub struct SendGridMailer {
    http: Client,
    base_url: String,
    api_key: Zeroizing<String>,
    sender: String,
    recipients: Vec<String>,
}

impl SendGridMailer {
    pub fn new(
        base_url: Option<&str>,
        api_key: Zeroizing<String>,
        sender: &str,
        recipients: Vec<String>,
        timeout: Duration,
    ) -> Result<Self> {
        if recipients.is_empty() {
            return Err(WatchError::InvalidConfig(
                "at least one alert recipient is required".to_string(),
            ));
        }

        let base_url = base_url
            .unwrap_or(DEFAULT_SENDGRID_BASE)
            .trim_end_matches('/')
            .to_string();

        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                WatchError::Internal(format!("failed to build SendGrid HTTP client: {}", e))
            })?;

        Ok(Self {
            http,
            base_url,
            api_key,
            sender: sender.trim().to_string(),
            recipients,
        })
    }

    fn payload<'a>(&'a self, message: &'a AlertMessage) -> MailSend<'a> {
        MailSend {
            personalizations: vec![Personalization {
                to: self
                    .recipients
                    .iter()
                    .map(|email| Address { email: email.as_str() })
                    .collect(),
            }],
            from: Address {
                email: &self.sender,
            },
            subject: &message.subject,
            content: vec![Content {
                content_type: "text/plain",
                value: &message.body,
            }],
        }
    }
}

#[async_trait]
impl NotificationChannel for SendGridMailer {
    fn name(&self) -> &'static str {
        "email"
    }

    async fn deliver(&self, message: &AlertMessage) -> Result<()> {
        let url = format!("{}/v3/mail/send", self.base_url);
        debug!(
            "Sending '{}' to {} recipient(s)",
            message.subject,
            self.recipients.len()
        );

        let resp = self
            .http
            .post(&url)
            .bearer_auth(self.api_key.as_str())
            .json(&self.payload(message))
            .send()
            .await
            .map_err(|e| WatchError::NotificationDelivery(e.to_string()))?;

        let status = resp.status();
        if status.is_success() {
            info!("Email alert sent successfully: {}", message.subject);
            Ok(())
        } else {
            let body = resp.text().await.unwrap_or_default();
            error!("SendGrid rejected alert: {} - {}", status, body);
            Err(WatchError::NotificationDelivery(format!(
                "HTTP {}: {}",
                status, body
            )))
        }
    }
}
