//! Shopify Admin REST order source
//!
//! Authenticates with the `X-Shopify-Access-Token` header. Credentials are
//! never embedded in the URL.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::domain::{Order, OrdersPage};
use crate::error::{Result, WatchError};
use crate::traits::OrderSource;

const ACCESS_TOKEN_HEADER: &str = "x-shopify-access-token";
/// Largest page the Admin REST API serves
const PAGE_LIMIT: u32 = 250;

#[derive(Clone)]
pub struct ShopifyClient {
    http: Client,
    orders_url: String,
}

impl ShopifyClient {
    /// `base_url` overrides `https://{store_name}.myshopify.com`
    pub fn new(
        store_name: &str,
        access_token: &str,
        api_version: &str,
        base_url: Option<&str>,
        timeout: Duration,
    ) -> Result<Self> {
        let base_url = base_url
            .map(|u| u.trim_end_matches('/').to_string())
            .unwrap_or_else(|| format!("https://{}.myshopify.com", store_name));
        let orders_url = format!("{}/admin/api/{}/orders.json", base_url, api_version);

        let mut token = HeaderValue::from_str(access_token).map_err(|_| {
            WatchError::InvalidConfig(
                "Shopify access token is not a valid header value".to_string(),
            )
        })?;
        token.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(HeaderName::from_static(ACCESS_TOKEN_HEADER), token);

        let http = Client::builder()
            .user_agent("orderwatch/0.1")
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| {
                WatchError::Internal(format!("failed to build Shopify HTTP client: {}", e))
            })?;

        Ok(Self { http, orders_url })
    }

    pub fn orders_url(&self) -> &str {
        &self.orders_url
    }
}

fn query_params(cutoff: DateTime<Utc>) -> Vec<(&'static str, String)> {
    vec![
        ("status", "open".to_string()),
        ("fulfillment_status", "unfulfilled".to_string()),
        (
            "created_at_max",
            cutoff.to_rfc3339_opts(SecondsFormat::Secs, false),
        ),
        ("limit", PAGE_LIMIT.to_string()),
    ]
}

/// Parse an `orders.json` body and drop anything already fulfilled
pub fn parse_orders(body: &str) -> Result<Vec<Order>> {
    let page: OrdersPage = serde_json::from_str(body)
        .map_err(|e| WatchError::UpstreamMalformed(format!("orders payload: {}", e)))?;

    let mut orders = Vec::with_capacity(page.orders.len());
    for record in page.orders {
        let order = match record.into_order() {
            Ok(order) => order,
            Err(reason) => {
                warn!("Skipping order record: {}", reason);
                continue;
            }
        };
        if !order.is_unfulfilled() {
            debug!(
                "Dropping order {} with fulfillment status {:?}",
                order.id, order.fulfillment_status
            );
            continue;
        }
        orders.push(order);
    }
    Ok(orders)
}

#[async_trait]
impl OrderSource for ShopifyClient {
    async fn fetch_unfulfilled_orders(&self, cutoff: DateTime<Utc>) -> Result<Vec<Order>> {
        info!("Requesting unfulfilled orders created before {}", cutoff);

        let resp = self
            .http
            .get(&self.orders_url)
            .query(&query_params(cutoff))
            .send()
            .await
            .map_err(|e| WatchError::UpstreamUnavailable(e.to_string()))?;

        let status = resp.status();
        info!("Received response: {}", status);
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(WatchError::UpstreamUnavailable(format!(
                "HTTP {}: {}",
                status, body
            )));
        }

        let body = resp
            .text()
            .await
            .map_err(|e| WatchError::UpstreamUnavailable(format!("reading body: {}", e)))?;

        parse_orders(&body)
    }
}
