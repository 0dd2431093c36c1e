//! Seams between the cycle and the outside world

use async_trait::async_trait;
use chrono::{DateTime, Utc};
#[cfg(test)]
use mockall::automock;

use crate::domain::{AlertMessage, Order};
use crate::error::Result;

/// Upstream order API
#[cfg_attr(test, automock)]
#[async_trait]
pub trait OrderSource: Send + Sync {
    /// Open, unfulfilled orders created at or before `cutoff`.
    ///
    /// Orders with a non-empty fulfillment status are dropped even if the
    /// upstream filter let them through.
    async fn fetch_unfulfilled_orders(&self, cutoff: DateTime<Utc>) -> Result<Vec<Order>>;
}

/// Delivery target for rendered alerts
#[cfg_attr(test, automock)]
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    fn name(&self) -> &'static str;

    async fn deliver(&self, message: &AlertMessage) -> Result<()>;
}
