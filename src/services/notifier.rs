//! Alert rendering and delivery
//!
//! Delivery is best-effort. Failures are reported to the caller, which logs
//! them; the ledger update for the affected orders is kept.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::NotificationMode;
use crate::domain::{AlertMessage, Order};
use crate::error::{Result, WatchError};
use crate::traits::NotificationChannel;

pub const BATCH_SUBJECT: &str = "Unfulfilled Order Alert";

/// Writes alerts to the log instead of sending them anywhere
#[derive(Debug, Default, Clone)]
pub struct LogChannel;

#[async_trait]
impl NotificationChannel for LogChannel {
    fn name(&self) -> &'static str {
        "log"
    }

    async fn deliver(&self, message: &AlertMessage) -> Result<()> {
        info!("Notification: {}\n{}", message.subject, message.body);
        Ok(())
    }
}

/// One message covering every order, in the given order
pub fn render_batch(orders: &[Order], threshold_days: u32) -> AlertMessage {
    let mut body = format!(
        "The following {} order(s) have been unfulfilled for over {} days:\n\n",
        orders.len(),
        threshold_days
    );
    for order in orders {
        body.push_str(&format!(
            "Order {} - created {}\n",
            order.id,
            order.created_at.format("%Y-%m-%d %H:%M %:z")
        ));
    }
    body.push_str("\nPlease take action.");
    AlertMessage::new(BATCH_SUBJECT, body)
}

pub fn render_single(order: &Order, threshold_days: u32) -> AlertMessage {
    AlertMessage::new(
        format!("{}: Order {}", BATCH_SUBJECT, order.id),
        format!(
            "Order {} has been unfulfilled for over {} days. Please take action.",
            order.id, threshold_days
        ),
    )
}

pub struct Notifier {
    channel: Arc<dyn NotificationChannel>,
    mode: NotificationMode,
    threshold_days: u32,
}

impl Notifier {
    pub fn new(
        channel: Arc<dyn NotificationChannel>,
        mode: NotificationMode,
        threshold_days: u32,
    ) -> Self {
        Self {
            channel,
            mode,
            threshold_days,
        }
    }

    pub fn channel_name(&self) -> &'static str {
        self.channel.name()
    }

    /// Send alerts for `selected`. Returns the number of messages delivered.
    ///
    /// Empty input never touches the channel. In per-order mode every order
    /// is attempted even if an earlier send failed.
    pub async fn notify(&self, selected: &[Order]) -> Result<usize> {
        if selected.is_empty() {
            return Ok(0);
        }

        info!(
            "Found {} unfulfilled orders that need notification",
            selected.len()
        );

        match self.mode {
            NotificationMode::Batch => {
                let message = render_batch(selected, self.threshold_days);
                self.channel.deliver(&message).await?;
                Ok(1)
            }
            NotificationMode::PerOrder => {
                let mut delivered = 0;
                let mut failed = Vec::new();
                for order in selected {
                    let message = render_single(order, self.threshold_days);
                    match self.channel.deliver(&message).await {
                        Ok(()) => delivered += 1,
                        Err(e) => {
                            warn!("Failed to send alert for order {}: {}", order.id, e);
                            failed.push(order.id.to_string());
                        }
                    }
                }
                if failed.is_empty() {
                    Ok(delivered)
                } else {
                    Err(WatchError::NotificationDelivery(format!(
                        "{} of {} alerts failed (orders {})",
                        failed.len(),
                        selected.len(),
                        failed.join(", ")
                    )))
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::MockNotificationChannel;
    use chrono::DateTime;

    fn order(id: &str, created: &str) -> Order {
        Order::new(id, DateTime::parse_from_rfc3339(created).unwrap(), None)
    }

    fn orders() -> Vec<Order> {
        vec![
            order("1001", "2024-03-01T09:30:00-05:00"),
            order("1004", "2024-03-02T16:05:00-05:00"),
        ]
    }

    #[tokio::test]
    async fn test_empty_selection_never_calls_channel() {
        let mut channel = MockNotificationChannel::new();
        channel.expect_deliver().times(0);

        let notifier = Notifier::new(Arc::new(channel), NotificationMode::Batch, 5);
        assert_eq!(notifier.notify(&[]).await.unwrap(), 0);

        let mut channel = MockNotificationChannel::new();
        channel.expect_deliver().times(0);
        let notifier = Notifier::new(Arc::new(channel), NotificationMode::PerOrder, 5);
        assert_eq!(notifier.notify(&[]).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_batch_sends_one_message() {
        let mut channel = MockNotificationChannel::new();
        channel
            .expect_deliver()
            .times(1)
            .withf(|m| {
                m.subject == BATCH_SUBJECT
                    && m.body.contains("Order 1001")
                    && m.body.contains("Order 1004")
            })
            .returning(|_| Ok(()));

        let notifier = Notifier::new(Arc::new(channel), NotificationMode::Batch, 5);
        assert_eq!(notifier.notify(&orders()).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_per_order_attempts_every_order() {
        let mut channel = MockNotificationChannel::new();
        channel
            .expect_deliver()
            .times(2)
            .returning(|m| {
                if m.subject.ends_with("1001") {
                    Err(WatchError::NotificationDelivery("HTTP 500".to_string()))
                } else {
                    Ok(())
                }
            });

        let notifier = Notifier::new(Arc::new(channel), NotificationMode::PerOrder, 7);
        let err = notifier.notify(&orders()).await.unwrap_err();

        assert!(err.to_string().contains("1 of 2 alerts failed"));
        assert!(err.to_string().contains("1001"));
    }

    #[tokio::test]
    async fn test_batch_failure_is_reported() {
        let mut channel = MockNotificationChannel::new();
        channel
            .expect_deliver()
            .times(1)
            .returning(|_| Err(WatchError::NotificationDelivery("timeout".to_string())));

        let notifier = Notifier::new(Arc::new(channel), NotificationMode::Batch, 5);
        assert!(notifier.notify(&orders()).await.is_err());
    }

    #[test]
    fn test_render_batch_lists_orders_in_sequence() {
        let message = render_batch(&orders(), 5);

        assert_eq!(message.subject, "Unfulfilled Order Alert");
        assert_eq!(
            message.body,
            "The following 2 order(s) have been unfulfilled for over 5 days:\n\n\
             Order 1001 - created 2024-03-01 09:30 -05:00\n\
             Order 1004 - created 2024-03-02 16:05 -05:00\n\
             \nPlease take action."
        );
    }

    #[test]
    fn test_render_single_matches_per_order_email() {
        let message = render_single(&orders()[0], 5);
        assert_eq!(message.subject, "Unfulfilled Order Alert: Order 1001");
        assert_eq!(
            message.body,
            "Order 1001 has been unfulfilled for over 5 days. Please take action."
        );
    }

    #[tokio::test]
    async fn test_log_channel_always_succeeds() {
        let notifier = Notifier::new(Arc::new(LogChannel), NotificationMode::Batch, 5);
        assert_eq!(notifier.notify(&orders()).await.unwrap(), 1);
        assert_eq!(notifier.channel_name(), "log");
    }
}
