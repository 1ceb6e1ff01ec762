//! Completion notifications sent to customers.
//!
//! Delivery is best effort: the lifecycle engine logs and counts failures but
//! never propagates them.

use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use store::{OrderId, UserRecord};
use thiserror::Error;

/// Errors reported by a dispatcher.
#[derive(Debug, Error)]
pub enum NotificationError {
    /// The message could not be delivered.
    #[error("Notification delivery failed: {0}")]
    Delivery(String),
}

/// Trait for sending the "order completed" message.
#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
    /// Tells `recipient` that the order was completed.
    async fn notify(
        &self,
        recipient: &UserRecord,
        order_id: OrderId,
    ) -> Result<(), NotificationError>;
}

/// Renders the subject line of a completion message.
pub fn completion_subject(order_id: OrderId) -> String {
    format!("Order #{order_id} Completed")
}

/// Renders the body of a completion message.
pub fn completion_body(recipient: &UserRecord, order_id: OrderId) -> String {
    format!(
        "Dear {},\n\nYour order #{order_id} has been completed.\n\nBest regards,\nThe car wash team",
        recipient.first_name
    )
}

/// Dispatcher that writes the message to the log instead of sending it.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingDispatcher;

#[async_trait]
impl NotificationDispatcher for LoggingDispatcher {
    async fn notify(
        &self,
        recipient: &UserRecord,
        order_id: OrderId,
    ) -> Result<(), NotificationError> {
        tracing::info!(
            to = %recipient.email,
            %order_id,
            subject = %completion_subject(order_id),
            body = %completion_body(recipient, order_id),
            "Completion notification"
        );
        Ok(())
    }
}

/// A notification captured by [`InMemoryDispatcher`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentNotification {
    pub email: String,
    pub order_id: OrderId,
}

#[derive(Debug, Default)]
struct InMemoryDispatcherState {
    sent: Vec<SentNotification>,
    attempts: usize,
    fail_on_notify: bool,
}

/// In-memory dispatcher for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryDispatcher {
    state: Arc<Mutex<InMemoryDispatcherState>>,
}

impl InMemoryDispatcher {
    /// Creates a new in-memory dispatcher.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the dispatcher to fail every notify call.
    pub fn set_fail_on_notify(&self, fail: bool) {
        self.lock().fail_on_notify = fail;
    }

    /// Returns the delivered notifications in send order.
    pub fn sent(&self) -> Vec<SentNotification> {
        self.lock().sent.clone()
    }

    /// Returns the number of delivered notifications.
    pub fn sent_count(&self) -> usize {
        self.lock().sent.len()
    }

    /// Returns the number of notify calls, failed ones included.
    pub fn attempt_count(&self) -> usize {
        self.lock().attempts
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, InMemoryDispatcherState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl NotificationDispatcher for InMemoryDispatcher {
    async fn notify(
        &self,
        recipient: &UserRecord,
        order_id: OrderId,
    ) -> Result<(), NotificationError> {
        let mut state = self.lock();
        state.attempts += 1;

        if state.fail_on_notify {
            return Err(NotificationError::Delivery(format!(
                "mailbox {} unavailable",
                recipient.email
            )));
        }

        state.sent.push(SentNotification {
            email: recipient.email.clone(),
            order_id,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use store::{Role, UserId};

    fn customer() -> UserRecord {
        UserRecord {
            id: UserId::new(),
            email: "olga@example.com".to_string(),
            first_name: "Olga".to_string(),
            last_name: "Ivanova".to_string(),
            patronymic: String::new(),
            role: Role::Customer,
            notify_on_completion: true,
        }
    }

    #[tokio::test]
    async fn test_records_sent_notifications() {
        let dispatcher = InMemoryDispatcher::new();
        let order_id = OrderId::new();

        dispatcher.notify(&customer(), order_id).await.unwrap();

        assert_eq!(
            dispatcher.sent(),
            vec![SentNotification {
                email: "olga@example.com".to_string(),
                order_id,
            }]
        );
    }

    #[tokio::test]
    async fn test_fail_on_notify() {
        let dispatcher = InMemoryDispatcher::new();
        dispatcher.set_fail_on_notify(true);

        let result = dispatcher.notify(&customer(), OrderId::new()).await;
        assert!(result.is_err());
        assert_eq!(dispatcher.sent_count(), 0);
        assert_eq!(dispatcher.attempt_count(), 1);
    }

    #[tokio::test]
    async fn test_logging_dispatcher_always_succeeds() {
        assert!(
            LoggingDispatcher
                .notify(&customer(), OrderId::new())
                .await
                .is_ok()
        );
    }

    #[test]
    fn test_message_addresses_first_name() {
        let order_id = OrderId::new();
        let body = completion_body(&customer(), order_id);
        assert!(body.starts_with("Dear Olga,"));
        assert!(body.contains(&order_id.to_string()));
        assert_eq!(
            completion_subject(order_id),
            format!("Order #{order_id} Completed")
        );
    }
}
