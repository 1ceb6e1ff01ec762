//! Completion emails over SMTP.

use std::sync::Arc;

use async_trait::async_trait;
use domain::notification::{completion_body, completion_subject};
use domain::{LoggingDispatcher, NotificationDispatcher, NotificationError};
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use store::{OrderId, UserRecord};
use thiserror::Error;

/// SMTP relay settings.
#[derive(Clone, PartialEq, Eq)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    /// Sender address; the username when unset.
    pub from: String,
}

impl std::fmt::Debug for SmtpConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("from", &self.from)
            .finish_non_exhaustive()
    }
}

/// Errors setting up the mail transport.
#[derive(Debug, Error)]
pub enum MailerError {
    #[error("Invalid sender address {address}: {source}")]
    Sender {
        address: String,
        source: lettre::address::AddressError,
    },

    #[error("SMTP transport error: {0}")]
    Transport(#[from] lettre::transport::smtp::Error),
}

/// Dispatcher sending completion emails through a STARTTLS relay.
#[derive(Clone)]
pub struct SmtpDispatcher {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpDispatcher {
    /// Builds the transport. No connection is made until the first send.
    pub fn new(config: &SmtpConfig) -> Result<Self, MailerError> {
        let from = sender(&config.from)?;
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)?
            .port(config.port)
            .credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ))
            .build();
        Ok(Self { transport, from })
    }
}

fn sender(address: &str) -> Result<Mailbox, MailerError> {
    address.parse().map_err(|source| MailerError::Sender {
        address: address.to_string(),
        source,
    })
}

/// Builds the completion email for `recipient`.
pub fn completion_message(
    from: Mailbox,
    recipient: &UserRecord,
    order_id: OrderId,
) -> Result<Message, NotificationError> {
    let to: Mailbox = recipient.email.parse().map_err(|e| {
        NotificationError::Delivery(format!("invalid address {}: {e}", recipient.email))
    })?;

    Message::builder()
        .from(from)
        .to(to)
        .subject(completion_subject(order_id))
        .header(ContentType::TEXT_PLAIN)
        .body(completion_body(recipient, order_id))
        .map_err(|e| NotificationError::Delivery(e.to_string()))
}

#[async_trait]
impl NotificationDispatcher for SmtpDispatcher {
    async fn notify(
        &self,
        recipient: &UserRecord,
        order_id: OrderId,
    ) -> Result<(), NotificationError> {
        let message = completion_message(self.from.clone(), recipient, order_id)?;
        self.transport
            .send(message)
            .await
            .map_err(|e| NotificationError::Delivery(e.to_string()))?;

        tracing::info!(to = %recipient.email, %order_id, "Completion email sent");
        Ok(())
    }
}

/// Picks the SMTP dispatcher when configured, otherwise one that only logs.
pub fn create_dispatcher(
    smtp: Option<&SmtpConfig>,
) -> Result<Arc<dyn NotificationDispatcher>, MailerError> {
    match smtp {
        Some(config) => {
            tracing::info!(
                host = %config.host,
                port = config.port,
                "Sending completion emails over SMTP"
            );
            Ok(Arc::new(SmtpDispatcher::new(config)?))
        }
        None => {
            tracing::warn!("SMTP_HOST not set, completion emails are only logged");
            Ok(Arc::new(LoggingDispatcher))
        }
    }
}
