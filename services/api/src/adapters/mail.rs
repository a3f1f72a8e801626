//! services/api/src/adapters/mail.rs
//!
//! Implementations of the `NotificationService` port: real delivery over SMTP,
//! and a log-only mailer for development setups without a mail server.

use async_trait::async_trait;
use codoc_core::ports::{Notification, NotificationService, PortError, PortResult};
use lettre::message::{header::ContentType, Mailbox, Message, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Tokio1Executor};
use tracing::info;

use crate::config::SmtpConfig;
use crate::error::ApiError;

//=========================================================================================
// SMTP
//=========================================================================================

/// Sends notifications as plain-text mail through an authenticated STARTTLS relay.
#[derive(Clone)]
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(config: &SmtpConfig) -> Result<Self, ApiError> {
        let from: Mailbox = config
            .from
            .parse()
            .map_err(|e| ApiError::Internal(format!("Invalid sender address '{}': {}", config.from, e)))?;
        let credentials = Credentials::new(config.username.clone(), config.password.clone());
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
            .map_err(|e| ApiError::Internal(format!("Invalid SMTP relay '{}': {}", config.host, e)))?
            .port(config.port)
            .credentials(credentials)
            .build();
        Ok(Self { transport, from })
    }
}

/// Builds the outgoing message for one notification.
fn build_message(from: &Mailbox, notification: &Notification) -> PortResult<Message> {
    let to: Mailbox = notification.to.parse().map_err(|e| {
        PortError::Unexpected(format!("Invalid recipient '{}': {}", notification.to, e))
    })?;
    Message::builder()
        .from(from.clone())
        .to(to)
        .subject(notification.subject.as_str())
        .singlepart(
            SinglePart::builder()
                .header(ContentType::TEXT_PLAIN)
                .body(notification.body.clone()),
        )
        .map_err(|e| PortError::Unexpected(format!("Failed to build email: {}", e)))
}

#[async_trait]
impl NotificationService for SmtpMailer {
    async fn send(&self, notification: Notification) -> PortResult<()> {
        let message = build_message(&self.from, &notification)?;
        self.transport
            .send(message)
            .await
            .map_err(|e| PortError::Unexpected(format!("Failed to send email: {}", e)))?;
        Ok(())
    }
}

//=========================================================================================
// Log-only
//=========================================================================================

/// Writes every notification to the log instead of sending it.
#[derive(Clone, Default)]
pub struct LogMailer;

#[async_trait]
impl NotificationService for LogMailer {
    async fn send(&self, notification: Notification) -> PortResult<()> {
        info!(
            to = %notification.to,
            subject = %notification.subject,
            "mail delivery disabled, logging message:\n{}",
            notification.body
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn notification(to: &str) -> Notification {
        Notification {
            to: to.to_string(),
            subject: "Welcome".to_string(),
            body: "Hello there".to_string(),
        }
    }

    #[test]
    fn messages_are_addressed_from_the_configured_sender() {
        let from: Mailbox = "CoDoc <no-reply@codoc.test>".parse().unwrap();
        let message = build_message(&from, &notification("bob@example.com")).unwrap();
        let raw = String::from_utf8(message.formatted()).unwrap();
        assert!(raw.contains("To: bob@example.com"));
        assert!(raw.contains("Subject: Welcome"));
        assert!(raw.contains("Hello there"));
    }

    #[test]
    fn malformed_recipients_are_rejected_before_sending() {
        let from: Mailbox = "no-reply@codoc.test".parse().unwrap();
        assert!(matches!(
            build_message(&from, &notification("not an address")),
            Err(PortError::Unexpected(_))
        ));
    }

    #[tokio::test]
    async fn the_log_mailer_always_succeeds() {
        assert!(LogMailer.send(notification("bob@example.com")).await.is_ok());
    }
}
