//! Borrower notifications
//!
//! A confirmation is sent to the borrower once a loan is recorded. Delivery
//! happens on a spawned task; failures are logged and never reach the caller.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use lettre::{
    message::{header::ContentType, Mailbox, Message},
    transport::smtp::authentication::Credentials,
    Address, SmtpTransport, Transport,
};
use tokio::task::JoinHandle;

use crate::{
    config::EmailConfig,
    error::{AppError, AppResult},
};

/// Loan confirmation for one borrower
#[derive(Debug, Clone, PartialEq)]
pub struct LoanNotification {
    pub recipient_name: String,
    pub recipient_email: String,
    pub book_title: String,
    pub loan_date: NaiveDate,
    pub due_date: NaiveDate,
}

impl LoanNotification {
    pub fn subject(&self) -> &'static str {
        "Book loan confirmed"
    }

    pub fn body(&self) -> String {
        format!(
            "Hello {name},\n\nYou borrowed \"{title}\" on {loan}.\nPlease return it by {due}.\n",
            name = self.recipient_name,
            title = self.book_title,
            loan = self.loan_date.format("%d/%m/%Y"),
            due = self.due_date.format("%d/%m/%Y"),
        )
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn loan_created(&self, notification: &LoanNotification) -> AppResult<()>;
}

/// Sends notifications over SMTP
pub struct EmailNotifier {
    config: EmailConfig,
}

impl EmailNotifier {
    pub fn new(config: EmailConfig) -> Self {
        Self { config }
    }

    fn build_message(&self, notification: &LoanNotification) -> AppResult<Message> {
        let from_name = self.config.smtp_from_name.as_deref().unwrap_or("Library");
        let from_address: Address = self
            .config
            .smtp_from
            .parse()
            .map_err(|e| AppError::Internal(format!("Invalid from address: {}", e)))?;
        let from_mailbox = Mailbox::new(Some(from_name.to_string()), from_address);

        // Display names come from signup and may hold commas or angle brackets
        let to_address: Address = notification
            .recipient_email
            .parse()
            .map_err(|e| AppError::Internal(format!("Invalid to address: {}", e)))?;
        let to_mailbox = Mailbox::new(Some(notification.recipient_name.clone()), to_address);

        Message::builder()
            .from(from_mailbox)
            .to(to_mailbox)
            .subject(notification.subject())
            .header(ContentType::TEXT_PLAIN)
            .body(notification.body())
            .map_err(|e| AppError::Internal(format!("Failed to build email: {}", e)))
    }

    fn transport(&self) -> AppResult<SmtpTransport> {
        let builder = if self.config.smtp_use_tls {
            SmtpTransport::starttls_relay(&self.config.smtp_host)
                .map_err(|e| AppError::Internal(format!("Failed to create SMTP transport: {}", e)))?
        } else {
            SmtpTransport::builder_dangerous(&self.config.smtp_host)
        }
        .port(self.config.smtp_port);

        let builder = match (&self.config.smtp_username, &self.config.smtp_password) {
            (Some(username), Some(password)) => {
                builder.credentials(Credentials::new(username.clone(), password.clone()))
            }
            _ => builder,
        };

        Ok(builder.build())
    }
}

#[async_trait]
impl Notifier for EmailNotifier {
    async fn loan_created(&self, notification: &LoanNotification) -> AppResult<()> {
        let message = self.build_message(notification)?;
        let mailer = self.transport()?;

        // lettre's SMTP transport blocks
        tokio::task::spawn_blocking(move || mailer.send(&message))
            .await
            .map_err(|e| AppError::Internal(format!("Email task failed: {}", e)))?
            .map_err(|e| AppError::Internal(format!("Failed to send email: {}", e)))?;

        Ok(())
    }
}

/// Logs notifications instead of sending them (email disabled)
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn loan_created(&self, notification: &LoanNotification) -> AppResult<()> {
        tracing::info!(
            to = %notification.recipient_email,
            book = %notification.book_title,
            due_date = %notification.due_date,
            "Loan notification (email disabled)"
        );
        Ok(())
    }
}

/// Pick the notifier matching the email configuration
pub fn from_config(config: &EmailConfig) -> Arc<dyn Notifier> {
    if config.enabled {
        Arc::new(EmailNotifier::new(config.clone()))
    } else {
        Arc::new(LogNotifier)
    }
}

/// Fire-and-forget delivery
#[derive(Clone)]
pub struct NotificationDispatcher {
    notifier: Arc<dyn Notifier>,
}

impl NotificationDispatcher {
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self { notifier }
    }

    /// Deliver on a background task. The handle is only awaited by tests.
    pub fn dispatch(&self, notification: LoanNotification) -> JoinHandle<()> {
        let notifier = self.notifier.clone();
        tokio::spawn(async move {
            if let Err(e) = notifier.loan_created(&notification).await {
                tracing::warn!(
                    to = %notification.recipient_email,
                    error = %e,
                    "Failed to send loan notification"
                );
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn notification() -> LoanNotification {
        LoanNotification {
            recipient_name: "User 1".to_string(),
            recipient_email: "u1@example.com".to_string(),
            book_title: "The Book".to_string(),
            loan_date: NaiveDate::from_ymd_opt(2022, 1, 1).unwrap(),
            due_date: NaiveDate::from_ymd_opt(2022, 1, 2).unwrap(),
        }
    }

    #[test]
    fn test_body_formats_dates() {
        let body = notification().body();
        assert!(body.contains("User 1"));
        assert!(body.contains("\"The Book\""));
        assert!(body.contains("01/01/2022"));
        assert!(body.contains("02/01/2022"));
    }

    #[test]
    fn test_email_message_builds() {
        let notifier = EmailNotifier::new(EmailConfig {
            smtp_from: "library@example.com".to_string(),
            ..EmailConfig::default()
        });
        assert!(notifier.build_message(&notification()).is_ok());
    }

    #[test]
    fn test_email_message_builds_for_punctuated_names() {
        let notifier = EmailNotifier::new(EmailConfig {
            smtp_from: "library@example.com".to_string(),
            ..EmailConfig::default()
        });

        for name in ["Doe, John", "A <b>", "O'Brien (Jr.)"] {
            let message = notifier
                .build_message(&LoanNotification {
                    recipient_name: name.to_string(),
                    recipient_email: "doe@example.com".to_string(),
                    ..notification()
                })
                .unwrap();
            let raw = String::from_utf8_lossy(&message.formatted()).to_string();
            assert!(raw.contains("<doe@example.com>"), "{}", name);
        }
    }

    #[test]
    fn test_email_message_rejects_bad_recipient() {
        let notifier = EmailNotifier::new(EmailConfig {
            smtp_from: "library@example.com".to_string(),
            ..EmailConfig::default()
        });
        let result = notifier.build_message(&LoanNotification {
            recipient_email: "not-an-address".to_string(),
            ..notification()
        });
        assert!(matches!(result, Err(AppError::Internal(_))));
    }

    #[tokio::test]
    async fn test_dispatch_swallows_failure() {
        let mut mock = MockNotifier::new();
        mock.expect_loan_created()
            .times(1)
            .returning(|_| Err(AppError::Internal("smtp down".to_string())));

        let dispatcher = NotificationDispatcher::new(Arc::new(mock));
        dispatcher.dispatch(notification()).await.unwrap();
    }

    #[tokio::test]
    async fn test_dispatch_passes_notification() {
        let mut mock = MockNotifier::new();
        let expected = notification();
        mock.expect_loan_created()
            .withf(move |n| *n == expected)
            .times(1)
            .returning(|_| Ok(()));

        let dispatcher = NotificationDispatcher::new(Arc::new(mock));
        dispatcher.dispatch(notification()).await.unwrap();
    }
}
