// Account notifications
// The auth core only composes messages; delivery belongs to a transport behind
// `AccountNotifier`. Sends are fire-and-forget: failures are logged, never returned.

use async_trait::async_trait;
use std::sync::Arc;

/// Errors raised by a notification transport
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("Notification transport failed: {0}")]
    Transport(String),
}

/// A composed account e-mail
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountEmail {
    pub to: String,
    pub from: String,
    pub subject: String,
    pub text: String,
}

impl AccountEmail {
    pub fn welcome(from: &str, email: &str, name: &str) -> Self {
        Self {
            to: email.to_string(),
            from: from.to_string(),
            subject: "Welcome to Notekeeper!".to_string(),
            text: format!(
                "Hello {}! Thanks for signing up. Let us know how the sign-up process went for you.",
                name
            ),
        }
    }

    pub fn cancellation(from: &str, email: &str, name: &str) -> Self {
        Self {
            to: email.to_string(),
            from: from.to_string(),
            subject: "Your account has been cancelled".to_string(),
            text: format!(
                "Hello {}. Your account has been cancelled. Tell us if there is anything we could have done better. Thank you for using Notekeeper.",
                name
            ),
        }
    }
}

/// Transport for account e-mails
#[async_trait]
pub trait AccountNotifier: Send + Sync {
    async fn send(&self, email: AccountEmail) -> Result<(), NotifyError>;
}

/// Notifier that writes each message to the log instead of sending it
#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

#[async_trait]
impl AccountNotifier for LogNotifier {
    async fn send(&self, email: AccountEmail) -> Result<(), NotifyError> {
        tracing::info!(to = %email.to, subject = %email.subject, "Account e-mail queued");
        Ok(())
    }
}

/// Composes account e-mails and dispatches them in the background
#[derive(Clone)]
pub struct Notifications {
    notifier: Arc<dyn AccountNotifier>,
    from: String,
}

impl Notifications {
    pub fn new(notifier: Arc<dyn AccountNotifier>, from: impl Into<String>) -> Self {
        Self {
            notifier,
            from: from.into(),
        }
    }

    pub fn notify_welcome(&self, email: &str, name: &str) {
        self.dispatch(AccountEmail::welcome(&self.from, email, name));
    }

    pub fn notify_cancellation(&self, email: &str, name: &str) {
        self.dispatch(AccountEmail::cancellation(&self.from, email, name));
    }

    fn dispatch(&self, email: AccountEmail) {
        let notifier = Arc::clone(&self.notifier);
        tokio::spawn(async move {
            let subject = email.subject.clone();
            if let Err(e) = notifier.send(email).await {
                tracing::warn!("Failed to send \"{}\": {}", subject, e);
            }
        });
    }
}
