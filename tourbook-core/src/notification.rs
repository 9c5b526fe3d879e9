use async_trait::async_trait;
use tourbook_shared::Masked;

#[derive(Debug, Clone, PartialEq)]
pub struct EmailMessage {
    pub to: Masked<String>,
    pub subject: String,
    pub body: String,
}

#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("Mail relay unreachable: {0}")]
    Transport(String),
    #[error("Mail relay rejected message: {0}")]
    Rejected(String),
}

/// Outbound email delivery. Failures are reported, never retried here.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: &EmailMessage) -> Result<(), NotificationError>;
}
