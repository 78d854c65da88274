//! Outbound mail.

mod compose;
mod smtp;

#[cfg(test)]
pub mod scripted;

use async_trait::async_trait;
use thiserror::Error;

pub use compose::{attachment_content_type, CertificateMail};
pub use smtp::SmtpMailer;

#[derive(Debug, Error)]
pub enum MailError {
    #[error("Invalid address {address}: {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("Failed to build message: {0}")]
    Build(String),

    #[error("SMTP transport error: {0}")]
    Transport(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailAttachment {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMessage {
    pub to: String,
    pub subject: String,
    pub body: String,
    pub attachments: Vec<MailAttachment>,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: OutgoingMessage) -> Result<(), MailError>;
}
