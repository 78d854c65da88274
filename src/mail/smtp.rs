use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use secrecy::ExposeSecret;
use tracing::debug;

use super::{MailError, Mailer, OutgoingMessage};
use crate::config::MailConfig;

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

fn mailbox(address: &str) -> Result<Mailbox, MailError> {
    address.parse().map_err(|e: lettre::address::AddressError| MailError::InvalidAddress {
        address: address.to_string(),
        reason: e.to_string(),
    })
}

impl SmtpMailer {
    pub fn new(config: &MailConfig) -> Result<Self, MailError> {
        let builder = match config.smtp_port {
            465 => AsyncSmtpTransport::<Tokio1Executor>::relay(&config.smtp_host),
            587 => AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host),
            // Plain relays (local catchers, internal MTAs)
            _ => Ok(AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.smtp_host)),
        }
        .map_err(|e| MailError::Transport(e.to_string()))?
        .port(config.smtp_port);

        let builder = match (&config.username, &config.password) {
            (Some(username), Some(password)) => builder.credentials(Credentials::new(
                username.clone(),
                password.expose_secret().to_string(),
            )),
            _ => builder,
        };

        Ok(Self {
            transport: builder.build(),
            from: mailbox(&config.from_address)?,
        })
    }

    fn build(&self, message: OutgoingMessage) -> Result<Message, MailError> {
        let mut parts = MultiPart::mixed().singlepart(SinglePart::plain(message.body));
        for attachment in message.attachments {
            let content_type = ContentType::parse(&attachment.content_type)
                .map_err(|e| MailError::Build(format!("{}: {e}", attachment.content_type)))?;
            parts = parts.singlepart(Attachment::new(attachment.file_name).body(attachment.bytes, content_type));
        }

        Message::builder()
            .from(self.from.clone())
            .to(mailbox(&message.to)?)
            .subject(message.subject)
            .multipart(parts)
            .map_err(|e| MailError::Build(e.to_string()))
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, message: OutgoingMessage) -> Result<(), MailError> {
        let to = message.to.clone();
        let email = self.build(message)?;
        let response = self
            .transport
            .send(email)
            .await
            .map_err(|e| MailError::Transport(e.to_string()))?;
        debug!(to = %to, code = %response.code(), "SMTP relay accepted message");
        Ok(())
    }
}
