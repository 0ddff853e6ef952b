//! SMTP email channel using Lettre.

use lettre::message::header::ContentType;
use lettre::message::{Attachment as MailAttachment, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};

use crate::channels::{EmailChannel, EmailMessage};
use crate::error::ChannelError;

/// Sends transactional email over an authenticated SMTP relay.
///
/// A fresh transport is built per message; the blocking send runs on the tokio
/// blocking pool.
#[derive(Clone)]
pub struct SmtpMailer {
    smtp_server: String,
    smtp_port: u16,
    credentials: Credentials,
}

impl SmtpMailer {
    pub fn new(smtp_server: String, smtp_port: u16, username: String, password: String) -> Self {
        Self {
            smtp_server,
            smtp_port,
            credentials: Credentials::new(username, password),
        }
    }

    fn build_transport(&self) -> Result<SmtpTransport, ChannelError> {
        Ok(SmtpTransport::relay(&self.smtp_server)
            .map_err(|e| ChannelError::Delivery(format!("SMTP relay error: {e}")))?
            .port(self.smtp_port)
            .credentials(self.credentials.clone())
            .build())
    }

    fn build_message(message: &EmailMessage) -> Result<Message, ChannelError> {
        let builder = Message::builder()
            .from(
                message
                    .from
                    .parse()
                    .map_err(|e| ChannelError::InvalidAddress(format!("{}: {e}", message.from)))?,
            )
            .to(message
                .to
                .parse()
                .map_err(|e| ChannelError::InvalidAddress(format!("{}: {e}", message.to)))?)
            .subject(message.subject.clone());

        let built = if message.attachments.is_empty() {
            builder
                .header(ContentType::TEXT_HTML)
                .body(message.html_body.clone())
        } else {
            let mut parts = MultiPart::mixed().singlepart(SinglePart::html(message.html_body.clone()));
            for attachment in &message.attachments {
                let content_type = ContentType::parse(&attachment.content_type).map_err(|e| {
                    ChannelError::Delivery(format!("bad attachment type {}: {e}", attachment.content_type))
                })?;
                parts = parts.singlepart(
                    MailAttachment::new(attachment.filename.clone())
                        .body(attachment.content.clone(), content_type),
                );
            }
            builder.multipart(parts)
        };

        built.map_err(|e| ChannelError::Delivery(format!("Failed to build email: {e}")))
    }
}

impl EmailChannel for SmtpMailer {
    async fn send(&self, message: &EmailMessage) -> Result<(), ChannelError> {
        let email = Self::build_message(message)?;
        let mailer = self.build_transport()?;

        tokio::task::spawn_blocking(move || {
            mailer
                .send(&email)
                .map(|_| ())
                .map_err(|e| ChannelError::Delivery(format!("Failed to send email: {e}")))
        })
        .await
        .map_err(|e| ChannelError::Delivery(format!("Email task failed: {e}")))?
    }
}
