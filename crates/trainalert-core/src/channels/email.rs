//! SMTP e-mail channel

use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Tokio1Executor};
use std::fmt;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::{EmailConfig, SmtpSecurity};
use crate::models::Message;

use super::DeliveryError;

/// Sends messages over SMTP
#[derive(Clone)]
pub struct EmailChannel {
    from: Mailbox,
    to: Mailbox,
    username: String,
    password: String,
    server: String,
    port: u16,
    security: SmtpSecurity,
    timeout: Duration,
}

impl fmt::Debug for EmailChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmailChannel")
            .field("from", &self.from.to_string())
            .field("to", &self.to.to_string())
            .field("server", &self.server)
            .field("port", &self.port)
            .field("security", &self.security)
            .finish_non_exhaustive()
    }
}

impl EmailChannel {
    /// Returns `None` unless sender address, password and a server are known
    pub fn configure(config: &EmailConfig, timeout: Duration) -> Option<Self> {
        let address = config.address.as_deref()?.trim();
        let password = config.password.clone()?;
        if address.is_empty() || password.is_empty() {
            return None;
        }

        let Some((server, port)) = config.endpoint() else {
            warn!("Custom SMTP provider selected without smtp_server");
            return None;
        };

        let from: Mailbox = match address.parse() {
            Ok(mailbox) => mailbox,
            Err(e) => {
                warn!(error = %e, "Invalid sender address");
                return None;
            }
        };
        let to = match config.recipient.as_deref().map(str::parse::<Mailbox>) {
            None => from.clone(),
            Some(Ok(mailbox)) => mailbox,
            Some(Err(e)) => {
                warn!(error = %e, "Invalid recipient address");
                return None;
            }
        };

        Some(Self {
            from,
            to,
            username: address.to_string(),
            password,
            server,
            port,
            security: config.security,
            timeout,
        })
    }

    /// Send email notification
    pub async fn deliver(&self, message: &Message) -> Result<(), DeliveryError> {
        let email = self.build_email(message)?;
        let transport = self.transport()?;

        transport
            .send(email)
            .await
            .map_err(|e| DeliveryError::Smtp(e.to_string()))?;

        info!(subject = %message.subject, to = %self.to, "Email sent");
        Ok(())
    }

    fn transport(&self) -> Result<AsyncSmtpTransport<Tokio1Executor>, DeliveryError> {
        let builder = match self.security {
            SmtpSecurity::Starttls => AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.server)
                .map_err(|e| DeliveryError::Smtp(e.to_string()))?,
            SmtpSecurity::Tls => AsyncSmtpTransport::<Tokio1Executor>::relay(&self.server)
                .map_err(|e| DeliveryError::Smtp(e.to_string()))?,
            SmtpSecurity::None => AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(self.server.as_str()),
        };

        Ok(builder
            .port(self.port)
            .credentials(Credentials::new(self.username.clone(), self.password.clone()))
            .timeout(Some(self.timeout))
            .build())
    }

    fn build_email(&self, message: &Message) -> Result<lettre::Message, DeliveryError> {
        let body = match &message.html {
            Some(html) => MultiPart::alternative_plain_html(message.body.clone(), html.clone()),
            None => MultiPart::alternative().singlepart(SinglePart::plain(message.body.clone())),
        };

        let mut mixed = MultiPart::mixed().multipart(body);
        for attachment in &message.attachments {
            let content_type = ContentType::parse(&attachment.content_type)
                .map_err(|e| DeliveryError::Smtp(format!("{}: {e}", attachment.filename)))?;
            mixed = mixed.singlepart(
                Attachment::new(attachment.filename.clone()).body(attachment.data.clone(), content_type),
            );
        }

        lettre::Message::builder()
            .from(self.from.clone())
            .to(self.to.clone())
            .subject(message.subject.clone())
            .multipart(mixed)
            .map_err(|e| DeliveryError::Address(e.to_string()))
    }
}
