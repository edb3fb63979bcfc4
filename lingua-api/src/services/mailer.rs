/// Outgoing email
///
/// [`SmtpMailer`] sends through `lettre`'s pooled async SMTP transport. With
/// no SMTP host configured it logs each message and reports success, so local
/// setups work without a mail server.

use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use tracing::{info, warn};

use crate::config::EmailConfig;

#[derive(Debug, thiserror::Error)]
pub enum MailError {
    /// SMTP transport-level failure (authentication, connection, etc.)
    #[error("SMTP transport error: {0}")]
    Transport(#[from] lettre::transport::smtp::Error),

    /// The recipient or sender address could not be parsed
    #[error("Email address parse error: {0}")]
    Address(#[from] lettre::address::AddressError),

    #[error("Email build error: {0}")]
    Build(String),
}

/// A plain-text message ready to send
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

impl OutgoingEmail {
    /// The message carrying a password reset link
    pub fn password_reset(to: &str, name: Option<&str>, link: &str) -> Self {
        let greeting = name.map_or_else(|| "Hello,".to_string(), |n| format!("Hello {n},"));
        Self {
            to: to.to_string(),
            subject: "Reset your Lingua password".to_string(),
            body: format!(
                "{greeting}\n\n\
                 Someone asked to reset the password of your Lingua account.\n\
                 Open this link within one hour to choose a new one:\n\n\
                 {link}\n\n\
                 If it was not you, ignore this email. Your password stays the same."
            ),
        }
    }
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: OutgoingEmail) -> Result<(), MailError>;
}

pub struct SmtpMailer {
    from: Mailbox,
    transport: Option<AsyncSmtpTransport<Tokio1Executor>>,
}

impl SmtpMailer {
    /// Builds the transport; no connection is opened until the first send
    ///
    /// # Errors
    ///
    /// Fails when the sender address or the relay host is invalid.
    pub fn new(config: &EmailConfig) -> Result<Self, MailError> {
        let from: Mailbox = config.from.parse()?;

        if !config.is_enabled() {
            warn!("SMTP_HOST not set, outgoing email will only be logged");
            return Ok(Self { from, transport: None });
        }

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)?
            .port(config.smtp_port);
        if let (Some(user), Some(pass)) = (&config.smtp_username, &config.smtp_password) {
            builder = builder.credentials(Credentials::new(user.clone(), pass.clone()));
        }

        info!(host = %config.smtp_host, port = config.smtp_port, "SMTP mailer configured");
        Ok(Self {
            from,
            transport: Some(builder.build()),
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, email: OutgoingEmail) -> Result<(), MailError> {
        let message = Message::builder()
            .from(self.from.clone())
            .to(email.to.parse()?)
            .subject(email.subject.as_str())
            .header(ContentType::TEXT_PLAIN)
            .body(email.body)
            .map_err(|e| MailError::Build(e.to_string()))?;

        match &self.transport {
            Some(transport) => {
                transport.send(message).await?;
                info!(to = %email.to, subject = %email.subject, "Email sent");
            }
            None => info!(to = %email.to, subject = %email.subject, "Email delivery disabled, message dropped"),
        }
        Ok(())
    }
}
