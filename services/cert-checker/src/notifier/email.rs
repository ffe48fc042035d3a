//! Email delivery over SMTP

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::config::{EmailConfig, SmtpSecurity};
use crate::notifier::{AlertMessage, Notifier};
use crate::CertCheckerError;

const CHANNEL: &str = "Email";

/// A fully composed plain-text email
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMail {
    pub from: String,
    pub to: Vec<String>,
    pub subject: String,
    pub body: String,
}

/// Abstraction over the mail transport for dependency injection
#[async_trait]
#[cfg_attr(test, mockall::automock)]
pub trait Mailer: Send + Sync {
    async fn deliver(&self, mail: OutgoingMail) -> crate::Result<()>;
}

/// Production mailer using lettre's async SMTP transport
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    host: String,
}

impl std::fmt::Debug for SmtpMailer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpMailer")
            .field("host", &self.host)
            .finish()
    }
}

impl SmtpMailer {
    pub fn new(config: &EmailConfig, timeout: Duration) -> crate::Result<Self> {
        let host = config.smtp_host.as_str();
        let builder = match config.security {
            SmtpSecurity::Tls => AsyncSmtpTransport::<Tokio1Executor>::relay(host),
            SmtpSecurity::StartTls => AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host),
            SmtpSecurity::None => Ok(AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(
                host,
            )),
        }
        .map_err(|e| CertCheckerError::Config(format!("SMTP relay {}: {}", host, e)))?;

        let mut builder = builder.port(config.smtp_port).timeout(Some(timeout));
        let user = config.username.as_deref().filter(|u| !u.is_empty());
        let pass = config.password.as_deref().filter(|p| !p.is_empty());
        if let (Some(user), Some(pass)) = (user, pass) {
            builder = builder.credentials(Credentials::new(user.to_string(), pass.to_string()));
        }

        tracing::debug!(
            "Created SmtpMailer for {}:{} ({:?})",
            host,
            config.smtp_port,
            config.security
        );

        Ok(Self {
            transport: builder.build(),
            host: host.to_string(),
        })
    }
}

fn encode_error(message: String) -> CertCheckerError {
    CertCheckerError::Encode {
        channel: CHANNEL.to_string(),
        message,
    }
}

fn parse_mailbox(address: &str) -> crate::Result<Mailbox> {
    address
        .parse::<Mailbox>()
        .map_err(|e| encode_error(format!("invalid address '{}': {}", address, e)))
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn deliver(&self, mail: OutgoingMail) -> crate::Result<()> {
        let mut builder = Message::builder()
            .from(parse_mailbox(&mail.from)?)
            .subject(mail.subject)
            .header(ContentType::TEXT_PLAIN);
        for recipient in &mail.to {
            builder = builder.to(parse_mailbox(recipient)?);
        }
        let message = builder
            .body(mail.body)
            .map_err(|e| encode_error(e.to_string()))?;

        self.transport
            .send(message)
            .await
            .map_err(|e| CertCheckerError::Transport {
                channel: CHANNEL.to_string(),
                message: format!("SMTP {}: {}", self.host, e),
            })?;
        Ok(())
    }
}

/// Email notification channel
pub struct EmailNotifier {
    enabled: bool,
    from: String,
    to: Vec<String>,
    mailer: Option<Arc<dyn Mailer>>,
}

impl std::fmt::Debug for EmailNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmailNotifier")
            .field("enabled", &self.enabled)
            .field("to", &self.to)
            .finish()
    }
}

impl EmailNotifier {
    /// `mailer` may be `None` for a disabled channel
    pub fn new(config: &EmailConfig, mailer: Option<Arc<dyn Mailer>>) -> Self {
        Self {
            enabled: config.enabled,
            from: config.from.clone(),
            to: config.to.clone(),
            mailer,
        }
    }

    pub fn compose(&self, message: &AlertMessage) -> OutgoingMail {
        OutgoingMail {
            from: self.from.clone(),
            to: self.to.clone(),
            subject: message.subject(),
            body: message.to_string(),
        }
    }
}

#[async_trait]
impl Notifier for EmailNotifier {
    fn name(&self) -> &str {
        CHANNEL
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    async fn send(&self, message: &AlertMessage) -> crate::Result<()> {
        if !self.enabled {
            return Ok(());
        }
        let Some(mailer) = &self.mailer else {
            return Err(CertCheckerError::Config(
                "email channel is enabled but has no mail transport".to_string(),
            ));
        };

        tracing::debug!(
            "Sending email alert for {} to {} recipient(s)",
            message.domain,
            self.to.len()
        );
        mailer.deliver(self.compose(message)).await?;
        tracing::debug!("Email alert for {} sent", message.domain);
        Ok(())
    }
}
