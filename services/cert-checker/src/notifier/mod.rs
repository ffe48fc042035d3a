//! Alert payload and the notification backend contract
//!
//! Every channel implements [`Notifier`]. Backends are always constructed, even
//! when disabled, so the [`Dispatcher`](crate::dispatcher::Dispatcher) can keep a
//! fixed invocation order.

pub mod bark;
pub mod dingtalk;
pub mod email;
pub mod wecom;
mod webhook;

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::certificate::CertificateInfo;

pub use bark::BarkNotifier;
pub use dingtalk::DingTalkNotifier;
pub use email::{EmailNotifier, Mailer, OutgoingMail, SmtpMailer};
pub use wecom::WeComNotifier;

/// Display format of [`AlertMessage::expiry_date`]
pub const EXPIRY_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A certificate alert, rendered by each channel in its own wire format
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertMessage {
    pub domain: String,
    /// Display form of the expiry timestamp (UTC)
    pub expiry_date: String,
    pub days_left: i64,
}

impl AlertMessage {
    pub fn new(domain: &str, info: &CertificateInfo) -> Self {
        Self {
            domain: domain.to_string(),
            expiry_date: info.expiry_date.format(EXPIRY_DATE_FORMAT).to_string(),
            days_left: info.expires_in,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.days_left < 0
    }

    /// One-line subject used by channels that carry a title
    pub fn subject(&self) -> String {
        if self.is_expired() {
            format!("SSL certificate expired: {}", self.domain)
        } else {
            format!("SSL certificate expiry reminder: {}", self.domain)
        }
    }
}

impl fmt::Display for AlertMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "[SSL certificate expiry alert]")?;
        writeln!(f, "Domain: {}", self.domain)?;
        writeln!(f, "Expiry date: {} UTC", self.expiry_date)?;
        if self.is_expired() {
            write!(
                f,
                "Status: EXPIRED {} day(s) ago (days left: {})",
                -self.days_left,
                self.days_left
            )
        } else {
            write!(f, "Days left: {}", self.days_left)
        }
    }
}

/// A notification channel
#[async_trait]
pub trait Notifier: Send + Sync + fmt::Debug {
    /// Channel name used in logs and dispatch errors (e.g. "WeCom")
    fn name(&self) -> &str;

    /// The channel's configured `enabled` flag
    fn is_enabled(&self) -> bool;

    /// Deliver `message`; a disabled channel returns `Ok(())` without any I/O
    async fn send(&self, message: &AlertMessage) -> crate::Result<()>;
}
