//! Dispatcher: fans one alert out to every enabled channel

use std::sync::Arc;

use crate::config::NotifiersConfig;
use crate::error::{ChannelFailure, DispatchFailure};
use crate::io::HttpClient;
use crate::notifier::{
    AlertMessage, BarkNotifier, DingTalkNotifier, EmailNotifier, Mailer, Notifier, WeComNotifier,
};
use crate::CertCheckerError;

/// Ordered set of notification channels
#[derive(Debug, Default)]
pub struct Dispatcher {
    notifiers: Vec<Arc<dyn Notifier>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the four built-in channels in their fixed order: Email, DingTalk, WeCom, Bark.
    ///
    /// Every channel is constructed even when disabled.
    pub fn from_config(
        config: &NotifiersConfig,
        http: Arc<dyn HttpClient>,
        mailer: Option<Arc<dyn Mailer>>,
    ) -> Self {
        let mut dispatcher = Self::new();
        dispatcher.register(Arc::new(EmailNotifier::new(&config.email, mailer)));
        dispatcher.register(Arc::new(DingTalkNotifier::new(
            &config.dingtalk,
            Arc::clone(&http),
        )));
        dispatcher.register(Arc::new(WeComNotifier::new(
            &config.wecom,
            Arc::clone(&http),
        )));
        dispatcher.register(Arc::new(BarkNotifier::new(&config.bark, http)));
        dispatcher
    }

    /// Append a channel after those already registered
    pub fn register(&mut self, notifier: Arc<dyn Notifier>) {
        tracing::debug!(
            "Registered notifier '{}' (enabled={})",
            notifier.name(),
            notifier.is_enabled()
        );
        self.notifiers.push(notifier);
    }

    pub fn notifiers(&self) -> &[Arc<dyn Notifier>] {
        &self.notifiers
    }

    /// Names of enabled channels, in invocation order
    pub fn enabled_channels(&self) -> Vec<&str> {
        self.notifiers
            .iter()
            .filter(|n| n.is_enabled())
            .map(|n| n.name())
            .collect()
    }

    /// Send `message` to every enabled channel.
    ///
    /// A failing channel never stops the remaining ones; all failures are
    /// returned together as [`CertCheckerError::Dispatch`].
    pub async fn send(&self, message: &AlertMessage) -> crate::Result<()> {
        let mut failure = DispatchFailure::default();

        for notifier in &self.notifiers {
            if !notifier.is_enabled() {
                continue;
            }

            tracing::debug!(
                "Dispatching alert for '{}' to '{}'",
                message.domain,
                notifier.name()
            );

            match notifier.send(message).await {
                Ok(()) => {
                    tracing::info!(
                        "Sent alert for '{}' via {}",
                        message.domain,
                        notifier.name()
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        "Alert for '{}' via {} failed: {}",
                        message.domain,
                        notifier.name(),
                        e
                    );
                    failure.failures.push(ChannelFailure {
                        channel: notifier.name().to_string(),
                        error: e,
                    });
                }
            }
        }

        if failure.is_empty() {
            Ok(())
        } else {
            Err(CertCheckerError::Dispatch(failure))
        }
    }
}
