//! Bark push notifications (iOS)

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

use crate::config::BarkConfig;
use crate::io::HttpClient;
use crate::notifier::webhook;
use crate::notifier::{AlertMessage, Notifier};

const CHANNEL: &str = "Bark";
const TITLE_PREFIX: &str = "SSL certificate expiry reminder";

#[derive(Debug, Serialize)]
struct PushPayload<'a> {
    device_key: &'a str,
    title: String,
    body: String,
    #[serde(skip_serializing_if = "str::is_empty")]
    group: &'a str,
}

/// Bark push sender
pub struct BarkNotifier {
    enabled: bool,
    server_url: String,
    device_key: String,
    group: String,
    http: Arc<dyn HttpClient>,
}

impl std::fmt::Debug for BarkNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BarkNotifier")
            .field("enabled", &self.enabled)
            .field("server_url", &self.server_url)
            .finish()
    }
}

impl BarkNotifier {
    pub fn new(config: &BarkConfig, http: Arc<dyn HttpClient>) -> Self {
        Self {
            enabled: config.enabled,
            server_url: config.server_url.clone(),
            device_key: config.device_key.clone(),
            group: config.group.clone(),
            http,
        }
    }
}

#[async_trait]
impl Notifier for BarkNotifier {
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

        let payload = PushPayload {
            device_key: &self.device_key,
            title: format!("{}: {}", TITLE_PREFIX, message.domain),
            body: format!("Days remaining: {}", message.days_left),
            group: &self.group,
        };

        tracing::debug!("Sending Bark push for {}", message.domain);
        webhook::post_json(self.http.as_ref(), CHANNEL, &self.server_url, &payload).await?;
        tracing::debug!("Bark push for {} sent", message.domain);
        Ok(())
    }
}
