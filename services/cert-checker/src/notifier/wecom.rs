//! WeCom (WeChat Work) group robot

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

use crate::config::WeComConfig;
use crate::io::HttpClient;
use crate::notifier::webhook;
use crate::notifier::{AlertMessage, Notifier};

const CHANNEL: &str = "WeCom";

#[derive(Debug, Serialize)]
struct TextPayload<'a> {
    msgtype: &'static str,
    text: TextContent<'a>,
}

#[derive(Debug, Serialize)]
struct TextContent<'a> {
    content: String,
    mentioned_mobile_list: &'a [String],
    mentioned_list: &'a [String],
}

/// WeCom robot webhook sender
pub struct WeComNotifier {
    enabled: bool,
    webhook: String,
    mentioned_mobile_list: Vec<String>,
    mentioned_list: Vec<String>,
    http: Arc<dyn HttpClient>,
}

impl std::fmt::Debug for WeComNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WeComNotifier")
            .field("enabled", &self.enabled)
            .finish()
    }
}

impl WeComNotifier {
    pub fn new(config: &WeComConfig, http: Arc<dyn HttpClient>) -> Self {
        Self {
            enabled: config.enabled,
            webhook: config.webhook.clone(),
            mentioned_mobile_list: config.mentioned_mobile_list.clone(),
            mentioned_list: config.mentioned_list.clone(),
            http,
        }
    }

    fn payload<'a>(&'a self, message: &AlertMessage) -> TextPayload<'a> {
        TextPayload {
            msgtype: "text",
            text: TextContent {
                content: message.to_string(),
                mentioned_mobile_list: &self.mentioned_mobile_list,
                mentioned_list: &self.mentioned_list,
            },
        }
    }
}

#[async_trait]
impl Notifier for WeComNotifier {
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

        tracing::debug!("Sending WeCom alert for {}", message.domain);
        let payload = self.payload(message);
        let response =
            webhook::post_json(self.http.as_ref(), CHANNEL, &self.webhook, &payload).await?;
        webhook::check_errcode(CHANNEL, &response)?;
        tracing::debug!("WeCom alert for {} sent", message.domain);
        Ok(())
    }
}
