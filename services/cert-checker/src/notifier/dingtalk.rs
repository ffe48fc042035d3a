//! DingTalk custom robot

use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine as _;
use hmac::{Hmac, Mac};
use serde::Serialize;
use sha2::Sha256;

use crate::config::DingTalkConfig;
use crate::io::HttpClient;
use crate::notifier::webhook;
use crate::notifier::{AlertMessage, Notifier};
use crate::CertCheckerError;

const CHANNEL: &str = "DingTalk";

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Serialize)]
struct TextPayload<'a> {
    msgtype: &'static str,
    text: TextContent,
    at: AtTargets<'a>,
}

#[derive(Debug, Serialize)]
struct TextContent {
    content: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AtTargets<'a> {
    at_mobiles: &'a [String],
    at_user_ids: &'a [String],
    is_at_all: bool,
}

/// Append DingTalk's `timestamp` and `sign` query parameters to `base_url`
pub fn signed_url(base_url: &str, secret: &str, timestamp_ms: i64) -> crate::Result<String> {
    let string_to_sign = format!("{}\n{}", timestamp_ms, secret);
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).map_err(|e| {
        CertCheckerError::Encode {
            channel: CHANNEL.to_string(),
            message: format!("signing key: {}", e),
        }
    })?;
    mac.update(string_to_sign.as_bytes());
    let sign = base64::engine::general_purpose::STANDARD.encode(mac.finalize().into_bytes());

    let separator = if base_url.contains('?') { '&' } else { '?' };
    Ok(format!(
        "{}{}timestamp={}&sign={}",
        base_url,
        separator,
        timestamp_ms,
        urlencoding::encode(&sign)
    ))
}

/// DingTalk robot webhook sender
pub struct DingTalkNotifier {
    enabled: bool,
    webhook: String,
    secret: Option<String>,
    at_mobiles: Vec<String>,
    at_user_ids: Vec<String>,
    is_at_all: bool,
    http: Arc<dyn HttpClient>,
}

impl std::fmt::Debug for DingTalkNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DingTalkNotifier")
            .field("enabled", &self.enabled)
            .field("signed", &self.secret.is_some())
            .finish()
    }
}

impl DingTalkNotifier {
    pub fn new(config: &DingTalkConfig, http: Arc<dyn HttpClient>) -> Self {
        Self {
            enabled: config.enabled,
            webhook: config.webhook.clone(),
            secret: config.secret.clone().filter(|s| !s.is_empty()),
            at_mobiles: config.at_mobiles.clone(),
            at_user_ids: config.at_user_ids.clone(),
            is_at_all: config.is_at_all,
            http,
        }
    }

    fn target_url(&self) -> crate::Result<String> {
        match &self.secret {
            Some(secret) => signed_url(
                &self.webhook,
                secret,
                chrono::Utc::now().timestamp_millis(),
            ),
            None => Ok(self.webhook.clone()),
        }
    }
}

#[async_trait]
impl Notifier for DingTalkNotifier {
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

        let payload = TextPayload {
            msgtype: "text",
            text: TextContent {
                content: message.to_string(),
            },
            at: AtTargets {
                at_mobiles: &self.at_mobiles,
                at_user_ids: &self.at_user_ids,
                is_at_all: self.is_at_all,
            },
        };

        tracing::debug!("Sending DingTalk alert for {}", message.domain);
        let url = self.target_url()?;
        let response = webhook::post_json(self.http.as_ref(), CHANNEL, &url, &payload).await?;
        webhook::check_errcode(CHANNEL, &response)?;
        tracing::debug!("DingTalk alert for {} sent", message.domain);
        Ok(())
    }
}
