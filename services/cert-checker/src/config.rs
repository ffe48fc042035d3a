//! Configuration types for the certificate checker service

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::schedule::DailySchedule;

/// Environment variable overriding `notifiers.email.password`
pub const SMTP_PASSWORD_ENV: &str = "CERT_CHECKER_SMTP_PASSWORD";
/// Environment variable overriding `notifiers.dingtalk.secret`
pub const DINGTALK_SECRET_ENV: &str = "CERT_CHECKER_DINGTALK_SECRET";
/// Environment variable overriding `notifiers.bark.device_key`
pub const BARK_DEVICE_KEY_ENV: &str = "CERT_CHECKER_BARK_DEVICE_KEY";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub domains: DomainConfig,
    #[serde(default)]
    pub alert: AlertConfig,
    #[serde(default)]
    pub checker: CheckerConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub notifiers: NotifiersConfig,
}

/// Where the list of domains to check comes from
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DomainConfig {
    #[serde(default)]
    pub list: Vec<String>,
    #[serde(default)]
    pub use_remote_list: bool,
    #[serde(default)]
    pub remote_url: Option<String>,
    #[serde(default = "default_remote_request_body")]
    pub remote_request_body: serde_json::Value,
}

/// Alerting thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertConfig {
    #[serde(default = "default_threshold_days")]
    pub threshold_days: u32,
    /// Minimum hours between two alerts for the same domain; 0 alerts every cycle
    #[serde(default)]
    pub repeat_interval_hours: u64,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            threshold_days: default_threshold_days(),
            repeat_interval_hours: 0,
        }
    }
}

/// TLS probing behaviour
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckerConfig {
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    #[serde(default = "default_max_concurrent_checks")]
    pub max_concurrent_checks: usize,
    #[serde(default = "default_true")]
    pub verify_certificates: bool,
}

impl Default for CheckerConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: default_timeout_seconds(),
            max_concurrent_checks: default_max_concurrent_checks(),
            verify_certificates: true,
        }
    }
}

/// When check cycles run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// Local wall-clock time of the daily check, `HH:MM` or `HH:MM:SS`
    #[serde(default = "default_daily_at")]
    pub daily_at: String,
    #[serde(default = "default_true")]
    pub run_on_startup: bool,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            daily_at: default_daily_at(),
            run_on_startup: true,
        }
    }
}

/// One settings block per notification channel
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotifiersConfig {
    #[serde(default)]
    pub email: EmailConfig,
    #[serde(default)]
    pub dingtalk: DingTalkConfig,
    #[serde(default)]
    pub wecom: WeComConfig,
    #[serde(default)]
    pub bark: BarkConfig,
}

/// How the SMTP connection is secured
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SmtpSecurity {
    /// Implicit TLS (SMTPS)
    Tls,
    StartTls,
    /// Plaintext, only for local relays
    None,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub smtp_host: String,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    #[serde(default = "default_smtp_security")]
    pub security: SmtpSecurity,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub from: String,
    #[serde(default)]
    pub to: Vec<String>,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            smtp_host: String::new(),
            smtp_port: default_smtp_port(),
            security: default_smtp_security(),
            username: None,
            password: None,
            from: String::new(),
            to: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DingTalkConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub webhook: String,
    /// Signing secret of a robot with "additional signature" security enabled
    #[serde(default)]
    pub secret: Option<String>,
    #[serde(default)]
    pub at_mobiles: Vec<String>,
    #[serde(default)]
    pub at_user_ids: Vec<String>,
    #[serde(default)]
    pub is_at_all: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WeComConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub webhook: String,
    #[serde(default)]
    pub mentioned_mobile_list: Vec<String>,
    #[serde(default)]
    pub mentioned_list: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BarkConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_bark_server_url")]
    pub server_url: String,
    #[serde(default)]
    pub device_key: String,
    #[serde(default = "default_bark_group")]
    pub group: String,
}

impl Default for BarkConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            server_url: default_bark_server_url(),
            device_key: String::new(),
            group: default_bark_group(),
        }
    }
}

fn default_remote_request_body() -> serde_json::Value {
    serde_json::Value::Object(serde_json::Map::new())
}

fn default_threshold_days() -> u32 {
    7
}

fn default_timeout_seconds() -> u64 {
    10
}

fn default_max_concurrent_checks() -> usize {
    4
}

fn default_daily_at() -> String {
    "10:00:00".to_string()
}

fn default_true() -> bool {
    true
}

fn default_smtp_port() -> u16 {
    465
}

fn default_smtp_security() -> SmtpSecurity {
    SmtpSecurity::Tls
}

fn default_bark_server_url() -> String {
    "https://api.day.app/push".to_string()
}

fn default_bark_group() -> String {
    "cert-checker".to_string()
}

impl Config {
    /// Check cross-field constraints that serde cannot express
    pub fn validate(&self) -> crate::Result<()> {
        if self.domains.use_remote_list
            && self
                .domains
                .remote_url
                .as_deref()
                .is_none_or(|url| url.trim().is_empty())
        {
            return Err(config_error(
                "domains.use_remote_list is set but domains.remote_url is empty",
            ));
        }

        if self.checker.timeout_seconds == 0 {
            return Err(config_error("checker.timeout_seconds must be positive"));
        }
        if self.checker.max_concurrent_checks == 0 {
            return Err(config_error("checker.max_concurrent_checks must be positive"));
        }

        DailySchedule::parse(&self.schedule.daily_at)?;

        let email = &self.notifiers.email;
        if email.enabled {
            if email.smtp_host.trim().is_empty() {
                return Err(config_error("notifiers.email.smtp_host is required"));
            }
            if email.from.trim().is_empty() {
                return Err(config_error("notifiers.email.from is required"));
            }
            if email.to.is_empty() {
                return Err(config_error("notifiers.email.to needs at least one recipient"));
            }
            let is_set = |value: &Option<String>| value.as_deref().is_some_and(|v| !v.is_empty());
            if is_set(&email.username) != is_set(&email.password) {
                return Err(config_error(
                    "notifiers.email.username and notifiers.email.password must be set together",
                ));
            }
        }
        if self.notifiers.dingtalk.enabled && self.notifiers.dingtalk.webhook.trim().is_empty() {
            return Err(config_error("notifiers.dingtalk.webhook is required"));
        }
        if self.notifiers.wecom.enabled && self.notifiers.wecom.webhook.trim().is_empty() {
            return Err(config_error("notifiers.wecom.webhook is required"));
        }
        let bark = &self.notifiers.bark;
        if bark.enabled && (bark.server_url.trim().is_empty() || bark.device_key.trim().is_empty())
        {
            return Err(config_error(
                "notifiers.bark.server_url and notifiers.bark.device_key are required",
            ));
        }

        Ok(())
    }

    /// Replace secrets with values from the environment, when present
    pub fn resolve_secrets(&mut self) -> crate::Result<()> {
        self.resolve_secrets_with(|name| std::env::var(name).ok())
    }

    fn resolve_secrets_with<F>(&mut self, lookup: F) -> crate::Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(password) = lookup(SMTP_PASSWORD_ENV) {
            tracing::debug!("Using SMTP password from {}", SMTP_PASSWORD_ENV);
            self.notifiers.email.password = Some(password);
        }
        if let Some(secret) = lookup(DINGTALK_SECRET_ENV) {
            tracing::debug!("Using DingTalk secret from {}", DINGTALK_SECRET_ENV);
            self.notifiers.dingtalk.secret = Some(secret);
        }
        if let Some(key) = lookup(BARK_DEVICE_KEY_ENV) {
            tracing::debug!("Using Bark device key from {}", BARK_DEVICE_KEY_ENV);
            self.notifiers.bark.device_key = key;
        }
        Ok(())
    }
}

fn config_error(message: &str) -> crate::CertCheckerError {
    crate::CertCheckerError::Config(message.to_string())
}

/// Load configuration from a JSON file
pub fn load_config(path: &Path) -> crate::Result<Config> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        crate::CertCheckerError::Config(format!("Failed to read config file {:?}: {}", path, e))
    })?;
    let config: Config = serde_json::from_str(&content)?;
    Ok(config)
}
