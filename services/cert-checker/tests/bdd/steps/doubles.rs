//! Test doubles shared by the step definitions

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use cert_checker::certificate::{CertificateProbe, LeafCertificate};
use cert_checker::io::{HttpClient, HttpResponse};
use cert_checker::notifier::{AlertMessage, Notifier};
use cert_checker::CertCheckerError;
use chrono::Utc;

/// A recorded HTTP request
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub url: String,
    pub body: String,
}

/// An HTTP client that records all requests and returns a canned response
#[derive(Debug)]
pub struct RecordingHttpClient {
    pub requests: Mutex<Vec<RecordedRequest>>,
    status: u16,
    body: String,
    unreachable: bool,
}

impl RecordingHttpClient {
    pub fn replying(status: u16, body: &str) -> Self {
        Self {
            requests: Mutex::new(Vec::new()),
            status,
            body: body.to_string(),
            unreachable: false,
        }
    }

    pub fn unreachable() -> Self {
        Self {
            unreachable: true,
            ..Self::replying(0, "")
        }
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn record(&self, url: &str, body: String) -> cert_checker::Result<HttpResponse> {
        self.requests.lock().unwrap().push(RecordedRequest {
            url: url.to_string(),
            body,
        });
        if self.unreachable {
            return Err(CertCheckerError::Http("connection refused".to_string()));
        }
        Ok(HttpResponse {
            status: self.status,
            body: self.body.clone(),
        })
    }
}

#[async_trait::async_trait]
impl HttpClient for RecordingHttpClient {
    async fn post_json(&self, url: &str, body: String) -> cert_checker::Result<HttpResponse> {
        self.record(url, body)
    }
}

/// A channel that records what it was asked to send
#[derive(Debug)]
pub struct RecordingNotifier {
    pub channel: String,
    pub enabled: bool,
    pub fail: bool,
    pub sent: Mutex<Vec<AlertMessage>>,
    pub order: Option<Arc<Mutex<Vec<String>>>>,
}

impl RecordingNotifier {
    pub fn new(channel: &str, enabled: bool, fail: bool) -> Self {
        Self {
            channel: channel.to_string(),
            enabled,
            fail,
            sent: Mutex::new(Vec::new()),
            order: None,
        }
    }

    pub fn sent(&self) -> Vec<AlertMessage> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Notifier for RecordingNotifier {
    fn name(&self) -> &str {
        &self.channel
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    async fn send(&self, message: &AlertMessage) -> cert_checker::Result<()> {
        self.sent.lock().unwrap().push(message.clone());
        if let Some(order) = &self.order {
            order.lock().unwrap().push(self.channel.clone());
        }
        if self.fail {
            Err(CertCheckerError::Transport {
                channel: self.channel.clone(),
                message: "simulated outage".to_string(),
            })
        } else {
            Ok(())
        }
    }
}

/// A probe that serves certificates with a fixed number of days left per host
#[derive(Debug, Default)]
pub struct StubProbe {
    pub days_left: HashMap<String, i64>,
}

#[async_trait::async_trait]
impl CertificateProbe for StubProbe {
    async fn fetch_leaf(&self, host: &str, _port: u16) -> cert_checker::Result<LeafCertificate> {
        match self.days_left.get(host) {
            Some(&days) => Ok(LeafCertificate {
                subject: format!("CN={}", host),
                issuer: "CN=BDD Test CA".to_string(),
                not_after: Utc::now() + chrono::Duration::days(days) + chrono::Duration::hours(1),
            }),
            None => Err(CertCheckerError::Unreachable {
                domain: host.to_string(),
                cause: "no such host".to_string(),
            }),
        }
    }
}
