//! Resolves the list of domains to check each cycle

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::config::DomainConfig;
use crate::io::HttpClient;
use crate::CertCheckerError;

/// Body returned by the remote domain-list endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainListResponse {
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub msg: String,
    #[serde(default)]
    pub data: Vec<String>,
}

/// Static list, or a remote list with the last good result kept as fallback
pub struct DomainSource {
    remote: Option<RemoteList>,
    last_good: RwLock<Vec<String>>,
}

struct RemoteList {
    url: String,
    request_body: String,
    http: Arc<dyn HttpClient>,
}

impl std::fmt::Debug for DomainSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DomainSource")
            .field("remote_url", &self.remote.as_ref().map(|r| r.url.as_str()))
            .finish()
    }
}

impl DomainSource {
    /// A fixed list of domains
    pub fn fixed(domains: Vec<String>) -> Self {
        Self {
            remote: None,
            last_good: RwLock::new(normalize(domains)),
        }
    }

    /// The static `list` seeds the fallback when the remote list is used
    pub fn from_config(config: &DomainConfig, http: Arc<dyn HttpClient>) -> crate::Result<Self> {
        let mut source = Self::fixed(config.list.clone());
        if config.use_remote_list {
            let url = config
                .remote_url
                .clone()
                .filter(|u| !u.trim().is_empty())
                .ok_or_else(|| {
                    CertCheckerError::Config(
                        "domains.use_remote_list is set but domains.remote_url is empty"
                            .to_string(),
                    )
                })?;
            let request_body = match &config.remote_request_body {
                serde_json::Value::Null => "{}".to_string(),
                body => serde_json::to_string(body)?,
            };
            source.remote = Some(RemoteList {
                url,
                request_body,
                http,
            });
        }
        Ok(source)
    }

    pub fn is_remote(&self) -> bool {
        self.remote.is_some()
    }

    /// Domains for this cycle. A failing remote fetch falls back to the previous list.
    pub async fn resolve(&self) -> Vec<String> {
        let Some(remote) = &self.remote else {
            return self.last_good.read().await.clone();
        };

        match remote.fetch().await {
            Ok(domains) => {
                tracing::debug!("Fetched {} domain(s) from {}", domains.len(), remote.url);
                *self.last_good.write().await = domains.clone();
                domains
            }
            Err(e) => {
                let fallback = self.last_good.read().await.clone();
                tracing::warn!(
                    "Failed to fetch domain list, reusing {} previous domain(s): {}",
                    fallback.len(),
                    e
                );
                fallback
            }
        }
    }
}

impl RemoteList {
    async fn fetch(&self) -> crate::Result<Vec<String>> {
        let response = self
            .http
            .post_json(&self.url, self.request_body.clone())
            .await
            .map_err(|e| CertCheckerError::DomainList(e.to_string()))?;

        if !response.is_success() {
            return Err(CertCheckerError::DomainList(format!(
                "{} returned status {}",
                self.url, response.status
            )));
        }

        let list: DomainListResponse = serde_json::from_str(&response.body)
            .map_err(|e| CertCheckerError::DomainList(format!("malformed response: {}", e)))?;
        if list.code != 0 {
            return Err(CertCheckerError::DomainList(format!(
                "code {}: {}",
                list.code, list.msg
            )));
        }
        Ok(normalize(list.data))
    }
}

fn normalize(domains: Vec<String>) -> Vec<String> {
    domains
        .into_iter()
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty())
        .collect()
}
