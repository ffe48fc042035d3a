//! Error types for the certificate checker service

use std::fmt;

/// Errors that can occur in the certificate checker service
#[derive(Debug, thiserror::Error)]
pub enum CertCheckerError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// DNS, connect, handshake or verification failure for one domain
    #[error("Unreachable or invalid certificate for {domain}: {cause}")]
    Unreachable { domain: String, cause: String },

    #[error("{channel}: failed to encode payload: {message}")]
    Encode { channel: String, message: String },

    #[error("{channel}: transport failure: {message}")]
    Transport { channel: String, message: String },

    #[error("{channel}: endpoint returned status {status}: {body}")]
    Status {
        channel: String,
        status: u16,
        body: String,
    },

    /// The endpoint acknowledged with a success status but an error code in its body
    #[error("{channel}: endpoint rejected message (errcode {code}): {message}")]
    Rejected {
        channel: String,
        code: i64,
        message: String,
    },

    #[error("Notification dispatch failed: {0}")]
    Dispatch(DispatchFailure),

    #[error("Domain list error: {0}")]
    DomainList(String),
}

impl CertCheckerError {
    /// Name of the notification channel this error is attributed to, if any
    pub fn channel(&self) -> Option<&str> {
        match self {
            CertCheckerError::Encode { channel, .. }
            | CertCheckerError::Transport { channel, .. }
            | CertCheckerError::Status { channel, .. }
            | CertCheckerError::Rejected { channel, .. } => Some(channel),
            _ => None,
        }
    }
}

/// One channel that failed during a dispatch
#[derive(Debug)]
pub struct ChannelFailure {
    pub channel: String,
    pub error: CertCheckerError,
}

/// Every channel that failed while fanning out a single alert
#[derive(Debug, Default)]
pub struct DispatchFailure {
    pub failures: Vec<ChannelFailure>,
}

impl DispatchFailure {
    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn len(&self) -> usize {
        self.failures.len()
    }

    /// Names of the failing channels, in invocation order
    pub fn channels(&self) -> Vec<&str> {
        self.failures.iter().map(|f| f.channel.as_str()).collect()
    }
}

impl fmt::Display for DispatchFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} channel(s) failed", self.failures.len())?;
        for failure in &self.failures {
            write!(f, "; [{}] {}", failure.channel, failure.error)?;
        }
        Ok(())
    }
}

/// Result type alias for certificate checker operations
pub type Result<T> = std::result::Result<T, CertCheckerError>;
