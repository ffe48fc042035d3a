//! Leaf certificate retrieval and expiry classification
//!
//! A check opens one TLS connection to the target, reads the `NotAfter` field of the
//! presented leaf certificate and classifies the remaining validity against the
//! alert threshold. Network and handshake failures are surfaced as
//! [`CertCheckerError::Unreachable`](crate::CertCheckerError::Unreachable).

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::CryptoProvider;
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{ClientConfig, DigitallySignedStruct, RootCertStore, SignatureScheme};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;

/// Port assumed when a domain carries none
pub const DEFAULT_TLS_PORT: u16 = 443;

const SECONDS_PER_DAY: i64 = 24 * 60 * 60;

/// Health of a certificate relative to the alert threshold
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CertStatus {
    Ok,
    Warning,
    Expired,
}

impl fmt::Display for CertStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CertStatus::Ok => write!(f, "OK"),
            CertStatus::Warning => write!(f, "Warning"),
            CertStatus::Expired => write!(f, "Expired"),
        }
    }
}

/// Result of inspecting one domain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateInfo {
    pub expiry_date: DateTime<Utc>,
    /// Whole days left, negative once expired
    pub expires_in: i64,
    pub is_expired: bool,
    pub is_warning: bool,
}

impl CertificateInfo {
    /// Classify an expiry timestamp as seen at `now`
    pub fn evaluate(expiry_date: DateTime<Utc>, now: DateTime<Utc>, threshold_days: u32) -> Self {
        let expires_in = days_until(expiry_date, now);
        let is_expired = expires_in < 0 || expiry_date < now;
        let is_warning = !is_expired && expires_in <= i64::from(threshold_days);
        Self {
            expiry_date,
            expires_in,
            is_expired,
            is_warning,
        }
    }

    pub fn status(&self) -> CertStatus {
        if self.is_expired {
            CertStatus::Expired
        } else if self.is_warning {
            CertStatus::Warning
        } else {
            CertStatus::Ok
        }
    }

    /// Whether this result should produce an alert
    pub fn needs_alert(&self) -> bool {
        self.is_expired || self.is_warning
    }
}

/// `floor((expiry - now) / 24h)`, computed on UTC instants
pub fn days_until(expiry: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (expiry - now).num_seconds().div_euclid(SECONDS_PER_DAY)
}

/// A host and port to connect to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckTarget {
    pub host: String,
    pub port: u16,
}

impl CheckTarget {
    /// Parse `host`, `host:port`, `[v6]` or `[v6]:port`
    pub fn parse(domain: &str) -> crate::Result<Self> {
        let trimmed = domain.trim();
        let invalid = |cause: &str| crate::CertCheckerError::Unreachable {
            domain: domain.to_string(),
            cause: cause.to_string(),
        };

        if trimmed.is_empty() {
            return Err(invalid("empty host name"));
        }

        let (host, port) = if let Some(rest) = trimmed.strip_prefix('[') {
            let (host, after) = rest
                .split_once(']')
                .ok_or_else(|| invalid("unterminated IPv6 literal"))?;
            match after {
                "" => (host, None),
                _ => {
                    let port = after
                        .strip_prefix(':')
                        .ok_or_else(|| invalid("unexpected characters after IPv6 literal"))?;
                    (host, Some(port))
                }
            }
        } else if trimmed.matches(':').count() == 1 {
            let (host, port) = trimmed.split_once(':').unwrap_or((trimmed, ""));
            (host, Some(port))
        } else {
            (trimmed, None)
        };

        if host.is_empty() {
            return Err(invalid("empty host name"));
        }

        let port = match port {
            Some(p) => p
                .parse::<u16>()
                .ok()
                .filter(|p| *p != 0)
                .ok_or_else(|| invalid(&format!("invalid port '{}'", p)))?,
            None => DEFAULT_TLS_PORT,
        };

        Ok(Self {
            host: host.to_string(),
            port,
        })
    }
}

impl fmt::Display for CheckTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

/// The parts of the presented leaf certificate the checker cares about
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeafCertificate {
    pub subject: String,
    pub issuer: String,
    pub not_after: DateTime<Utc>,
}

/// Retrieves the leaf certificate a server presents
#[async_trait]
#[cfg_attr(test, mockall::automock)]
pub trait CertificateProbe: Send + Sync {
    async fn fetch_leaf(&self, host: &str, port: u16) -> crate::Result<LeafCertificate>;
}

/// Inspect `domain` and classify its certificate against `threshold_days`
pub async fn check_cert(
    probe: &dyn CertificateProbe,
    domain: &str,
    threshold_days: u32,
) -> crate::Result<CertificateInfo> {
    let target = CheckTarget::parse(domain)?;
    let leaf = probe.fetch_leaf(&target.host, target.port).await?;
    tracing::debug!(
        "Leaf certificate for {}: subject='{}', issuer='{}', not_after={}",
        target,
        leaf.subject,
        leaf.issuer,
        leaf.not_after
    );
    Ok(CertificateInfo::evaluate(leaf.not_after, Utc::now(), threshold_days))
}

/// Production probe: a rustls handshake followed by x509 parsing of the leaf
#[derive(Clone)]
pub struct TlsProbe {
    connector: TlsConnector,
    timeout: Duration,
    verify: bool,
}

impl fmt::Debug for TlsProbe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TlsProbe")
            .field("timeout", &self.timeout)
            .field("verify", &self.verify)
            .finish()
    }
}

impl TlsProbe {
    /// `verify = false` accepts any presented chain so expired leaves can still be read
    pub fn new(timeout: Duration, verify: bool) -> crate::Result<Self> {
        let provider = Arc::new(rustls::crypto::aws_lc_rs::default_provider());
        let builder = ClientConfig::builder_with_provider(Arc::clone(&provider))
            .with_safe_default_protocol_versions()
            .map_err(|e| crate::CertCheckerError::Config(format!("TLS setup failed: {}", e)))?;

        let config = if verify {
            let mut roots = RootCertStore::empty();
            roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
            builder.with_root_certificates(roots).with_no_client_auth()
        } else {
            builder
                .dangerous()
                .with_custom_certificate_verifier(Arc::new(AcceptAnyCertificate { provider }))
                .with_no_client_auth()
        };

        tracing::debug!(
            "Created TlsProbe with timeout {:?}, verification {}",
            timeout,
            if verify { "on" } else { "off" }
        );

        Ok(Self {
            connector: TlsConnector::from(Arc::new(config)),
            timeout,
            verify,
        })
    }
}

#[async_trait]
impl CertificateProbe for TlsProbe {
    async fn fetch_leaf(&self, host: &str, port: u16) -> crate::Result<LeafCertificate> {
        let target = CheckTarget {
            host: host.to_string(),
            port,
        };
        let unreachable = |cause: String| crate::CertCheckerError::Unreachable {
            domain: target.to_string(),
            cause,
        };

        let server_name = ServerName::try_from(host.to_string())
            .map_err(|e| unreachable(format!("invalid server name: {}", e)))?;

        // one deadline covers connect and handshake together
        let handshake = async {
            let tcp = TcpStream::connect((host, port))
                .await
                .map_err(|e| unreachable(format!("TCP connection failed: {}", e)))?;
            self.connector
                .connect(server_name, tcp)
                .await
                .map_err(|e| unreachable(format!("TLS handshake failed: {}", e)))
        };
        let tls = tokio::time::timeout(self.timeout, handshake)
            .await
            .map_err(|_| unreachable(format!("connection timed out after {:?}", self.timeout)))??;

        let (_, connection) = tls.get_ref();
        let leaf_der = connection
            .peer_certificates()
            .and_then(|certs| certs.first())
            .ok_or_else(|| unreachable("server presented no certificate".to_string()))?;

        let (_, cert) = x509_parser::parse_x509_certificate(leaf_der.as_ref())
            .map_err(|e| unreachable(format!("failed to parse leaf certificate: {}", e)))?;

        let not_after = DateTime::<Utc>::from_timestamp(cert.validity().not_after.timestamp(), 0)
            .ok_or_else(|| unreachable("certificate NotAfter out of range".to_string()))?;

        Ok(LeafCertificate {
            subject: cert.subject().to_string(),
            issuer: cert.issuer().to_string(),
            not_after,
        })
    }
}

/// Verifier that skips chain and hostname checks but still validates handshake signatures
#[derive(Debug)]
struct AcceptAnyCertificate {
    provider: Arc<CryptoProvider>,
}

impl ServerCertVerifier for AcceptAnyCertificate {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> std::result::Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls12_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls13_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.provider
            .signature_verification_algorithms
            .supported_schemes()
    }
}
