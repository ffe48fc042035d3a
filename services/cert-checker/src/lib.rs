//! Cert Checker - TLS certificate expiry monitoring and alerting service
//!
//! Checks the leaf certificate of each configured domain once a day and sends
//! an alert through Email, DingTalk, WeCom and Bark when a certificate is
//! about to expire or already has.

pub mod certificate;
pub mod config;
pub mod dispatcher;
pub mod domains;
pub mod engine;
pub mod error;
pub mod io;
pub mod notifier;
pub mod schedule;
pub mod state;

pub use certificate::{check_cert, CertStatus, CertificateInfo, CertificateProbe, TlsProbe};
pub use config::{load_config, Config};
pub use dispatcher::Dispatcher;
pub use engine::{CycleReport, DomainOutcome, Engine};
pub use error::{CertCheckerError, Result};
pub use notifier::{AlertMessage, Notifier};

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::domains::DomainSource;
use crate::io::{HttpClient, ReqwestHttpClient};
use crate::notifier::{Mailer, SmtpMailer};

/// Assembles a [`CertChecker`] from configuration, with optional injected collaborators
pub struct CheckerBuilder {
    config: Config,
    http: Option<Arc<dyn HttpClient>>,
    probe: Option<Arc<dyn CertificateProbe>>,
    mailer: Option<Arc<dyn Mailer>>,
    extra_notifiers: Vec<Arc<dyn Notifier>>,
    cancel: Option<CancellationToken>,
}

impl CheckerBuilder {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            http: None,
            probe: None,
            mailer: None,
            extra_notifiers: Vec::new(),
            cancel: None,
        }
    }

    pub fn with_http_client(mut self, http: Arc<dyn HttpClient>) -> Self {
        self.http = Some(http);
        self
    }

    pub fn with_probe(mut self, probe: Arc<dyn CertificateProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    pub fn with_mailer(mut self, mailer: Arc<dyn Mailer>) -> Self {
        self.mailer = Some(mailer);
        self
    }

    /// Additional channels, invoked after the built-in ones in the given order
    pub fn with_notifiers(mut self, notifiers: Vec<Arc<dyn Notifier>>) -> Self {
        self.extra_notifiers.extend(notifiers);
        self
    }

    pub fn with_cancellation_token(mut self, cancel: CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub async fn build(self) -> Result<CertChecker> {
        self.config.validate()?;

        let timeout = Duration::from_secs(self.config.checker.timeout_seconds);

        let http: Arc<dyn HttpClient> = match self.http {
            Some(http) => http,
            None => Arc::new(ReqwestHttpClient::new(timeout)?),
        };

        let probe: Arc<dyn CertificateProbe> = match self.probe {
            Some(probe) => probe,
            None => {
                if !self.config.checker.verify_certificates {
                    tracing::warn!("Certificate chain verification is disabled");
                }
                Arc::new(TlsProbe::new(
                    timeout,
                    self.config.checker.verify_certificates,
                )?)
            }
        };

        let email = &self.config.notifiers.email;
        let mailer: Option<Arc<dyn Mailer>> = match self.mailer {
            Some(mailer) => Some(mailer),
            None if email.enabled => Some(Arc::new(SmtpMailer::new(email, timeout)?)),
            None => None,
        };

        let mut dispatcher =
            Dispatcher::from_config(&self.config.notifiers, Arc::clone(&http), mailer);
        for notifier in self.extra_notifiers {
            dispatcher.register(notifier);
        }
        let enabled = dispatcher.enabled_channels();
        if enabled.is_empty() {
            tracing::warn!("No notification channel is enabled; alerts will only be logged");
        } else {
            tracing::info!("Enabled notification channels: {}", enabled.join(", "));
        }

        let domains = DomainSource::from_config(&self.config.domains, http)?;
        let cancel = self.cancel.unwrap_or_default();

        let engine = Engine::new(
            probe,
            Arc::new(dispatcher),
            Arc::new(domains),
            &self.config,
            cancel.clone(),
        )?;

        Ok(CertChecker { engine, cancel })
    }
}

/// A fully assembled checker
pub struct CertChecker {
    engine: Engine,
    cancel: CancellationToken,
}

impl CertChecker {
    /// Run a single check cycle
    pub async fn run_once(&self) -> CycleReport {
        self.engine.run_cycle().await
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Run on the daily schedule until SIGINT/SIGTERM or cancellation
    pub async fn start(self) -> Result<()> {
        let cancel_for_signal = self.cancel.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = shutdown_signal() => {
                    tracing::info!("Shutdown signal received");
                    cancel_for_signal.cancel();
                }
                _ = cancel_for_signal.cancelled() => {}
            }
        });

        tracing::info!(
            "Cert checker started, daily check at {}",
            self.engine.schedule().time()
        );
        self.engine.run().await;
        tracing::info!("Cert checker stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for ctrl-c: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
