//! Engine: runs check cycles on a daily schedule and raises alerts

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Local, Utc};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::certificate::{check_cert, CertStatus, CertificateInfo, CertificateProbe};
use crate::config::Config;
use crate::dispatcher::Dispatcher;
use crate::domains::DomainSource;
use crate::notifier::AlertMessage;
use crate::schedule::DailySchedule;
use crate::state::{new_ledger_handle, LedgerHandle};
use crate::CertCheckerError;

/// What happened to one domain during a cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomainOutcome {
    /// Certificate is outside the warning window
    Healthy(CertificateInfo),
    /// Alert dispatched to every enabled channel
    Alerted(CertificateInfo),
    /// Alert-worthy, but already alerted within the repeat interval
    Suppressed(CertificateInfo),
    /// Alert-worthy, but at least one channel failed
    AlertFailed { info: CertificateInfo, error: String },
    /// The certificate could not be inspected
    CheckFailed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainReport {
    pub domain: String,
    pub outcome: DomainOutcome,
}

/// Per-domain results of one check cycle, in domain-list order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub domains: Vec<DomainReport>,
}

impl CycleReport {
    pub fn checked(&self) -> usize {
        self.domains
            .iter()
            .filter(|d| !matches!(d.outcome, DomainOutcome::CheckFailed(_)))
            .count()
    }

    pub fn check_failures(&self) -> usize {
        self.domains.len() - self.checked()
    }

    /// Number of alerts handed to the dispatcher, whether or not every channel succeeded
    pub fn alerts_dispatched(&self) -> usize {
        self.domains
            .iter()
            .filter(|d| {
                matches!(
                    d.outcome,
                    DomainOutcome::Alerted(_) | DomainOutcome::AlertFailed { .. }
                )
            })
            .count()
    }

    pub fn alert_failures(&self) -> usize {
        self.domains
            .iter()
            .filter(|d| matches!(d.outcome, DomainOutcome::AlertFailed { .. }))
            .count()
    }

    /// Alerts held back by the repeat interval
    pub fn suppressed(&self) -> usize {
        self.domains
            .iter()
            .filter(|d| matches!(d.outcome, DomainOutcome::Suppressed(_)))
            .count()
    }

    pub fn get(&self, domain: &str) -> Option<&DomainOutcome> {
        self.domains
            .iter()
            .find(|d| d.domain == domain)
            .map(|d| &d.outcome)
    }
}

/// The engine resolves domains, checks them with bounded concurrency and dispatches alerts
pub struct Engine {
    probe: Arc<dyn CertificateProbe>,
    dispatcher: Arc<Dispatcher>,
    domains: Arc<DomainSource>,
    ledger: LedgerHandle,
    threshold_days: u32,
    max_concurrent_checks: usize,
    schedule: DailySchedule,
    run_on_startup: bool,
    cancel: CancellationToken,
}

impl Engine {
    pub fn new(
        probe: Arc<dyn CertificateProbe>,
        dispatcher: Arc<Dispatcher>,
        domains: Arc<DomainSource>,
        config: &Config,
        cancel: CancellationToken,
    ) -> crate::Result<Self> {
        Ok(Self {
            probe,
            dispatcher,
            domains,
            ledger: new_ledger_handle(
                config.alert.repeat_interval_hours,
                config.checker.timeout_seconds,
            ),
            threshold_days: config.alert.threshold_days,
            max_concurrent_checks: config.checker.max_concurrent_checks.max(1),
            schedule: DailySchedule::parse(&config.schedule.daily_at)?,
            run_on_startup: config.schedule.run_on_startup,
            cancel,
        })
    }

    pub fn schedule(&self) -> DailySchedule {
        self.schedule
    }

    /// Run cycles until the cancellation token is triggered
    pub async fn run(&self) {
        if self.run_on_startup {
            self.run_cycle().await;
        }

        loop {
            let now = Local::now();
            let next = self.schedule.next_after(&now);
            tracing::info!("Next certificate check at {}", next.format("%Y-%m-%d %H:%M:%S %Z"));

            tokio::select! {
                _ = tokio::time::sleep(self.schedule.delay_from(&now)) => {
                    self.run_cycle().await;
                }
                _ = self.cancel.cancelled() => {
                    tracing::debug!("Scheduler cancelled");
                    break;
                }
            }
        }
    }

    /// Check every domain once and alert the ones inside the warning window
    pub async fn run_cycle(&self) -> CycleReport {
        // one timestamp per cycle for the repeat window
        let started = Utc::now();
        let domains = self.domains.resolve().await;
        tracing::info!("Checking {} domain(s)", domains.len());

        let results = self.check_all(&domains).await;

        let mut report = CycleReport::default();
        for (domain, result) in domains.into_iter().zip(results) {
            let outcome = match result {
                Ok(info) => {
                    tracing::info!(
                        "{}: expires {} UTC, {} day(s) left ({})",
                        domain,
                        info.expiry_date.format("%Y-%m-%d %H:%M:%S"),
                        info.expires_in,
                        info.status()
                    );
                    self.handle_result(&domain, info, started).await
                }
                Err(e) => {
                    tracing::warn!("{}: check failed: {}", domain, e);
                    DomainOutcome::CheckFailed(e.to_string())
                }
            };
            report.domains.push(DomainReport { domain, outcome });
        }

        tracing::info!(
            "Cycle finished: {} checked, {} failed, {} alert(s) dispatched, {} suppressed, {} with channel failures",
            report.checked(),
            report.check_failures(),
            report.alerts_dispatched(),
            report.suppressed(),
            report.alert_failures()
        );
        report
    }

    /// Probe all domains at most `max_concurrent_checks` at a time; results keep input order
    async fn check_all(&self, domains: &[String]) -> Vec<crate::Result<CertificateInfo>> {
        let semaphore = Arc::new(Semaphore::new(self.max_concurrent_checks));
        let mut tasks = JoinSet::new();
        let mut task_index = HashMap::new();

        for (index, domain) in domains.iter().enumerate() {
            let semaphore = Arc::clone(&semaphore);
            let probe = Arc::clone(&self.probe);
            let domain = domain.clone();
            let threshold = self.threshold_days;

            let handle = tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                (index, check_cert(probe.as_ref(), &domain, threshold).await)
            });
            task_index.insert(handle.id(), index);
        }

        let mut results: Vec<Option<crate::Result<CertificateInfo>>> =
            domains.iter().map(|_| None).collect();
        while let Some(joined) = tasks.join_next_with_id().await {
            match joined {
                Ok((_, (index, result))) => results[index] = Some(result),
                Err(e) => {
                    tracing::error!("Certificate check task failed: {}", e);
                    if let Some(&index) = task_index.get(&e.id()) {
                        results[index] = Some(Err(crate::CertCheckerError::Unreachable {
                            domain: domains[index].clone(),
                            cause: format!("check task aborted: {}", e),
                        }));
                    }
                }
            }
        }

        results
            .into_iter()
            .zip(domains)
            .map(|(result, domain)| {
                result.unwrap_or_else(|| {
                    Err(crate::CertCheckerError::Unreachable {
                        domain: domain.clone(),
                        cause: "check did not complete".to_string(),
                    })
                })
            })
            .collect()
    }

    async fn handle_result(
        &self,
        domain: &str,
        info: CertificateInfo,
        now: DateTime<Utc>,
    ) -> DomainOutcome {
        let status = info.status();

        if status == CertStatus::Ok {
            if self.ledger.write().await.clear(domain) {
                tracing::info!("{}: certificate renewed, alert state cleared", domain);
            }
            return DomainOutcome::Healthy(info);
        }

        if !self.ledger.read().await.should_alert(domain, status, now) {
            tracing::debug!("{}: alert suppressed within repeat interval", domain);
            return DomainOutcome::Suppressed(info);
        }

        let message = AlertMessage::new(domain, &info);
        let result = self.dispatcher.send(&message).await;
        if self.delivered_anywhere(&result) {
            self.ledger.write().await.record(domain, status, now);
        }

        match result {
            Ok(()) => DomainOutcome::Alerted(info),
            Err(e) => {
                tracing::warn!("{}: alert delivery incomplete: {}", domain, e);
                DomainOutcome::AlertFailed {
                    info,
                    error: e.to_string(),
                }
            }
        }
    }

    /// True when at least one enabled channel accepted the alert
    fn delivered_anywhere(&self, result: &crate::Result<()>) -> bool {
        match result {
            Ok(()) => true,
            Err(CertCheckerError::Dispatch(failure)) => {
                failure.len() < self.dispatcher.enabled_channels().len()
            }
            Err(_) => false,
        }
    }
}
