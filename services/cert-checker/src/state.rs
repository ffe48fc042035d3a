//! In-memory record of recent alerts, used to suppress repeats

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;

use crate::certificate::CertStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct LastAlert {
    status: CertStatus,
    at: DateTime<Utc>,
}

/// Remembers when each domain was last alerted
#[derive(Debug)]
pub struct AlertLedger {
    repeat_interval: Duration,
    tolerance: Duration,
    last: HashMap<String, LastAlert>,
}

impl AlertLedger {
    /// A zero interval alerts on every cycle
    pub fn new(repeat_interval_hours: u64) -> Self {
        let hours = i64::try_from(repeat_interval_hours).unwrap_or(i64::MAX);
        Self {
            repeat_interval: Duration::try_hours(hours).unwrap_or(Duration::MAX),
            tolerance: Duration::zero(),
            last: HashMap::new(),
        }
    }

    /// Treat the interval as elapsed up to `seconds` early, absorbing cycle-to-cycle jitter
    pub fn with_tolerance_seconds(mut self, seconds: u64) -> Self {
        let seconds = i64::try_from(seconds).unwrap_or(i64::MAX);
        self.tolerance = Duration::try_seconds(seconds)
            .unwrap_or(Duration::zero())
            .min(self.repeat_interval);
        self
    }

    /// Whether `domain` in `status` should be alerted at `now`.
    ///
    /// A change of status (warning to expired) always alerts.
    pub fn should_alert(&self, domain: &str, status: CertStatus, now: DateTime<Utc>) -> bool {
        if status == CertStatus::Ok {
            return false;
        }
        match self.last.get(domain) {
            None => true,
            Some(last) if last.status != status => true,
            Some(last) => (now - last.at)
                .checked_add(&self.tolerance)
                .is_none_or(|elapsed| elapsed >= self.repeat_interval),
        }
    }

    pub fn record(&mut self, domain: &str, status: CertStatus, now: DateTime<Utc>) {
        self.last
            .insert(domain.to_string(), LastAlert { status, at: now });
    }

    /// Forget a domain whose certificate is healthy again
    pub fn clear(&mut self, domain: &str) -> bool {
        self.last.remove(domain).is_some()
    }

    pub fn len(&self) -> usize {
        self.last.len()
    }

    pub fn is_empty(&self) -> bool {
        self.last.is_empty()
    }
}

/// Thread-safe ledger handle
pub type LedgerHandle = Arc<RwLock<AlertLedger>>;

pub fn new_ledger_handle(repeat_interval_hours: u64, tolerance_seconds: u64) -> LedgerHandle {
    Arc::new(RwLock::new(
        AlertLedger::new(repeat_interval_hours).with_tolerance_seconds(tolerance_seconds),
    ))
}
