//! Daily trigger computation

use std::time::Duration;

use chrono::{DateTime, Days, LocalResult, NaiveDateTime, NaiveTime, TimeZone};

/// Fires once a day at a fixed local wall-clock time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DailySchedule {
    at: NaiveTime,
}

impl DailySchedule {
    pub fn new(at: NaiveTime) -> Self {
        Self { at }
    }

    /// Parse `HH:MM` or `HH:MM:SS`
    pub fn parse(value: &str) -> crate::Result<Self> {
        let value = value.trim();
        NaiveTime::parse_from_str(value, "%H:%M:%S")
            .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M"))
            .map(Self::new)
            .map_err(|e| {
                crate::CertCheckerError::Config(format!(
                    "Invalid schedule time '{}': {}",
                    value, e
                ))
            })
    }

    pub fn time(&self) -> NaiveTime {
        self.at
    }

    /// The first firing strictly after `now`
    pub fn next_after<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> DateTime<Tz> {
        let tz = now.timezone();
        let today = now.naive_local().date();

        for offset in 0..=2u64 {
            let Some(day) = today.checked_add_days(Days::new(offset)) else {
                break;
            };
            let candidate = NaiveDateTime::new(day, self.at);
            let resolved = match tz.from_local_datetime(&candidate) {
                LocalResult::Single(t) => Some(t),
                LocalResult::Ambiguous(earliest, _) => Some(earliest),
                // Skipped by a DST jump; fire an hour later on that day
                LocalResult::None => tz
                    .from_local_datetime(&(candidate + chrono::Duration::hours(1)))
                    .earliest(),
            };
            if let Some(t) = resolved {
                if t > *now {
                    return t;
                }
            }
        }

        now.clone() + chrono::Duration::days(1)
    }

    /// How long to sleep from `now` until the next firing
    pub fn delay_from<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> Duration {
        (self.next_after(now) - now.clone())
            .to_std()
            .unwrap_or_default()
    }
}
