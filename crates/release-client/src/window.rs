//! Half-open query windows.

use chrono::{DateTime, Duration, SecondsFormat, Utc};

use crate::error::ConfigError;

/// `[since, until)`: inclusive of `since`, exclusive of `until`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    since: DateTime<Utc>,
    until: DateTime<Utc>,
}

impl TimeWindow {
    pub fn new(since: DateTime<Utc>, until: DateTime<Utc>) -> Result<Self, ConfigError> {
        if since > until {
            return Err(ConfigError::SinceAfterUntil { since, until });
        }
        Ok(Self { since, until })
    }

    /// The `step`-long window ending `offset` before `anchor`.
    ///
    /// Returns `None` when the arithmetic leaves chrono's representable range
    /// or `step` is negative.
    pub fn ending_before(anchor: DateTime<Utc>, offset: Duration, step: Duration) -> Option<Self> {
        let until = anchor.checked_sub_signed(offset)?;
        let since = until.checked_sub_signed(step)?;
        Self::new(since, until).ok()
    }

    pub fn since(&self) -> DateTime<Utc> {
        self.since
    }

    pub fn until(&self) -> DateTime<Utc> {
        self.until
    }

    pub fn contains(&self, t: DateTime<Utc>) -> bool {
        self.since <= t && t < self.until
    }
}

impl std::fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{}, {})",
            self.since.to_rfc3339_opts(SecondsFormat::Secs, true),
            self.until.to_rfc3339_opts(SecondsFormat::Secs, true)
        )
    }
}
