//! UTC instants used for billing terms, due dates and audit columns.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Always UTC. Serializes as RFC 3339.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(DateTime<Utc>);

/// Length of one billing month.
const DAYS_PER_MONTH: i64 = 30;

impl Timestamp {
    pub fn now() -> Self {
        Self(Utc::now())
    }

    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }

    pub fn as_datetime(&self) -> &DateTime<Utc> {
        &self.0
    }

    /// `None` outside chrono's representable range.
    pub fn from_unix_secs(secs: i64) -> Option<Self> {
        DateTime::<Utc>::from_timestamp(secs, 0).map(Self)
    }

    pub fn as_unix_secs(&self) -> i64 {
        self.0.timestamp()
    }

    pub fn is_before(&self, other: &Timestamp) -> bool {
        self < other
    }

    pub fn is_after(&self, other: &Timestamp) -> bool {
        self > other
    }

    /// Closed interval: both `start` and `end` are inside.
    pub fn is_within(&self, start: &Timestamp, end: &Timestamp) -> bool {
        start <= self && self <= end
    }

    /// Signed; negative when `other` is later.
    pub fn duration_since(&self, other: &Timestamp) -> Duration {
        self.0.signed_duration_since(other.0)
    }

    fn shifted(&self, by: Duration) -> Self {
        Self(self.0 + by)
    }

    /// Billing months are a flat 30 days.
    pub fn add_months(&self, months: i64) -> Self {
        self.add_days(months * DAYS_PER_MONTH)
    }

    pub fn add_days(&self, days: i64) -> Self {
        self.shifted(Duration::days(days))
    }

    pub fn minus_days(&self, days: i64) -> Self {
        self.shifted(-Duration::days(days))
    }

    pub fn plus_hours(&self, hours: i64) -> Self {
        self.shifted(Duration::hours(hours))
    }

    pub fn minus_hours(&self, hours: i64) -> Self {
        self.shifted(-Duration::hours(hours))
    }

    pub fn plus_minutes(&self, minutes: i64) -> Self {
        self.shifted(Duration::minutes(minutes))
    }

    pub fn plus_secs(&self, secs: i64) -> Self {
        self.shifted(Duration::seconds(secs))
    }
}

impl Default for Timestamp {
    fn default() -> Self {
        Self::now()
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0.to_rfc3339())
    }
}
