//! Renewal reminder policy.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{CustomerId, Timestamp};

use super::Subscription;

/// Append-only log entry used to rate-limit renewal reminders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReminderRecord {
    pub customer_id: CustomerId,
    pub created_at: Timestamp,
}

/// When a subscription is due a renewal reminder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReminderPolicy {
    pub window_days: i64,
    pub cooldown_hours: i64,
}

impl Default for ReminderPolicy {
    fn default() -> Self {
        Self {
            window_days: 7,
            cooldown_hours: 48,
        }
    }
}

impl ReminderPolicy {
    pub fn new(window_days: i64, cooldown_hours: i64) -> Self {
        Self {
            window_days,
            cooldown_hours,
        }
    }

    /// Latest `ends_at` that falls inside the reminder window.
    pub fn window_end(&self, now: Timestamp) -> Timestamp {
        now.add_days(self.window_days)
    }

    /// Reminders at or after this instant block a new one.
    pub fn cooldown_start(&self, now: Timestamp) -> Timestamp {
        now.minus_hours(self.cooldown_hours)
    }

    /// Current, not cancelled, not renewed, and ending within the window.
    pub fn is_candidate(&self, subscription: &Subscription, now: Timestamp) -> bool {
        subscription.is_current_at(&now)
            && !subscription.is_cancelled()
            && !subscription.is_renewed()
            && !subscription.ends_at.is_after(&self.window_end(now))
    }

    pub fn cooldown_elapsed(&self, last_reminder: Option<Timestamp>, now: Timestamp) -> bool {
        match last_reminder {
            None => true,
            Some(last) => last.is_before(&self.cooldown_start(now)),
        }
    }
}
