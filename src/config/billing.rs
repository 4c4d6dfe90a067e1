//! Billing lifecycle settings: draft expiry, reminders, job cadence.

use serde::Deserialize;
use std::time::Duration;

use crate::adapters::jobs::BillingJobsConfig;
use crate::application::handlers::DraftSettings;
use crate::domain::billing::ReminderPolicy;

use super::error::ValidationError;

/// Allowed draft lifetimes. The checkout session expires with the draft.
const DRAFT_TTL_MINUTES: std::ops::RangeInclusive<i64> = 30..=1440;

#[derive(Debug, Clone, Deserialize)]
pub struct BillingConfig {
    /// How long a draft invoice may stay unpaid before the sweep removes it
    #[serde(default = "default_draft_ttl_minutes")]
    pub draft_ttl_minutes: i64,

    /// Remind customers whose subscription ends within this many days
    #[serde(default = "default_reminder_window_days")]
    pub reminder_window_days: i64,

    /// Minimum gap between two reminders to one customer
    #[serde(default = "default_reminder_cooldown_hours")]
    pub reminder_cooldown_hours: i64,

    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,

    #[serde(default = "default_reminder_interval_secs")]
    pub reminder_interval_secs: u64,
}

impl BillingConfig {
    pub fn draft_settings(&self) -> DraftSettings {
        DraftSettings {
            draft_ttl_minutes: self.draft_ttl_minutes,
        }
    }

    pub fn reminder_policy(&self) -> ReminderPolicy {
        ReminderPolicy::new(self.reminder_window_days, self.reminder_cooldown_hours)
    }

    pub fn jobs_config(&self) -> BillingJobsConfig {
        BillingJobsConfig {
            sweep_interval: Duration::from_secs(self.sweep_interval_secs),
            reminder_interval: Duration::from_secs(self.reminder_interval_secs),
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.draft_ttl_minutes <= 0 {
            return Err(ValidationError::MustBePositive("billing.draft_ttl_minutes"));
        }
        if !DRAFT_TTL_MINUTES.contains(&self.draft_ttl_minutes) {
            return Err(ValidationError::InvalidDraftTtl);
        }
        if self.reminder_window_days <= 0 {
            return Err(ValidationError::MustBePositive("billing.reminder_window_days"));
        }
        if self.reminder_cooldown_hours <= 0 {
            return Err(ValidationError::MustBePositive(
                "billing.reminder_cooldown_hours",
            ));
        }
        if self.sweep_interval_secs == 0 {
            return Err(ValidationError::MustBePositive("billing.sweep_interval_secs"));
        }
        if self.reminder_interval_secs == 0 {
            return Err(ValidationError::MustBePositive(
                "billing.reminder_interval_secs",
            ));
        }
        Ok(())
    }
}

impl Default for BillingConfig {
    fn default() -> Self {
        Self {
            draft_ttl_minutes: default_draft_ttl_minutes(),
            reminder_window_days: default_reminder_window_days(),
            reminder_cooldown_hours: default_reminder_cooldown_hours(),
            sweep_interval_secs: default_sweep_interval_secs(),
            reminder_interval_secs: default_reminder_interval_secs(),
        }
    }
}

fn default_draft_ttl_minutes() -> i64 {
    120
}

fn default_reminder_window_days() -> i64 {
    7
}

fn default_reminder_cooldown_hours() -> i64 {
    48
}

fn default_sweep_interval_secs() -> u64 {
    300
}

fn default_reminder_interval_secs() -> u64 {
    3600
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_lifecycle_rules() {
        let config = BillingConfig::default();
        assert_eq!(config.draft_settings(), DraftSettings::default());
        assert_eq!(config.reminder_policy(), ReminderPolicy::default());
        assert_eq!(config.jobs_config().sweep_interval, Duration::from_secs(300));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn non_positive_values_are_rejected() {
        let config = BillingConfig {
            draft_ttl_minutes: 0,
            ..Default::default()
        };
        assert_eq!(
            config.validate(),
            Err(ValidationError::MustBePositive("billing.draft_ttl_minutes"))
        );

        let config = BillingConfig {
            reminder_interval_secs: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn draft_ttl_must_fit_a_checkout_session_lifetime() {
        for minutes in [29, 1441] {
            let config = BillingConfig {
                draft_ttl_minutes: minutes,
                ..Default::default()
            };
            assert_eq!(config.validate(), Err(ValidationError::InvalidDraftTtl));
        }
        for minutes in [30, 1440] {
            let config = BillingConfig {
                draft_ttl_minutes: minutes,
                ..Default::default()
            };
            assert!(config.validate().is_ok());
        }
    }
}
