//! Background jobs: expired-draft sweep and renewal reminders.

mod billing_jobs;

pub use billing_jobs::{BillingJobRunner, BillingJobsConfig};
