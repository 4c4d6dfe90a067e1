//! Renewal notification adapters.

mod log_notifier;

pub use log_notifier::LogRenewalNotifier;
