//! Subscription Billing - subscription lifecycle and billing state machine
//!
//! Customers subscribe to plans through hosted checkout. A draft invoice is
//! created per checkout and becomes a paid invoice plus an active
//! subscription once the payment provider confirms the session. Upgrades
//! credit the unused part of the current period; downgrades and
//! cancellations apply at the next renewal. Unpaid drafts expire, and
//! customers near the end of a period receive a renewal reminder.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
