//! Billing domain module.
//!
//! Invoices, subscriptions, pricing, and the rules that move a customer's
//! subscription through drafting, payment, renewal, upgrade and cancellation.
//!
//! # Module Structure
//!
//! - `catalog` - Customer, Plan, PricingRecord (read-side catalog)
//! - `currency` - CurrencyCode and minor-unit factors
//! - `charge` - Integer minor-unit charge computation
//! - `invoice` - Invoice entity and InvoiceStatus state machine
//! - `subscription` - Subscription entity and SubscriptionStatus state machine
//! - `proration` - Unused-time credit
//! - `reminder` - Renewal reminder policy

mod catalog;
mod charge;
mod currency;
mod errors;
mod invoice;
mod proration;
mod reminder;
mod subscription;

pub use catalog::{
    BillingInterval, Customer, Plan, PricingRecord, ResolvedPricing,
    MAX_BILLING_INTERVAL_MONTHS,
};
pub use charge::Charge;
pub use currency::CurrencyCode;
pub use errors::{BillingError, BillingErrorKind};
pub use invoice::{Invoice, InvoiceStatus, MarkFailedOutcome, MarkPaidOutcome};
pub use proration::unused_credit;
pub use reminder::{ReminderPolicy, ReminderRecord};
pub use subscription::{Subscription, SubscriptionStatus};
