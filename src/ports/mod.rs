//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the domain and the outside world. Adapters implement these ports.
//!
//! - `BillingLedger` - Atomic invoice and subscription state transitions
//! - `CatalogRepository` - Customers, plans and time-bounded pricing
//! - `PaymentGateway` - Hosted checkout sessions and webhook verification
//! - `RenewalNotifier` - Delivery of renewal reminders

mod billing_ledger;
mod catalog_repository;
mod payment_gateway;
mod renewal_notifier;

pub use billing_ledger::{
    ActivationOutcome, ActiveSubscription, BillingLedger, DraftCreated, DraftPurpose, NewDraft,
    SweepReport,
};
pub use catalog_repository::CatalogRepository;
pub use payment_gateway::{
    CheckoutRequest, CheckoutSession, PaymentError, PaymentErrorCode, PaymentEvent,
    PaymentGateway,
};
pub use renewal_notifier::{RenewalNotice, RenewalNotifier};
