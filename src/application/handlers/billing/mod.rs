//! Billing handlers.
//!
//! Command and query handlers for the subscription lifecycle:
//!
//! ## Commands
//! - Subscribing, upgrading, downgrading and cancelling
//! - Processing payment webhooks
//! - Sweeping expired drafts
//! - Sending renewal reminders
//! - Registering pricing records
//!
//! ## Queries
//! - Current active subscription
//! - Invoice history

mod add_pricing_record;
mod cancel_subscription;
mod downgrade_subscription;
mod draft_checkout;
mod get_active_subscription;
mod handle_payment_event;
mod list_invoices;
mod send_renewal_reminders;
mod subscribe;
mod sweep_expired;
mod upgrade_subscription;

#[cfg(test)]
mod test_support;

pub use draft_checkout::{DraftSettings, OpenedDraft, SettledDraft};

// Commands
pub use add_pricing_record::{
    AddPricingRecordCommand, AddPricingRecordHandler, AddPricingRecordResult,
};
pub use cancel_subscription::{
    CancelSubscriptionCommand, CancelSubscriptionHandler, CancelSubscriptionResult,
};
pub use downgrade_subscription::{
    DowngradeSubscriptionCommand, DowngradeSubscriptionHandler, DowngradeSubscriptionResult,
};
pub use handle_payment_event::{
    HandlePaymentEventCommand, HandlePaymentEventHandler, HandlePaymentEventResult,
};
pub use send_renewal_reminders::{
    ReminderFailure, SendRenewalRemindersCommand, SendRenewalRemindersHandler,
    SendRenewalRemindersResult,
};
pub use subscribe::{SubscribeCommand, SubscribeHandler, SubscribeResult};
pub use sweep_expired::{SweepExpiredCommand, SweepExpiredHandler};
pub use upgrade_subscription::{
    UpgradeSubscriptionCommand, UpgradeSubscriptionHandler, UpgradeSubscriptionResult,
};

// Queries
pub use get_active_subscription::{
    GetActiveSubscriptionHandler, GetActiveSubscriptionQuery, GetActiveSubscriptionResult,
};
pub use list_invoices::{ListInvoicesHandler, ListInvoicesQuery, ListInvoicesResult};
