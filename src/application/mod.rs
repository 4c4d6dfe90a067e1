//! Application layer - Commands, Queries, and Handlers.
//!
//! This layer orchestrates domain operations and coordinates between ports.
//! Commands go through the payment gateway before the ledger, never inside a
//! ledger transaction.

pub mod handlers;
mod pricing_resolver;
mod proration_calculator;

pub use pricing_resolver::PricingResolver;
pub use proration_calculator::{ProratedCredit, ProrationCalculator};

pub use handlers::{
    AddPricingRecordCommand, AddPricingRecordHandler, CancelSubscriptionCommand,
    CancelSubscriptionHandler, DowngradeSubscriptionCommand, DowngradeSubscriptionHandler,
    DraftSettings, GetActiveSubscriptionHandler, GetActiveSubscriptionQuery,
    HandlePaymentEventCommand, HandlePaymentEventHandler, HandlePaymentEventResult,
    ListInvoicesHandler, ListInvoicesQuery, SendRenewalRemindersCommand,
    SendRenewalRemindersHandler, SubscribeCommand, SubscribeHandler, SweepExpiredCommand,
    SweepExpiredHandler, UpgradeSubscriptionCommand, UpgradeSubscriptionHandler,
};
