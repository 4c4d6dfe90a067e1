//! Billing ledger port.
//!
//! The ledger exclusively owns create and mutate access to invoices and
//! subscriptions. Every method is one short transaction; mutations touching a
//! customer's active subscription are serialized per customer so that at most
//! one subscription is ACTIVE for a customer at any instant.
//!
//! All methods take `now` explicitly so callers (and tests) control time.
//!
//! # Example
//!
//! ```ignore
//! let created = ledger.create_draft(NewDraft { /* ... */ }).await?;
//! // later, from the webhook
//! ledger.mark_paid(created.invoice_id, now).await?;
//! ledger.activate_or_renew(created.invoice_id, plan.billing_interval, now).await?;
//! ```

use async_trait::async_trait;

use crate::domain::billing::{
    BillingError, BillingInterval, Charge, CurrencyCode, Invoice, MarkFailedOutcome,
    MarkPaidOutcome, ReminderPolicy, ReminderRecord, Subscription,
};
use crate::domain::foundation::{CustomerId, InvoiceId, PlanId, SubscriptionId, Timestamp};

#[async_trait]
pub trait BillingLedger: Send + Sync {
    /// Inserts a DRAFT invoice and its INACTIVE subscription.
    ///
    /// For [`DraftPurpose::Upgrade`] the upgrade marker is written on the
    /// current subscription in the same transaction.
    ///
    /// # Errors
    ///
    /// - `NoActiveSubscription` for an upgrade without a current subscription
    async fn create_draft(&self, draft: NewDraft) -> Result<DraftCreated, BillingError>;

    async fn find_invoice(&self, id: InvoiceId) -> Result<Option<Invoice>, BillingError>;

    async fn find_invoice_by_session(
        &self,
        session_id: &str,
    ) -> Result<Option<Invoice>, BillingError>;

    /// DRAFT/UNPAID -> PAID. Idempotent for an already PAID invoice.
    ///
    /// # Errors
    ///
    /// - `InvoiceNotFound`
    /// - `InvalidState` if the invoice was swept
    async fn mark_paid(
        &self,
        invoice_id: InvoiceId,
        now: Timestamp,
    ) -> Result<MarkPaidOutcome, BillingError>;

    /// DRAFT -> UNPAID. A PAID invoice is left untouched.
    async fn mark_failed(&self, invoice_id: InvoiceId) -> Result<MarkFailedOutcome, BillingError>;

    /// Activates the subscription of a PAID invoice.
    ///
    /// First activation (start already passed) recomputes the window from
    /// `now`. A future start is a renewal and links the current subscription
    /// forward to the new one. Either way, every other ACTIVE subscription of
    /// the customer whose window overlaps the activated one, including an
    /// already paid future renewal, is flipped to UPGRADED.
    ///
    /// # Errors
    ///
    /// - `InvoiceNotFound`
    /// - `InvalidState` if the invoice is not PAID
    async fn activate_or_renew(
        &self,
        invoice_id: InvoiceId,
        interval: BillingInterval,
        now: Timestamp,
    ) -> Result<ActivationOutcome, BillingError>;

    /// Sets `downgraded_to_plan` on the current subscription.
    async fn record_downgrade(
        &self,
        customer_id: CustomerId,
        plan_id: PlanId,
        now: Timestamp,
    ) -> Result<Subscription, BillingError>;

    /// Sets `cancelled_at` on the current subscription, keeping an earlier one.
    async fn cancel(
        &self,
        customer_id: CustomerId,
        now: Timestamp,
    ) -> Result<Subscription, BillingError>;

    /// Soft-deletes expired unpaid invoices and their subscriptions, in one
    /// transaction. Rows already deleted are not touched again.
    async fn sweep_expired(&self, now: Timestamp) -> Result<SweepReport, BillingError>;

    /// The customer's current subscription at `at`, with its invoice.
    async fn find_active_subscription(
        &self,
        customer_id: CustomerId,
        at: Timestamp,
    ) -> Result<Option<ActiveSubscription>, BillingError>;

    /// All of a customer's invoices, newest first, including swept ones.
    async fn list_invoices(&self, customer_id: CustomerId) -> Result<Vec<Invoice>, BillingError>;

    /// Appends a reminder record, starting the customer's cooldown. Written
    /// only once a notice was delivered.
    async fn record_reminder(&self, reminder: ReminderRecord) -> Result<(), BillingError>;

    /// Current subscriptions due a renewal reminder under `policy`, excluding
    /// customers reminded within the cooldown.
    async fn find_renewal_candidates(
        &self,
        now: Timestamp,
        policy: ReminderPolicy,
    ) -> Result<Vec<ActiveSubscription>, BillingError>;
}

/// Why a draft is being created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DraftPurpose {
    Subscribe,
    Upgrade,
    Renewal,
}

/// Everything needed to persist a draft invoice and its subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewDraft {
    pub customer_id: CustomerId,
    pub plan_id: PlanId,
    pub currency: CurrencyCode,
    pub charge: Charge,
    pub starts_at: Timestamp,
    pub ends_at: Timestamp,
    pub provider_session_id: String,
    pub due_at: Timestamp,
    pub purpose: DraftPurpose,
    pub now: Timestamp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DraftCreated {
    pub invoice_id: InvoiceId,
    pub subscription_id: SubscriptionId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActivationOutcome {
    /// First activation. `superseded` were flipped to UPGRADED.
    Activated {
        subscription_id: SubscriptionId,
        superseded: Vec<SubscriptionId>,
    },
    /// Renewal. `previous` is the subscription that now links forward;
    /// `superseded` are earlier paid renewals for the same term.
    Renewed {
        subscription_id: SubscriptionId,
        previous: Option<SubscriptionId>,
        superseded: Vec<SubscriptionId>,
    },
    /// The subscription was already active; nothing changed.
    AlreadyActive { subscription_id: SubscriptionId },
}

impl ActivationOutcome {
    pub fn subscription_id(&self) -> SubscriptionId {
        match self {
            ActivationOutcome::Activated { subscription_id, .. }
            | ActivationOutcome::Renewed { subscription_id, .. }
            | ActivationOutcome::AlreadyActive { subscription_id } => *subscription_id,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub subscriptions: u64,
    pub invoices: u64,
}

impl SweepReport {
    pub fn is_empty(&self) -> bool {
        self.subscriptions == 0 && self.invoices == 0
    }
}

/// A current subscription together with the invoice that paid for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveSubscription {
    pub subscription: Subscription,
    pub invoice: Invoice,
}
