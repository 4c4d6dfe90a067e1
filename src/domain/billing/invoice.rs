//! Invoice entity and its payment status machine.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::foundation::{
    CustomerId, InvoiceId, PlanId, StateMachine, Timestamp, ValidationError,
};

use super::{BillingError, Charge, CurrencyCode};

/// Payment status of an invoice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InvoiceStatus {
    /// Awaiting checkout completion.
    Draft,
    /// Payment confirmed by the provider.
    Paid,
    /// Checkout failed or expired.
    Unpaid,
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Draft => "DRAFT",
            InvoiceStatus::Paid => "PAID",
            InvoiceStatus::Unpaid => "UNPAID",
        }
    }
}

impl fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InvoiceStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "DRAFT" => Ok(InvoiceStatus::Draft),
            "PAID" => Ok(InvoiceStatus::Paid),
            "UNPAID" => Ok(InvoiceStatus::Unpaid),
            other => Err(ValidationError::invalid_format(
                "invoice_status",
                format!("unknown status '{}'", other),
            )),
        }
    }
}

impl StateMachine for InvoiceStatus {
    // A late success may still arrive after a failed attempt
    const TRANSITIONS: &'static [(Self, Self)] = &[
        (InvoiceStatus::Draft, InvoiceStatus::Paid),
        (InvoiceStatus::Draft, InvoiceStatus::Unpaid),
        (InvoiceStatus::Unpaid, InvoiceStatus::Paid),
    ];

    fn label(&self) -> &'static str {
        self.as_str()
    }
}

/// What `mark_paid` actually did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkPaidOutcome {
    Paid,
    AlreadyPaid,
}

/// What `mark_failed` actually did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkFailedOutcome {
    MarkedUnpaid,
    AlreadyUnpaid,
    /// A failure arriving after success is ignored.
    IgnoredPaid,
}

/// An invoice for one subscription term.
///
/// Amounts are integer minor units. Once PAID, only `paid_at` is ever set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invoice {
    pub id: InvoiceId,
    pub customer_id: CustomerId,
    pub plan_id: PlanId,
    pub currency: CurrencyCode,
    pub tax_amount: i64,
    pub total_amount: i64,
    pub status: InvoiceStatus,
    pub due_at: Timestamp,
    pub paid_at: Option<Timestamp>,
    pub provider_session_id: String,
    pub created_at: Timestamp,
    pub deleted_at: Option<Timestamp>,
}

impl Invoice {
    /// Creates a DRAFT invoice tagged with the provider's checkout session.
    pub fn draft(
        customer_id: CustomerId,
        plan_id: PlanId,
        currency: CurrencyCode,
        charge: &Charge,
        provider_session_id: impl Into<String>,
        due_at: Timestamp,
        now: Timestamp,
    ) -> Self {
        Self {
            id: InvoiceId::new(),
            customer_id,
            plan_id,
            currency,
            tax_amount: charge.tax_amount,
            total_amount: charge.total_amount,
            status: InvoiceStatus::Draft,
            due_at,
            paid_at: None,
            provider_session_id: provider_session_id.into(),
            created_at: now,
            deleted_at: None,
        }
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Confirms payment. Re-applying to a PAID invoice is a no-op.
    pub fn mark_paid(&mut self, now: Timestamp) -> Result<MarkPaidOutcome, BillingError> {
        if self.status == InvoiceStatus::Paid {
            return Ok(MarkPaidOutcome::AlreadyPaid);
        }
        if self.is_deleted() {
            return Err(BillingError::invalid_state(
                "deleted",
                format!("mark invoice {} paid", self.id),
            ));
        }
        let current = self.status;
        self.status = current
            .transition_to(InvoiceStatus::Paid)
            .map_err(|e| BillingError::invalid_state(current.as_str(), e.to_string()))?;
        self.paid_at = Some(now);
        Ok(MarkPaidOutcome::Paid)
    }

    /// Records a failed checkout.
    pub fn mark_failed(&mut self) -> MarkFailedOutcome {
        match self.status {
            InvoiceStatus::Paid => MarkFailedOutcome::IgnoredPaid,
            InvoiceStatus::Unpaid => MarkFailedOutcome::AlreadyUnpaid,
            InvoiceStatus::Draft => {
                self.status = InvoiceStatus::Unpaid;
                MarkFailedOutcome::MarkedUnpaid
            }
        }
    }

    /// Unpaid past its due date and not yet swept.
    pub fn is_expired(&self, now: &Timestamp) -> bool {
        !self.is_deleted() && self.status != InvoiceStatus::Paid && now.is_after(&self.due_at)
    }
}
