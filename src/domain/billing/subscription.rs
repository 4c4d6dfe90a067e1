//! Subscription entity and status machine.
//!
//! A subscription is one term bought by one invoice. Renewals and upgrades
//! create new rows; the old row keeps forward links (`renewed_subscription_id`,
//! `upgraded_to_plan`) stored as ids, never as owned references.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::foundation::{
    CustomerId, InvoiceId, PlanId, StateMachine, SubscriptionId, Timestamp, ValidationError,
};

use super::{BillingError, BillingInterval};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubscriptionStatus {
    /// Created with a draft invoice, not yet paid.
    Inactive,
    /// Paid and in force for `[starts_at, ends_at]`.
    Active,
    /// Replaced by a paid upgrade. Terminal.
    Upgraded,
}

impl SubscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::Inactive => "INACTIVE",
            SubscriptionStatus::Active => "ACTIVE",
            SubscriptionStatus::Upgraded => "UPGRADED",
        }
    }
}

impl fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SubscriptionStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "INACTIVE" => Ok(SubscriptionStatus::Inactive),
            "ACTIVE" => Ok(SubscriptionStatus::Active),
            "UPGRADED" => Ok(SubscriptionStatus::Upgraded),
            other => Err(ValidationError::invalid_format(
                "subscription_status",
                format!("unknown status '{}'", other),
            )),
        }
    }
}

impl StateMachine for SubscriptionStatus {
    const TRANSITIONS: &'static [(Self, Self)] = &[
        (SubscriptionStatus::Inactive, SubscriptionStatus::Active),
        (SubscriptionStatus::Active, SubscriptionStatus::Upgraded),
    ];

    fn label(&self) -> &'static str {
        self.as_str()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    pub id: SubscriptionId,
    pub customer_id: CustomerId,
    pub invoice_id: InvoiceId,
    pub plan_id: PlanId,
    pub status: SubscriptionStatus,
    pub starts_at: Timestamp,
    pub ends_at: Timestamp,
    pub renewed_at: Option<Timestamp>,
    pub renewed_subscription_id: Option<SubscriptionId>,
    pub upgraded_at: Option<Timestamp>,
    pub upgraded_to_plan: Option<PlanId>,
    pub downgraded_at: Option<Timestamp>,
    pub downgraded_to_plan: Option<PlanId>,
    pub cancelled_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub deleted_at: Option<Timestamp>,
}

impl Subscription {
    /// Creates the INACTIVE row that accompanies a draft invoice.
    pub fn inactive(
        customer_id: CustomerId,
        invoice_id: InvoiceId,
        plan_id: PlanId,
        starts_at: Timestamp,
        ends_at: Timestamp,
        now: Timestamp,
    ) -> Self {
        Self {
            id: SubscriptionId::new(),
            customer_id,
            invoice_id,
            plan_id,
            status: SubscriptionStatus::Inactive,
            starts_at,
            ends_at,
            renewed_at: None,
            renewed_subscription_id: None,
            upgraded_at: None,
            upgraded_to_plan: None,
            downgraded_at: None,
            downgraded_to_plan: None,
            cancelled_at: None,
            created_at: now,
            deleted_at: None,
        }
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// ACTIVE, not deleted, and `at` inside `[starts_at, ends_at]`.
    pub fn is_current_at(&self, at: &Timestamp) -> bool {
        self.status == SubscriptionStatus::Active
            && !self.is_deleted()
            && at.is_within(&self.starts_at, &self.ends_at)
    }

    /// ACTIVE, not deleted, and sharing at least one instant with
    /// `[starts_at, ends_at]`.
    pub fn overlaps_active(&self, starts_at: &Timestamp, ends_at: &Timestamp) -> bool {
        self.status == SubscriptionStatus::Active
            && !self.is_deleted()
            && !self.starts_at.is_after(ends_at)
            && !self.ends_at.is_before(starts_at)
    }

    /// A paid subscription whose start has already passed is a first
    /// activation; one that starts in the future is a renewal.
    pub fn is_first_activation(&self, now: &Timestamp) -> bool {
        !self.starts_at.is_after(now)
    }

    fn transition(&mut self, target: SubscriptionStatus, attempted: &str) -> Result<(), BillingError> {
        let current = self.status;
        self.status = current
            .transition_to(target)
            .map_err(|_| BillingError::invalid_state(current.as_str(), attempted))?;
        Ok(())
    }

    /// First activation: the term is recomputed from the moment of payment.
    pub fn activate_from(
        &mut self,
        now: Timestamp,
        interval: BillingInterval,
    ) -> Result<(), BillingError> {
        self.transition(SubscriptionStatus::Active, "activate subscription")?;
        self.starts_at = now;
        self.ends_at = interval.period_end(now);
        Ok(())
    }

    /// Renewal activation: the scheduled window is kept.
    pub fn activate_scheduled(&mut self) -> Result<(), BillingError> {
        self.transition(SubscriptionStatus::Active, "activate renewal")
    }

    /// Flips a replaced subscription to UPGRADED, keeping the first marker time.
    pub fn supersede(&mut self, now: Timestamp) -> Result<(), BillingError> {
        self.transition(SubscriptionStatus::Upgraded, "mark subscription upgraded")?;
        if self.upgraded_at.is_none() {
            self.upgraded_at = Some(now);
        }
        Ok(())
    }

    pub fn link_renewal(&mut self, next: SubscriptionId, now: Timestamp) {
        self.renewed_at = Some(now);
        self.renewed_subscription_id = Some(next);
    }

    pub fn record_upgrade_intent(&mut self, plan_id: PlanId, now: Timestamp) {
        self.upgraded_to_plan = Some(plan_id);
        self.upgraded_at = Some(now);
    }

    pub fn record_downgrade(&mut self, plan_id: PlanId, now: Timestamp) {
        self.downgraded_to_plan = Some(plan_id);
        self.downgraded_at = Some(now);
    }

    /// Returns false when the subscription was already cancelled.
    pub fn cancel(&mut self, now: Timestamp) -> bool {
        if self.cancelled_at.is_some() {
            return false;
        }
        self.cancelled_at = Some(now);
        true
    }

    /// Plan the next renewal should bill for.
    pub fn next_plan(&self) -> PlanId {
        self.downgraded_to_plan.unwrap_or(self.plan_id)
    }

    pub fn is_renewed(&self) -> bool {
        self.renewed_at.is_some() || self.renewed_subscription_id.is_some()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled_at.is_some()
    }
}
