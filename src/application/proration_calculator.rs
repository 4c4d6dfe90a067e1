//! ProrationCalculator - unused credit on a customer's current subscription.

use std::sync::Arc;

use crate::domain::billing::{unused_credit, BillingError};
use crate::domain::foundation::{CustomerId, SubscriptionId, Timestamp};
use crate::ports::{ActiveSubscription, BillingLedger};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProratedCredit {
    pub subscription_id: SubscriptionId,
    /// Minor units.
    pub credit: i64,
}

#[derive(Clone)]
pub struct ProrationCalculator {
    ledger: Arc<dyn BillingLedger>,
}

impl ProrationCalculator {
    pub fn new(ledger: Arc<dyn BillingLedger>) -> Self {
        Self { ledger }
    }

    /// Looks up the current subscription and prorates it.
    pub async fn unused_credit(
        &self,
        customer_id: CustomerId,
        as_of: Timestamp,
    ) -> Result<ProratedCredit, BillingError> {
        let active = self
            .ledger
            .find_active_subscription(customer_id, as_of)
            .await?
            .ok_or(BillingError::NoActiveSubscription(customer_id))?;
        Self::for_subscription(&active, as_of)
    }

    /// Prorates an already loaded subscription.
    pub fn for_subscription(
        active: &ActiveSubscription,
        as_of: Timestamp,
    ) -> Result<ProratedCredit, BillingError> {
        let credit = unused_credit(&active.subscription, &active.invoice, as_of)?;
        Ok(ProratedCredit {
            subscription_id: active.subscription.id,
            credit,
        })
    }
}
