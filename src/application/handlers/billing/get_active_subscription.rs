//! GetActiveSubscriptionHandler - Query handler for the current subscription.

use std::sync::Arc;

use crate::domain::billing::BillingError;
use crate::domain::foundation::{CustomerId, Timestamp};
use crate::ports::{ActiveSubscription, BillingLedger};

#[derive(Debug, Clone)]
pub struct GetActiveSubscriptionQuery {
    pub customer_id: CustomerId,
}

/// `None` when the customer has no current ACTIVE subscription.
pub type GetActiveSubscriptionResult = Option<ActiveSubscription>;

pub struct GetActiveSubscriptionHandler {
    ledger: Arc<dyn BillingLedger>,
}

impl GetActiveSubscriptionHandler {
    pub fn new(ledger: Arc<dyn BillingLedger>) -> Self {
        Self { ledger }
    }

    pub async fn handle(
        &self,
        query: GetActiveSubscriptionQuery,
    ) -> Result<GetActiveSubscriptionResult, BillingError> {
        self.ledger
            .find_active_subscription(query.customer_id, Timestamp::now())
            .await
    }
}
