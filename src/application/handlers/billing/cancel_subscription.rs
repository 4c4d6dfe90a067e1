//! CancelSubscriptionHandler - Command handler for cancelling at term end.

use std::sync::Arc;

use crate::domain::billing::{BillingError, Subscription};
use crate::domain::foundation::{CustomerId, Timestamp};
use crate::ports::BillingLedger;

#[derive(Debug, Clone)]
pub struct CancelSubscriptionCommand {
    pub customer_id: CustomerId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CancelSubscriptionResult {
    pub subscription: Subscription,
}

/// Handler for cancelling a subscription.
///
/// The subscription keeps running until `ends_at`; cancellation only stops
/// renewal reminders. Cancelling twice keeps the first timestamp.
pub struct CancelSubscriptionHandler {
    ledger: Arc<dyn BillingLedger>,
}

impl CancelSubscriptionHandler {
    pub fn new(ledger: Arc<dyn BillingLedger>) -> Self {
        Self { ledger }
    }

    pub async fn handle(
        &self,
        cmd: CancelSubscriptionCommand,
    ) -> Result<CancelSubscriptionResult, BillingError> {
        let subscription = self.ledger.cancel(cmd.customer_id, Timestamp::now()).await?;

        tracing::info!(
            customer_id = %cmd.customer_id,
            subscription_id = %subscription.id,
            ends_at = %subscription.ends_at,
            "Subscription cancelled at term end"
        );

        Ok(CancelSubscriptionResult { subscription })
    }
}
