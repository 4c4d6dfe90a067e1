//! SubscribeHandler - Command handler for starting a new subscription.

use std::sync::Arc;

use crate::application::PricingResolver;
use crate::domain::billing::{BillingError, Charge};
use crate::domain::foundation::{CustomerId, InvoiceId, PlanId, SubscriptionId, Timestamp};
use crate::ports::{BillingLedger, CatalogRepository, DraftPurpose, PaymentGateway};

use super::draft_checkout::{DraftCheckout, DraftRequest, DraftSettings};

#[derive(Debug, Clone)]
pub struct SubscribeCommand {
    pub customer_id: CustomerId,
    pub plan_id: PlanId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscribeResult {
    pub invoice_id: InvoiceId,
    pub subscription_id: SubscriptionId,
    pub checkout_url: String,
    pub charge: Charge,
}

/// Handler for subscribing a customer to a plan.
///
/// Prices the plan in the customer's currency, opens a checkout session for
/// the full term and records a DRAFT invoice with an INACTIVE subscription.
/// The subscription becomes ACTIVE when the payment webhook arrives.
pub struct SubscribeHandler {
    resolver: PricingResolver,
    ledger: Arc<dyn BillingLedger>,
    checkout: DraftCheckout,
}

impl SubscribeHandler {
    pub fn new(
        catalog: Arc<dyn CatalogRepository>,
        ledger: Arc<dyn BillingLedger>,
        gateway: Arc<dyn PaymentGateway>,
        settings: DraftSettings,
    ) -> Self {
        Self {
            resolver: PricingResolver::new(catalog),
            checkout: DraftCheckout::new(ledger.clone(), gateway, settings),
            ledger,
        }
    }

    pub async fn handle(&self, cmd: SubscribeCommand) -> Result<SubscribeResult, BillingError> {
        let now = Timestamp::now();

        // 1. Customer must exist and have chosen a currency
        let currency = self.resolver.customer_currency(cmd.customer_id).await?;

        // 2. Plan changes go through upgrade/downgrade
        if self
            .ledger
            .find_active_subscription(cmd.customer_id, now)
            .await?
            .is_some()
        {
            return Err(BillingError::invalid_state(
                "a subscription is active",
                "subscribe",
            ));
        }

        // 3. Price the full term
        let pricing = self.resolver.resolve(cmd.plan_id, currency, now).await?;
        let charge = Charge::for_term(&pricing)?;

        // 4. Checkout first, then persist the draft
        let opened = self
            .checkout
            .open(DraftRequest {
                customer_id: cmd.customer_id,
                pricing: &pricing,
                charge,
                starts_at: now,
                ends_at: pricing.billing_interval.period_end(now),
                purpose: DraftPurpose::Subscribe,
                now,
            })
            .await?;

        Ok(SubscribeResult {
            invoice_id: opened.invoice_id,
            subscription_id: opened.subscription_id,
            checkout_url: opened.checkout_url,
            charge: opened.charge,
        })
    }
}
