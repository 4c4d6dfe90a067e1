//! DowngradeSubscriptionHandler - Command handler for recording a downgrade.

use std::sync::Arc;

use crate::application::PricingResolver;
use crate::domain::billing::{BillingError, Subscription};
use crate::domain::foundation::{CustomerId, PlanId, Timestamp};
use crate::ports::{BillingLedger, CatalogRepository};

#[derive(Debug, Clone)]
pub struct DowngradeSubscriptionCommand {
    pub customer_id: CustomerId,
    pub plan_id: PlanId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DowngradeSubscriptionResult {
    pub subscription: Subscription,
}

/// Handler for downgrading at the next renewal.
///
/// Nothing is charged now. The target plan must be sold in the customer's
/// currency; the renewal reminder bills it in place of the current plan.
pub struct DowngradeSubscriptionHandler {
    resolver: PricingResolver,
    ledger: Arc<dyn BillingLedger>,
}

impl DowngradeSubscriptionHandler {
    pub fn new(catalog: Arc<dyn CatalogRepository>, ledger: Arc<dyn BillingLedger>) -> Self {
        Self {
            resolver: PricingResolver::new(catalog),
            ledger,
        }
    }

    pub async fn handle(
        &self,
        cmd: DowngradeSubscriptionCommand,
    ) -> Result<DowngradeSubscriptionResult, BillingError> {
        let now = Timestamp::now();

        let currency = self.resolver.customer_currency(cmd.customer_id).await?;
        let active = self
            .ledger
            .find_active_subscription(cmd.customer_id, now)
            .await?
            .ok_or(BillingError::NoActiveSubscription(cmd.customer_id))?;
        if active.subscription.plan_id == cmd.plan_id {
            return Err(BillingError::invalid_state(
                "already on this plan",
                "downgrade",
            ));
        }

        // Validates the plan is priced in the customer's currency
        self.resolver.resolve(cmd.plan_id, currency, now).await?;

        let subscription = self
            .ledger
            .record_downgrade(cmd.customer_id, cmd.plan_id, now)
            .await?;

        tracing::info!(
            customer_id = %cmd.customer_id,
            subscription_id = %subscription.id,
            plan_id = %cmd.plan_id,
            "Downgrade recorded for next renewal"
        );

        Ok(DowngradeSubscriptionResult { subscription })
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::Fixture;
    use super::super::{SubscribeCommand, SubscribeHandler};
    use super::*;
    use crate::application::handlers::billing::DraftSettings;
    use crate::domain::billing::{BillingInterval, CurrencyCode, PricingRecord, SubscriptionStatus};
    use crate::domain::foundation::ProductId;
    use rust_decimal::Decimal;

    async fn subscribed(f: &Fixture, plan_id: PlanId) {
        let sub = SubscribeHandler::new(
            f.catalog.clone(),
            f.ledger.clone(),
            f.gateway.clone(),
            DraftSettings::default(),
        )
        .handle(SubscribeCommand {
            customer_id: f.customer_id,
            plan_id,
        })
        .await
        .unwrap();
        let now = Timestamp::now();
        f.ledger.mark_paid(sub.invoice_id, now).await.unwrap();
        f.ledger
            .activate_or_renew(sub.invoice_id, BillingInterval::months(1).unwrap(), now)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn records_target_plan_without_charging() {
        let f = Fixture::new().await;
        let premium = f.plan(Decimal::new(3000, 2), Decimal::ZERO, 1).await;
        let basic = f.standard_plan().await;
        subscribed(&f, premium).await;
        f.gateway.clear_calls();

        let result = DowngradeSubscriptionHandler::new(f.catalog.clone(), f.ledger.clone())
            .handle(DowngradeSubscriptionCommand {
                customer_id: f.customer_id,
                plan_id: basic,
            })
            .await
            .unwrap();

        assert_eq!(result.subscription.downgraded_to_plan, Some(basic));
        assert_eq!(result.subscription.status, SubscriptionStatus::Active);
        assert_eq!(result.subscription.next_plan(), basic);
        assert!(f.gateway.calls().is_empty());
    }

    #[tokio::test]
    async fn plan_not_sold_in_currency_is_rejected() {
        let f = Fixture::new().await;
        let premium = f.standard_plan().await;
        subscribed(&f, premium).await;

        // A plan priced only in EUR
        let euro_plan = crate::domain::billing::Plan {
            id: PlanId::new(),
            product_id: ProductId::new(),
            name: "Euro".to_string(),
            billing_interval: BillingInterval::months(1).unwrap(),
            deleted_at: None,
        };
        let now = Timestamp::now();
        f.catalog
            .add_pricing_record(
                PricingRecord::new(
                    euro_plan.product_id,
                    CurrencyCode::new("EUR").unwrap(),
                    now.minus_days(1),
                    now.add_days(1),
                    Decimal::new(500, 2),
                    Decimal::ZERO,
                )
                .unwrap(),
            )
            .await
            .unwrap();
        f.catalog.insert_plan(euro_plan.clone()).await;

        let err = DowngradeSubscriptionHandler::new(f.catalog.clone(), f.ledger.clone())
            .handle(DowngradeSubscriptionCommand {
                customer_id: f.customer_id,
                plan_id: euro_plan.id,
            })
            .await
            .unwrap_err();

        assert!(matches!(err, BillingError::PlanCurrencyMismatch { .. }));
    }

    #[tokio::test]
    async fn requires_active_subscription() {
        let f = Fixture::new().await;
        let basic = f.standard_plan().await;

        let err = DowngradeSubscriptionHandler::new(f.catalog.clone(), f.ledger.clone())
            .handle(DowngradeSubscriptionCommand {
                customer_id: f.customer_id,
                plan_id: basic,
            })
            .await
            .unwrap_err();

        assert_eq!(err, BillingError::NoActiveSubscription(f.customer_id));
    }
}
