//! UpgradeSubscriptionHandler - Command handler for moving to a new plan now.

use std::sync::Arc;

use crate::application::{PricingResolver, ProrationCalculator};
use crate::domain::billing::{BillingError, Charge};
use crate::domain::foundation::{CustomerId, InvoiceId, PlanId, SubscriptionId, Timestamp};
use crate::ports::{BillingLedger, CatalogRepository, DraftPurpose, PaymentGateway};

use super::draft_checkout::{DraftCheckout, DraftRequest, DraftSettings};

#[derive(Debug, Clone)]
pub struct UpgradeSubscriptionCommand {
    pub customer_id: CustomerId,
    pub plan_id: PlanId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpgradeSubscriptionResult {
    pub invoice_id: InvoiceId,
    pub subscription_id: SubscriptionId,
    /// The subscription being replaced.
    pub previous_subscription_id: SubscriptionId,
    /// `None` when the credit covered the whole charge and the upgrade was
    /// activated without checkout.
    pub checkout_url: Option<String>,
    pub charge: Charge,
}

/// Handler for upgrading an active subscription.
///
/// The unused value of the current term is credited against the new plan's
/// full-term total (both in minor units). The current subscription gets its
/// `upgraded_to_plan` marker with the draft, but stays ACTIVE until the new
/// invoice is paid. When nothing is left to pay the upgrade is settled at once
/// instead, since the provider refuses zero-amount checkouts.
///
/// A subscription whose next term is already paid cannot be upgraded.
pub struct UpgradeSubscriptionHandler {
    resolver: PricingResolver,
    ledger: Arc<dyn BillingLedger>,
    checkout: DraftCheckout,
}

impl UpgradeSubscriptionHandler {
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

    pub async fn handle(
        &self,
        cmd: UpgradeSubscriptionCommand,
    ) -> Result<UpgradeSubscriptionResult, BillingError> {
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
                "upgrade",
            ));
        }
        if active.subscription.is_renewed() {
            return Err(BillingError::invalid_state(
                "next term already paid",
                "upgrade",
            ));
        }

        let pricing = self.resolver.resolve(cmd.plan_id, currency, now).await?;
        let prorated = ProrationCalculator::for_subscription(&active, now)?;
        let charge = Charge::for_term(&pricing)?.with_credit(prorated.credit);

        tracing::debug!(
            customer_id = %cmd.customer_id,
            subscription_id = %active.subscription.id,
            credit = prorated.credit,
            total_amount = charge.total_amount,
            "Upgrade priced with unused credit"
        );

        let request = DraftRequest {
            customer_id: cmd.customer_id,
            pricing: &pricing,
            charge,
            starts_at: now,
            ends_at: pricing.billing_interval.period_end(now),
            purpose: DraftPurpose::Upgrade,
            now,
        };

        if charge.total_amount == 0 {
            let settled = self.checkout.settle_without_payment(request).await?;
            return Ok(UpgradeSubscriptionResult {
                invoice_id: settled.invoice_id,
                subscription_id: settled.subscription_id,
                previous_subscription_id: active.subscription.id,
                checkout_url: None,
                charge: settled.charge,
            });
        }

        let opened = self.checkout.open(request).await?;

        Ok(UpgradeSubscriptionResult {
            invoice_id: opened.invoice_id,
            subscription_id: opened.subscription_id,
            previous_subscription_id: active.subscription.id,
            checkout_url: Some(opened.checkout_url),
            charge: opened.charge,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::Fixture;
    use super::*;
    use crate::domain::billing::{
        CurrencyCode, Invoice, InvoiceStatus, Subscription, SubscriptionStatus,
    };
    use crate::ports::PaymentError;
    use rust_decimal::Decimal;

    fn handler(f: &Fixture) -> UpgradeSubscriptionHandler {
        UpgradeSubscriptionHandler::new(
            f.catalog.clone(),
            f.ledger.clone(),
            f.gateway.clone(),
            DraftSettings::default(),
        )
    }

    /// Seeds a paid, active subscription on `plan_id` that started `elapsed_days`
    /// ago and runs 30 days, paid 1100 with 100 tax.
    async fn seed_active(f: &Fixture, plan_id: PlanId, elapsed_days: i64) -> Subscription {
        let starts = Timestamp::now().minus_days(elapsed_days);
        let charge = Charge {
            subtotal: 1000,
            tax_amount: 100,
            credit_applied: 0,
            total_amount: 1100,
        };
        let mut invoice = Invoice::draft(
            f.customer_id,
            plan_id,
            CurrencyCode::new("USD").unwrap(),
            &charge,
            format!("cs_seed_{}", plan_id),
            starts.plus_hours(2),
            starts,
        );
        invoice.mark_paid(starts).unwrap();
        let mut sub = Subscription::inactive(
            f.customer_id,
            invoice.id,
            plan_id,
            starts,
            starts.add_days(30),
            starts,
        );
        sub.activate_scheduled().unwrap();
        f.ledger.seed(invoice, sub.clone()).await;
        sub
    }

    #[tokio::test]
    async fn credits_unused_time_and_marks_intent() {
        let f = Fixture::new().await;
        let basic = f.standard_plan().await;
        let premium = f.plan(Decimal::new(3000, 2), Decimal::new(10, 0), 1).await;
        let current = seed_active(&f, basic, 15).await;

        let result = handler(&f)
            .handle(UpgradeSubscriptionCommand {
                customer_id: f.customer_id,
                plan_id: premium,
            })
            .await
            .unwrap();

        // 3000 + 300 tax, minus ~500 credit for half of 1000
        assert_eq!(result.charge.subtotal, 3000);
        assert_eq!(result.charge.tax_amount, 300);
        assert!((499..=500).contains(&result.charge.credit_applied));
        assert_eq!(
            result.charge.total_amount,
            3300 - result.charge.credit_applied
        );
        assert_eq!(result.previous_subscription_id, current.id);

        let old = f.ledger.find_subscription(current.id).await.unwrap();
        assert_eq!(old.status, SubscriptionStatus::Active);
        assert_eq!(old.upgraded_to_plan, Some(premium));
        assert!(old.upgraded_at.is_some());

        let request = f.gateway.last_checkout_request().unwrap();
        assert_eq!(request.line_name, "Subscription Plan Upgrade");
        assert_eq!(request.amount_minor, result.charge.total_amount);
        assert!(result.checkout_url.is_some());
    }

    #[tokio::test]
    async fn credit_larger_than_new_total_floors_at_zero() {
        let f = Fixture::new().await;
        let basic = f.standard_plan().await;
        let cheap = f.plan(Decimal::new(100, 2), Decimal::ZERO, 1).await;
        seed_active(&f, basic, 1).await;

        let result = handler(&f)
            .handle(UpgradeSubscriptionCommand {
                customer_id: f.customer_id,
                plan_id: cheap,
            })
            .await
            .unwrap();

        assert_eq!(result.charge.total_amount, 0);
        assert_eq!(result.charge.credit_applied, 100);
    }

    #[tokio::test]
    async fn zero_total_upgrade_activates_without_checkout() {
        let f = Fixture::new().await;
        let basic = f.standard_plan().await;
        let cheap = f.plan(Decimal::new(100, 2), Decimal::ZERO, 1).await;
        let current = seed_active(&f, basic, 1).await;

        let result = handler(&f)
            .handle(UpgradeSubscriptionCommand {
                customer_id: f.customer_id,
                plan_id: cheap,
            })
            .await
            .unwrap();

        assert_eq!(result.checkout_url, None);
        assert!(!f.gateway.was_called("create_checkout_session"));

        let invoice = f.ledger.find_invoice(result.invoice_id).await.unwrap().unwrap();
        assert_eq!(invoice.status, InvoiceStatus::Paid);
        assert_eq!(invoice.total_amount, 0);
        assert!(invoice.provider_session_id.starts_with("no_charge_"));

        let old = f.ledger.find_subscription(current.id).await.unwrap();
        assert_eq!(old.status, SubscriptionStatus::Upgraded);
        let active = f
            .ledger
            .find_active_subscription(f.customer_id, Timestamp::now())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(active.subscription.id, result.subscription_id);
        assert_eq!(active.subscription.plan_id, cheap);
    }

    #[tokio::test]
    async fn subscription_with_paid_renewal_cannot_be_upgraded() {
        let f = Fixture::new().await;
        let basic = f.standard_plan().await;
        let premium = f.plan(Decimal::new(3000, 2), Decimal::ZERO, 1).await;
        let mut current = seed_active(&f, basic, 25).await;
        current.link_renewal(SubscriptionId::new(), Timestamp::now());
        let invoice = f.ledger.find_invoice(current.invoice_id).await.unwrap().unwrap();
        f.ledger.seed(invoice, current.clone()).await;

        let err = handler(&f)
            .handle(UpgradeSubscriptionCommand {
                customer_id: f.customer_id,
                plan_id: premium,
            })
            .await
            .unwrap_err();

        assert!(matches!(err, BillingError::InvalidState { .. }));
        assert!(!f.gateway.was_called("create_checkout_session"));
        let old = f.ledger.find_subscription(current.id).await.unwrap();
        assert_eq!(old.upgraded_to_plan, None);
    }

    #[tokio::test]
    async fn requires_active_subscription() {
        let f = Fixture::new().await;
        let premium = f.standard_plan().await;

        let err = handler(&f)
            .handle(UpgradeSubscriptionCommand {
                customer_id: f.customer_id,
                plan_id: premium,
            })
            .await
            .unwrap_err();

        assert_eq!(err, BillingError::NoActiveSubscription(f.customer_id));
        assert!(!f.gateway.was_called("create_checkout_session"));
    }

    #[tokio::test]
    async fn same_plan_is_rejected() {
        let f = Fixture::new().await;
        let basic = f.standard_plan().await;
        seed_active(&f, basic, 3).await;

        let err = handler(&f)
            .handle(UpgradeSubscriptionCommand {
                customer_id: f.customer_id,
                plan_id: basic,
            })
            .await
            .unwrap_err();

        assert!(matches!(err, BillingError::InvalidState { .. }));
    }

    #[tokio::test]
    async fn gateway_failure_leaves_current_subscription_untouched() {
        let f = Fixture::new().await;
        let basic = f.standard_plan().await;
        let premium = f.plan(Decimal::new(3000, 2), Decimal::ZERO, 1).await;
        let current = seed_active(&f, basic, 3).await;
        f.gateway.set_error(PaymentError::provider("card processor down"));

        let err = handler(&f)
            .handle(UpgradeSubscriptionCommand {
                customer_id: f.customer_id,
                plan_id: premium,
            })
            .await
            .unwrap_err();

        assert!(matches!(err, BillingError::Gateway { .. }));
        let old = f.ledger.find_subscription(current.id).await.unwrap();
        assert_eq!(old.upgraded_to_plan, None);
        assert_eq!(f.ledger.subscriptions_for(f.customer_id).await.len(), 1);
    }
}
