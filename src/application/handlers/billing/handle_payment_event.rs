//! HandlePaymentEventHandler - Command handler for payment provider webhooks.

use std::sync::Arc;

use crate::domain::billing::{BillingError, MarkFailedOutcome, MarkPaidOutcome};
use crate::domain::foundation::{InvoiceId, SubscriptionId, Timestamp};
use crate::ports::{
    ActivationOutcome, BillingLedger, CatalogRepository, PaymentEvent, PaymentGateway,
};

/// Command to handle a payment webhook.
#[derive(Debug, Clone)]
pub struct HandlePaymentEventCommand {
    /// Raw webhook payload.
    pub payload: Vec<u8>,
    /// Webhook signature header.
    pub signature: String,
}

/// Result of webhook processing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandlePaymentEventResult {
    /// Invoice paid, subscription activated. `superseded` subscriptions were
    /// flipped to UPGRADED.
    Activated {
        invoice_id: InvoiceId,
        subscription_id: SubscriptionId,
        superseded: Vec<SubscriptionId>,
    },
    /// Renewal invoice paid; `previous` now links forward. `superseded` are
    /// earlier paid renewals of the same term.
    Renewed {
        invoice_id: InvoiceId,
        subscription_id: SubscriptionId,
        previous: Option<SubscriptionId>,
        superseded: Vec<SubscriptionId>,
    },
    /// Redelivery of an event already applied.
    AlreadyProcessed {
        invoice_id: InvoiceId,
        subscription_id: SubscriptionId,
    },
    /// Checkout failed or expired.
    PaymentFailed {
        invoice_id: InvoiceId,
        outcome: MarkFailedOutcome,
    },
    /// Verified event with no billing meaning.
    Ignored { event_type: String },
}

/// Handler for payment provider webhooks.
///
/// Only the session id from a verified event is trusted. Every branch is
/// idempotent so that webhook redelivery converges to the same state.
pub struct HandlePaymentEventHandler {
    ledger: Arc<dyn BillingLedger>,
    catalog: Arc<dyn CatalogRepository>,
    gateway: Arc<dyn PaymentGateway>,
}

impl HandlePaymentEventHandler {
    pub fn new(
        ledger: Arc<dyn BillingLedger>,
        catalog: Arc<dyn CatalogRepository>,
        gateway: Arc<dyn PaymentGateway>,
    ) -> Self {
        Self {
            ledger,
            catalog,
            gateway,
        }
    }

    pub async fn handle(
        &self,
        cmd: HandlePaymentEventCommand,
    ) -> Result<HandlePaymentEventResult, BillingError> {
        // 1. Verify signature and parse; nothing is written on failure
        let event = self
            .gateway
            .verify_webhook(&cmd.payload, &cmd.signature)
            .await
            .map_err(|e| {
                tracing::warn!(error = %e, "Rejected payment webhook");
                BillingError::from(e)
            })?;

        // 2. Dispatch on outcome
        match event {
            PaymentEvent::Completed { session_id } => self.handle_completed(&session_id).await,
            PaymentEvent::Failed { session_id } => self.handle_failed(&session_id).await,
            PaymentEvent::Unhandled { event_type } => {
                tracing::debug!(event_type = %event_type, "Ignoring payment event");
                Ok(HandlePaymentEventResult::Ignored { event_type })
            }
        }
    }

    async fn handle_completed(
        &self,
        session_id: &str,
    ) -> Result<HandlePaymentEventResult, BillingError> {
        let now = Timestamp::now();
        let invoice = self
            .ledger
            .find_invoice_by_session(session_id)
            .await?
            .ok_or_else(|| BillingError::invoice_not_found(session_id))?;

        // A plan deleted after checkout still defines the paid term
        let plan = self
            .catalog
            .find_plan(invoice.plan_id)
            .await?
            .ok_or(BillingError::PlanNotFound(invoice.plan_id))?;

        if self.ledger.mark_paid(invoice.id, now).await? == MarkPaidOutcome::AlreadyPaid {
            tracing::debug!(invoice_id = %invoice.id, "Invoice already paid");
        }

        let outcome = self
            .ledger
            .activate_or_renew(invoice.id, plan.billing_interval, now)
            .await?;

        let result = match outcome {
            ActivationOutcome::Activated {
                subscription_id,
                superseded,
            } => {
                tracing::info!(
                    customer_id = %invoice.customer_id,
                    invoice_id = %invoice.id,
                    subscription_id = %subscription_id,
                    superseded = superseded.len(),
                    "Subscription activated"
                );
                HandlePaymentEventResult::Activated {
                    invoice_id: invoice.id,
                    subscription_id,
                    superseded,
                }
            }
            ActivationOutcome::Renewed {
                subscription_id,
                previous,
                superseded,
            } => {
                tracing::info!(
                    customer_id = %invoice.customer_id,
                    invoice_id = %invoice.id,
                    subscription_id = %subscription_id,
                    superseded = superseded.len(),
                    "Subscription renewed"
                );
                HandlePaymentEventResult::Renewed {
                    invoice_id: invoice.id,
                    subscription_id,
                    previous,
                    superseded,
                }
            }
            ActivationOutcome::AlreadyActive { subscription_id } => {
                HandlePaymentEventResult::AlreadyProcessed {
                    invoice_id: invoice.id,
                    subscription_id,
                }
            }
        };
        Ok(result)
    }

    async fn handle_failed(
        &self,
        session_id: &str,
    ) -> Result<HandlePaymentEventResult, BillingError> {
        let invoice = self
            .ledger
            .find_invoice_by_session(session_id)
            .await?
            .ok_or_else(|| BillingError::invoice_not_found(session_id))?;

        let outcome = self.ledger.mark_failed(invoice.id).await?;
        match outcome {
            MarkFailedOutcome::IgnoredPaid => tracing::warn!(
                invoice_id = %invoice.id,
                "Failure event for a paid invoice ignored"
            ),
            MarkFailedOutcome::MarkedUnpaid => tracing::info!(
                customer_id = %invoice.customer_id,
                invoice_id = %invoice.id,
                "Invoice marked unpaid"
            ),
            MarkFailedOutcome::AlreadyUnpaid => {}
        }

        Ok(HandlePaymentEventResult::PaymentFailed {
            invoice_id: invoice.id,
            outcome,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::Fixture;
    use super::super::{
        DraftSettings, SubscribeCommand, SubscribeHandler, UpgradeSubscriptionCommand,
        UpgradeSubscriptionHandler,
    };
    use super::*;
    use crate::adapters::stripe::MockPaymentGateway;
    use crate::domain::billing::{InvoiceStatus, SubscriptionStatus};
    use crate::domain::foundation::PlanId;
    use rust_decimal::Decimal;

    fn handler(f: &Fixture) -> HandlePaymentEventHandler {
        HandlePaymentEventHandler::new(f.ledger.clone(), f.catalog.clone(), f.gateway.clone())
    }

    async fn subscribe(f: &Fixture, plan_id: PlanId) -> (InvoiceId, String) {
        let result = SubscribeHandler::new(
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
        let invoice = f.ledger.find_invoice(result.invoice_id).await.unwrap().unwrap();
        (invoice.id, invoice.provider_session_id)
    }

    fn completed(session_id: &str) -> HandlePaymentEventCommand {
        HandlePaymentEventCommand {
            payload: MockPaymentGateway::completed_payload(session_id),
            signature: "t=1,v1=00".to_string(),
        }
    }

    #[tokio::test]
    async fn completed_event_pays_and_activates() {
        let f = Fixture::new().await;
        let plan_id = f.standard_plan().await;
        let (invoice_id, session) = subscribe(&f, plan_id).await;

        let result = handler(&f).handle(completed(&session)).await.unwrap();
        assert!(matches!(result, HandlePaymentEventResult::Activated { .. }));

        let invoice = f.ledger.find_invoice(invoice_id).await.unwrap().unwrap();
        assert_eq!(invoice.status, InvoiceStatus::Paid);
        assert!(invoice.paid_at.is_some());

        let active = f
            .ledger
            .find_active_subscription(f.customer_id, Timestamp::now())
            .await
            .unwrap()
            .unwrap();
        let days = active
            .subscription
            .ends_at
            .duration_since(&active.subscription.starts_at)
            .num_days();
        assert_eq!(days, 30);
    }

    #[tokio::test]
    async fn redelivered_completed_event_is_idempotent() {
        let f = Fixture::new().await;
        let plan_id = f.standard_plan().await;
        let (invoice_id, session) = subscribe(&f, plan_id).await;
        let h = handler(&f);

        h.handle(completed(&session)).await.unwrap();
        let paid_once = f.ledger.find_invoice(invoice_id).await.unwrap().unwrap();
        let subs_once = f.ledger.subscriptions_for(f.customer_id).await;

        let again = h.handle(completed(&session)).await.unwrap();
        assert!(matches!(
            again,
            HandlePaymentEventResult::AlreadyProcessed { .. }
        ));
        assert_eq!(
            f.ledger.find_invoice(invoice_id).await.unwrap().unwrap(),
            paid_once
        );
        assert_eq!(f.ledger.subscriptions_for(f.customer_id).await, subs_once);
    }

    #[tokio::test]
    async fn failed_event_marks_unpaid_and_is_idempotent() {
        let f = Fixture::new().await;
        let plan_id = f.standard_plan().await;
        let (invoice_id, session) = subscribe(&f, plan_id).await;
        let h = handler(&f);
        let cmd = HandlePaymentEventCommand {
            payload: MockPaymentGateway::expired_payload(&session),
            signature: "sig".to_string(),
        };

        let first = h.handle(cmd.clone()).await.unwrap();
        assert_eq!(
            first,
            HandlePaymentEventResult::PaymentFailed {
                invoice_id,
                outcome: MarkFailedOutcome::MarkedUnpaid
            }
        );
        let second = h.handle(cmd).await.unwrap();
        assert_eq!(
            second,
            HandlePaymentEventResult::PaymentFailed {
                invoice_id,
                outcome: MarkFailedOutcome::AlreadyUnpaid
            }
        );
        let subs = f.ledger.subscriptions_for(f.customer_id).await;
        assert_eq!(subs[0].status, SubscriptionStatus::Inactive);
    }

    #[tokio::test]
    async fn failed_event_after_payment_leaves_invoice_paid() {
        let f = Fixture::new().await;
        let plan_id = f.standard_plan().await;
        let (invoice_id, session) = subscribe(&f, plan_id).await;
        let h = handler(&f);

        h.handle(completed(&session)).await.unwrap();
        let result = h
            .handle(HandlePaymentEventCommand {
                payload: MockPaymentGateway::expired_payload(&session),
                signature: "sig".to_string(),
            })
            .await
            .unwrap();

        assert!(matches!(
            result,
            HandlePaymentEventResult::PaymentFailed {
                outcome: MarkFailedOutcome::IgnoredPaid,
                ..
            }
        ));
        let invoice = f.ledger.find_invoice(invoice_id).await.unwrap().unwrap();
        assert_eq!(invoice.status, InvoiceStatus::Paid);
    }

    #[tokio::test]
    async fn invalid_signature_changes_nothing() {
        let mut f = Fixture::new().await;
        let plan_id = f.standard_plan().await;
        let (invoice_id, session) = subscribe(&f, plan_id).await;
        f.gateway = Arc::new(MockPaymentGateway::rejecting_webhooks());

        let err = handler(&f).handle(completed(&session)).await.unwrap_err();
        assert_eq!(err, BillingError::InvalidWebhookSignature);

        let invoice = f.ledger.find_invoice(invoice_id).await.unwrap().unwrap();
        assert_eq!(invoice.status, InvoiceStatus::Draft);
    }

    #[tokio::test]
    async fn unknown_session_is_not_found() {
        let f = Fixture::new().await;

        let err = handler(&f).handle(completed("cs_unknown")).await.unwrap_err();
        assert_eq!(err, BillingError::invoice_not_found("cs_unknown"));
    }

    #[tokio::test]
    async fn unhandled_events_are_ignored() {
        let f = Fixture::new().await;

        let result = handler(&f)
            .handle(HandlePaymentEventCommand {
                payload: MockPaymentGateway::checkout_event_payload("invoice.created", "in_1"),
                signature: "sig".to_string(),
            })
            .await
            .unwrap();

        assert_eq!(
            result,
            HandlePaymentEventResult::Ignored {
                event_type: "invoice.created".to_string()
            }
        );
    }

    #[tokio::test]
    async fn paid_upgrade_flips_previous_subscription() {
        let f = Fixture::new().await;
        let basic = f.standard_plan().await;
        let premium = f.plan(Decimal::new(3000, 2), Decimal::ZERO, 1).await;
        let h = handler(&f);

        let (_, first_session) = subscribe(&f, basic).await;
        h.handle(completed(&first_session)).await.unwrap();
        let original = f
            .ledger
            .find_active_subscription(f.customer_id, Timestamp::now())
            .await
            .unwrap()
            .unwrap()
            .subscription;

        let upgrade = UpgradeSubscriptionHandler::new(
            f.catalog.clone(),
            f.ledger.clone(),
            f.gateway.clone(),
            DraftSettings::default(),
        )
        .handle(UpgradeSubscriptionCommand {
            customer_id: f.customer_id,
            plan_id: premium,
        })
        .await
        .unwrap();

        // Upgrade takes effect only once paid
        let still = f.ledger.find_subscription(original.id).await.unwrap();
        assert_eq!(still.status, SubscriptionStatus::Active);

        let upgrade_invoice = f
            .ledger
            .find_invoice(upgrade.invoice_id)
            .await
            .unwrap()
            .unwrap();
        let result = h
            .handle(completed(&upgrade_invoice.provider_session_id))
            .await
            .unwrap();

        assert_eq!(
            result,
            HandlePaymentEventResult::Activated {
                invoice_id: upgrade.invoice_id,
                subscription_id: upgrade.subscription_id,
                superseded: vec![original.id],
            }
        );
        let old = f.ledger.find_subscription(original.id).await.unwrap();
        assert_eq!(old.status, SubscriptionStatus::Upgraded);

        let active = f
            .ledger
            .find_active_subscription(f.customer_id, Timestamp::now())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(active.subscription.plan_id, premium);
    }
}
