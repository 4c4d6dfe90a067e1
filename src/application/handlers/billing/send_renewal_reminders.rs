//! SendRenewalRemindersHandler - Batch command for renewal drafts and notices.

use std::sync::Arc;

use crate::application::PricingResolver;
use crate::domain::billing::{BillingError, Charge, ReminderPolicy, ReminderRecord};
use crate::domain::foundation::{CustomerId, Timestamp};
use crate::ports::{
    ActiveSubscription, BillingLedger, CatalogRepository, DraftPurpose, PaymentGateway,
    RenewalNotice, RenewalNotifier,
};

use super::draft_checkout::{DraftCheckout, DraftRequest, DraftSettings};

#[derive(Debug, Clone, Copy)]
pub struct SendRenewalRemindersCommand {
    pub now: Timestamp,
}

/// A customer whose reminder could not be completed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReminderFailure {
    pub customer_id: CustomerId,
    pub error: BillingError,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SendRenewalRemindersResult {
    pub sent: Vec<RenewalNotice>,
    pub failed: Vec<ReminderFailure>,
}

/// Handler for the periodic renewal reminder pass.
///
/// For every current subscription ending within the reminder window that is
/// neither cancelled nor already renewed, and whose customer was not reminded
/// within the cooldown, a renewal draft is created for the effective next plan
/// (the downgrade target if one was recorded) and a notice is sent. Each
/// customer is processed independently; failures are collected, not raised.
pub struct SendRenewalRemindersHandler {
    resolver: PricingResolver,
    ledger: Arc<dyn BillingLedger>,
    checkout: DraftCheckout,
    notifier: Arc<dyn RenewalNotifier>,
    policy: ReminderPolicy,
}

impl SendRenewalRemindersHandler {
    pub fn new(
        catalog: Arc<dyn CatalogRepository>,
        ledger: Arc<dyn BillingLedger>,
        gateway: Arc<dyn PaymentGateway>,
        notifier: Arc<dyn RenewalNotifier>,
        settings: DraftSettings,
        policy: ReminderPolicy,
    ) -> Self {
        Self {
            resolver: PricingResolver::new(catalog),
            checkout: DraftCheckout::new(ledger.clone(), gateway, settings),
            ledger,
            notifier,
            policy,
        }
    }

    pub async fn handle(
        &self,
        cmd: SendRenewalRemindersCommand,
    ) -> Result<SendRenewalRemindersResult, BillingError> {
        let candidates = self
            .ledger
            .find_renewal_candidates(cmd.now, self.policy)
            .await?;

        let mut result = SendRenewalRemindersResult::default();
        for candidate in &candidates {
            let customer_id = candidate.subscription.customer_id;
            match self.remind(candidate, cmd.now).await {
                Ok(notice) => result.sent.push(notice),
                Err(error) => {
                    tracing::warn!(
                        customer_id = %customer_id,
                        subscription_id = %candidate.subscription.id,
                        error = %error,
                        "Renewal reminder failed"
                    );
                    result.failed.push(ReminderFailure { customer_id, error });
                }
            }
        }

        tracing::info!(
            candidates = candidates.len(),
            sent = result.sent.len(),
            failed = result.failed.len(),
            "Renewal reminder pass finished"
        );

        Ok(result)
    }

    async fn remind(
        &self,
        candidate: &ActiveSubscription,
        now: Timestamp,
    ) -> Result<RenewalNotice, BillingError> {
        let current = &candidate.subscription;
        let plan_id = current.next_plan();

        let pricing = self
            .resolver
            .resolve(plan_id, candidate.invoice.currency, now)
            .await?;
        let charge = Charge::for_term(&pricing)?;

        // The renewal term follows the current one without overlap
        let starts_at = current.ends_at.plus_secs(1);
        let opened = self
            .checkout
            .open(DraftRequest {
                customer_id: current.customer_id,
                pricing: &pricing,
                charge,
                starts_at,
                ends_at: pricing.billing_interval.period_end(starts_at),
                purpose: DraftPurpose::Renewal,
                now,
            })
            .await?;

        let notice = RenewalNotice {
            customer_id: current.customer_id,
            invoice_id: opened.invoice_id,
            plan_id,
            checkout_url: opened.checkout_url,
            sent_at: now,
        };
        // The draft stays even if delivery fails; the customer can still pay it.
        // Only a delivered notice starts the cooldown.
        self.notifier.notify(notice.clone()).await?;
        self.ledger
            .record_reminder(ReminderRecord {
                customer_id: current.customer_id,
                created_at: now,
            })
            .await?;

        Ok(notice)
    }
}
