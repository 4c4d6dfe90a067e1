//! Checkout-then-draft sequence shared by subscribe, upgrade and renewal.
//!
//! The payment provider is called first, outside any ledger transaction; the
//! draft invoice and its subscription are only written once a session exists.
//! A gateway failure therefore leaves nothing behind. The provider session
//! expires together with the draft, so a customer can never pay for a draft
//! the sweep already removed.

use std::sync::Arc;

use crate::domain::billing::{BillingError, Charge, ResolvedPricing};
use crate::domain::foundation::{CustomerId, InvoiceId, SubscriptionId, Timestamp};
use crate::ports::{
    ActivationOutcome, BillingLedger, CheckoutRequest, DraftPurpose, NewDraft, PaymentGateway,
};

/// How long a draft invoice waits for payment before the sweep removes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DraftSettings {
    pub draft_ttl_minutes: i64,
}

impl Default for DraftSettings {
    fn default() -> Self {
        Self {
            draft_ttl_minutes: 120,
        }
    }
}

/// A persisted draft with its checkout link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenedDraft {
    pub invoice_id: InvoiceId,
    pub subscription_id: SubscriptionId,
    pub session_id: String,
    pub checkout_url: String,
    pub charge: Charge,
}

/// A draft that needed no payment and was activated on the spot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettledDraft {
    pub invoice_id: InvoiceId,
    pub subscription_id: SubscriptionId,
    pub superseded: Vec<SubscriptionId>,
    pub charge: Charge,
}

pub(crate) struct DraftRequest<'a> {
    pub customer_id: CustomerId,
    pub pricing: &'a ResolvedPricing,
    pub charge: Charge,
    pub starts_at: Timestamp,
    pub ends_at: Timestamp,
    pub purpose: DraftPurpose,
    pub now: Timestamp,
}

#[derive(Clone)]
pub(crate) struct DraftCheckout {
    ledger: Arc<dyn BillingLedger>,
    gateway: Arc<dyn PaymentGateway>,
    settings: DraftSettings,
}

impl DraftCheckout {
    pub fn new(
        ledger: Arc<dyn BillingLedger>,
        gateway: Arc<dyn PaymentGateway>,
        settings: DraftSettings,
    ) -> Self {
        Self {
            ledger,
            gateway,
            settings,
        }
    }

    pub async fn open(&self, req: DraftRequest<'_>) -> Result<OpenedDraft, BillingError> {
        let months = req.pricing.billing_interval.as_months();
        let line_name = match req.purpose {
            DraftPurpose::Upgrade => "Subscription Plan Upgrade",
            DraftPurpose::Subscribe | DraftPurpose::Renewal => "Subscription Plan",
        };

        let due_at = self.due_at(req.now);

        let session = self
            .gateway
            .create_checkout_session(CheckoutRequest {
                amount_minor: req.charge.total_amount,
                currency: req.pricing.currency,
                line_name: line_name.to_string(),
                description: format!("Plan {} for {} month(s)", req.pricing.plan_id, months),
                expires_at: due_at,
            })
            .await
            .map_err(|e| {
                tracing::warn!(
                    customer_id = %req.customer_id,
                    plan_id = %req.pricing.plan_id,
                    error = %e,
                    "Checkout session creation failed"
                );
                BillingError::from(e)
            })?;

        let created = self
            .ledger
            .create_draft(NewDraft {
                customer_id: req.customer_id,
                plan_id: req.pricing.plan_id,
                currency: req.pricing.currency,
                charge: req.charge,
                starts_at: req.starts_at,
                ends_at: req.ends_at,
                provider_session_id: session.session_id.clone(),
                due_at,
                purpose: req.purpose,
                now: req.now,
            })
            .await?;

        tracing::info!(
            customer_id = %req.customer_id,
            invoice_id = %created.invoice_id,
            session_id = %session.session_id,
            total_amount = req.charge.total_amount,
            purpose = ?req.purpose,
            "Draft invoice created"
        );

        Ok(OpenedDraft {
            invoice_id: created.invoice_id,
            subscription_id: created.subscription_id,
            session_id: session.session_id,
            checkout_url: session.checkout_url,
            charge: req.charge,
        })
    }

    /// Writes, pays and activates a draft whose total is zero.
    ///
    /// No provider session exists for it; the invoice carries a local
    /// `no_charge_` reference so session lookups never match it.
    pub async fn settle_without_payment(
        &self,
        req: DraftRequest<'_>,
    ) -> Result<SettledDraft, BillingError> {
        if req.charge.total_amount != 0 {
            return Err(BillingError::invalid_state(
                format!("total {}", req.charge.total_amount),
                "settle draft without payment",
            ));
        }

        let created = self
            .ledger
            .create_draft(NewDraft {
                customer_id: req.customer_id,
                plan_id: req.pricing.plan_id,
                currency: req.pricing.currency,
                charge: req.charge,
                starts_at: req.starts_at,
                ends_at: req.ends_at,
                provider_session_id: format!("no_charge_{}", uuid::Uuid::new_v4().simple()),
                due_at: self.due_at(req.now),
                purpose: req.purpose,
                now: req.now,
            })
            .await?;

        self.ledger.mark_paid(created.invoice_id, req.now).await?;
        let superseded = match self
            .ledger
            .activate_or_renew(created.invoice_id, req.pricing.billing_interval, req.now)
            .await?
        {
            ActivationOutcome::Activated { superseded, .. }
            | ActivationOutcome::Renewed { superseded, .. } => superseded,
        };

        tracing::info!(
            customer_id = %req.customer_id,
            invoice_id = %created.invoice_id,
            subscription_id = %created.subscription_id,
            superseded = superseded.len(),
            purpose = ?req.purpose,
            "Zero-total draft settled without checkout"
        );

        Ok(SettledDraft {
            invoice_id: created.invoice_id,
            subscription_id: created.subscription_id,
            superseded,
            charge: req.charge,
        })
    }

    fn due_at(&self, now: Timestamp) -> Timestamp {
        now.plus_minutes(self.settings.draft_ttl_minutes)
    }
}
