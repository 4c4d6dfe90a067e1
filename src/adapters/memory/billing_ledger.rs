//! In-memory billing ledger for testing and local development.
//!
//! A single mutex guards all invoices, subscriptions and reminders, so every
//! operation is trivially atomic and serialized. Not suitable for
//! multi-process deployments.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::domain::billing::{
    BillingError, BillingInterval, Invoice, InvoiceStatus, MarkFailedOutcome, MarkPaidOutcome,
    ReminderPolicy, ReminderRecord, Subscription, SubscriptionStatus,
};
use crate::domain::foundation::{CustomerId, InvoiceId, PlanId, SubscriptionId, Timestamp};
use crate::ports::{
    ActivationOutcome, ActiveSubscription, BillingLedger, DraftCreated, DraftPurpose, NewDraft,
    SweepReport,
};

#[derive(Debug, Default)]
struct LedgerState {
    invoices: HashMap<InvoiceId, Invoice>,
    subscriptions: HashMap<SubscriptionId, Subscription>,
    reminders: Vec<ReminderRecord>,
}

impl LedgerState {
    fn current_id(&self, customer_id: CustomerId, at: &Timestamp) -> Option<SubscriptionId> {
        self.subscriptions
            .values()
            .filter(|s| s.customer_id == customer_id && s.is_current_at(at))
            .max_by_key(|s| s.starts_at)
            .map(|s| s.id)
    }

    fn current_mut(
        &mut self,
        customer_id: CustomerId,
        at: &Timestamp,
    ) -> Result<&mut Subscription, BillingError> {
        let id = self
            .current_id(customer_id, at)
            .ok_or(BillingError::NoActiveSubscription(customer_id))?;
        self.subscriptions
            .get_mut(&id)
            .ok_or(BillingError::NoActiveSubscription(customer_id))
    }

    fn subscription_for_invoice(&self, invoice_id: InvoiceId) -> Option<SubscriptionId> {
        self.subscriptions
            .values()
            .find(|s| s.invoice_id == invoice_id)
            .map(|s| s.id)
    }

    fn with_invoice(&self, subscription: &Subscription) -> Option<ActiveSubscription> {
        self.invoices
            .get(&subscription.invoice_id)
            .map(|invoice| ActiveSubscription {
                subscription: subscription.clone(),
                invoice: invoice.clone(),
            })
    }

    fn last_reminder(&self, customer_id: CustomerId) -> Option<Timestamp> {
        self.reminders
            .iter()
            .filter(|r| r.customer_id == customer_id)
            .map(|r| r.created_at)
            .max()
    }
}

/// In-memory implementation of [`BillingLedger`].
#[derive(Debug, Clone, Default)]
pub struct InMemoryBillingLedger {
    state: Arc<Mutex<LedgerState>>,
}

impl InMemoryBillingLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts an invoice and subscription as-is. Test seeding only.
    pub async fn seed(&self, invoice: Invoice, subscription: Subscription) {
        let mut state = self.state.lock().await;
        state.invoices.insert(invoice.id, invoice);
        state.subscriptions.insert(subscription.id, subscription);
    }

    pub async fn subscriptions_for(&self, customer_id: CustomerId) -> Vec<Subscription> {
        let state = self.state.lock().await;
        let mut subs: Vec<_> = state
            .subscriptions
            .values()
            .filter(|s| s.customer_id == customer_id)
            .cloned()
            .collect();
        subs.sort_by_key(|s| s.created_at);
        subs
    }

    pub async fn find_subscription(&self, id: SubscriptionId) -> Option<Subscription> {
        self.state.lock().await.subscriptions.get(&id).cloned()
    }

    pub async fn reminders_for(&self, customer_id: CustomerId) -> Vec<ReminderRecord> {
        self.state
            .lock()
            .await
            .reminders
            .iter()
            .filter(|r| r.customer_id == customer_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl BillingLedger for InMemoryBillingLedger {
    async fn create_draft(&self, draft: NewDraft) -> Result<DraftCreated, BillingError> {
        let mut state = self.state.lock().await;

        if draft.purpose == DraftPurpose::Upgrade {
            state
                .current_mut(draft.customer_id, &draft.now)?
                .record_upgrade_intent(draft.plan_id, draft.now);
        }

        let invoice = Invoice::draft(
            draft.customer_id,
            draft.plan_id,
            draft.currency,
            &draft.charge,
            draft.provider_session_id,
            draft.due_at,
            draft.now,
        );
        let subscription = Subscription::inactive(
            draft.customer_id,
            invoice.id,
            draft.plan_id,
            draft.starts_at,
            draft.ends_at,
            draft.now,
        );
        let created = DraftCreated {
            invoice_id: invoice.id,
            subscription_id: subscription.id,
        };

        state.invoices.insert(invoice.id, invoice);
        state.subscriptions.insert(subscription.id, subscription);
        Ok(created)
    }

    async fn find_invoice(&self, id: InvoiceId) -> Result<Option<Invoice>, BillingError> {
        Ok(self.state.lock().await.invoices.get(&id).cloned())
    }

    async fn find_invoice_by_session(
        &self,
        session_id: &str,
    ) -> Result<Option<Invoice>, BillingError> {
        Ok(self
            .state
            .lock()
            .await
            .invoices
            .values()
            .find(|i| i.provider_session_id == session_id)
            .cloned())
    }

    async fn mark_paid(
        &self,
        invoice_id: InvoiceId,
        now: Timestamp,
    ) -> Result<MarkPaidOutcome, BillingError> {
        let mut state = self.state.lock().await;
        let invoice = state
            .invoices
            .get_mut(&invoice_id)
            .ok_or_else(|| BillingError::invoice_not_found(invoice_id))?;
        invoice.mark_paid(now)
    }

    async fn mark_failed(&self, invoice_id: InvoiceId) -> Result<MarkFailedOutcome, BillingError> {
        let mut state = self.state.lock().await;
        let invoice = state
            .invoices
            .get_mut(&invoice_id)
            .ok_or_else(|| BillingError::invoice_not_found(invoice_id))?;
        Ok(invoice.mark_failed())
    }

    async fn activate_or_renew(
        &self,
        invoice_id: InvoiceId,
        interval: BillingInterval,
        now: Timestamp,
    ) -> Result<ActivationOutcome, BillingError> {
        let mut state = self.state.lock().await;

        let invoice = state
            .invoices
            .get(&invoice_id)
            .ok_or_else(|| BillingError::invoice_not_found(invoice_id))?;
        if invoice.status != InvoiceStatus::Paid {
            return Err(BillingError::invalid_state(
                invoice.status.as_str(),
                format!("activate subscription for invoice {}", invoice_id),
            ));
        }

        let sub_id = state.subscription_for_invoice(invoice_id).ok_or_else(|| {
            BillingError::invalid_state(
                "no subscription",
                format!("activate subscription for invoice {}", invoice_id),
            )
        })?;
        let (customer_id, status, deleted, first) = {
            let sub = &state.subscriptions[&sub_id];
            (
                sub.customer_id,
                sub.status,
                sub.is_deleted(),
                sub.is_first_activation(&now),
            )
        };
        if status != SubscriptionStatus::Inactive {
            return Ok(ActivationOutcome::AlreadyActive {
                subscription_id: sub_id,
            });
        }
        if deleted {
            return Err(BillingError::invalid_state(
                "deleted",
                format!("activate subscription {}", sub_id),
            ));
        }

        let previous = if first {
            None
        } else {
            state.current_id(customer_id, &now)
        };
        let activated = {
            let Some(sub) = state.subscriptions.get_mut(&sub_id) else {
                return Err(BillingError::invoice_not_found(invoice_id));
            };
            if first {
                sub.activate_from(now, interval)?;
            } else {
                sub.activate_scheduled()?;
            }
            (sub.starts_at, sub.ends_at)
        };

        let superseded: Vec<SubscriptionId> = state
            .subscriptions
            .values()
            .filter(|s| {
                s.id != sub_id
                    && s.customer_id == customer_id
                    && s.overlaps_active(&activated.0, &activated.1)
            })
            .map(|s| s.id)
            .collect();
        for id in &superseded {
            if let Some(old) = state.subscriptions.get_mut(id) {
                old.supersede(now)?;
            }
        }

        if first {
            Ok(ActivationOutcome::Activated {
                subscription_id: sub_id,
                superseded,
            })
        } else {
            if let Some(prev) = previous.and_then(|id| state.subscriptions.get_mut(&id)) {
                prev.link_renewal(sub_id, now);
            }
            Ok(ActivationOutcome::Renewed {
                subscription_id: sub_id,
                previous,
                superseded,
            })
        }
    }

    async fn record_downgrade(
        &self,
        customer_id: CustomerId,
        plan_id: PlanId,
        now: Timestamp,
    ) -> Result<Subscription, BillingError> {
        let mut state = self.state.lock().await;
        let sub = state.current_mut(customer_id, &now)?;
        sub.record_downgrade(plan_id, now);
        Ok(sub.clone())
    }

    async fn cancel(
        &self,
        customer_id: CustomerId,
        now: Timestamp,
    ) -> Result<Subscription, BillingError> {
        let mut state = self.state.lock().await;
        let sub = state.current_mut(customer_id, &now)?;
        sub.cancel(now);
        Ok(sub.clone())
    }

    async fn sweep_expired(&self, now: Timestamp) -> Result<SweepReport, BillingError> {
        let mut state = self.state.lock().await;
        let mut report = SweepReport::default();

        let stale: Vec<InvoiceId> = state
            .invoices
            .values()
            .filter(|i| i.is_deleted() || i.is_expired(&now))
            .map(|i| i.id)
            .collect();

        for sub in state.subscriptions.values_mut() {
            if !sub.is_deleted()
                && sub.status != SubscriptionStatus::Active
                && stale.contains(&sub.invoice_id)
            {
                sub.deleted_at = Some(now);
                report.subscriptions += 1;
            }
        }
        for id in &stale {
            if let Some(invoice) = state.invoices.get_mut(id) {
                if !invoice.is_deleted() {
                    invoice.deleted_at = Some(now);
                    report.invoices += 1;
                }
            }
        }
        Ok(report)
    }

    async fn find_active_subscription(
        &self,
        customer_id: CustomerId,
        at: Timestamp,
    ) -> Result<Option<ActiveSubscription>, BillingError> {
        let state = self.state.lock().await;
        Ok(state
            .current_id(customer_id, &at)
            .and_then(|id| state.subscriptions.get(&id))
            .and_then(|sub| state.with_invoice(sub)))
    }

    async fn list_invoices(&self, customer_id: CustomerId) -> Result<Vec<Invoice>, BillingError> {
        let state = self.state.lock().await;
        let mut invoices: Vec<Invoice> = state
            .invoices
            .values()
            .filter(|i| i.customer_id == customer_id)
            .cloned()
            .collect();
        invoices.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(invoices)
    }

    async fn record_reminder(&self, reminder: ReminderRecord) -> Result<(), BillingError> {
        self.state.lock().await.reminders.push(reminder);
        Ok(())
    }

    async fn find_renewal_candidates(
        &self,
        now: Timestamp,
        policy: ReminderPolicy,
    ) -> Result<Vec<ActiveSubscription>, BillingError> {
        let state = self.state.lock().await;
        let mut candidates: Vec<ActiveSubscription> = state
            .subscriptions
            .values()
            .filter(|s| policy.is_candidate(s, now))
            .filter(|s| policy.cooldown_elapsed(state.last_reminder(s.customer_id), now))
            .filter_map(|s| state.with_invoice(s))
            .collect();
        candidates.sort_by_key(|c| c.subscription.ends_at);
        Ok(candidates)
    }
}
