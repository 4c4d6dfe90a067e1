//! SweepExpiredHandler - Command handler for removing stale drafts.

use std::sync::Arc;

use crate::domain::billing::BillingError;
use crate::domain::foundation::Timestamp;
use crate::ports::{BillingLedger, SweepReport};

#[derive(Debug, Clone, Copy)]
pub struct SweepExpiredCommand {
    pub now: Timestamp,
}

/// Soft-deletes unpaid invoices past `due_at` with their subscriptions.
pub struct SweepExpiredHandler {
    ledger: Arc<dyn BillingLedger>,
}

impl SweepExpiredHandler {
    pub fn new(ledger: Arc<dyn BillingLedger>) -> Self {
        Self { ledger }
    }

    pub async fn handle(&self, cmd: SweepExpiredCommand) -> Result<SweepReport, BillingError> {
        let report = self.ledger.sweep_expired(cmd.now).await?;
        if !report.is_empty() {
            tracing::info!(
                invoices = report.invoices,
                subscriptions = report.subscriptions,
                "Swept expired drafts"
            );
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryBillingLedger;
    use crate::domain::billing::{Charge, CurrencyCode, InvoiceStatus};
    use crate::domain::foundation::{CustomerId, PlanId};
    use crate::ports::{DraftPurpose, NewDraft};

    #[tokio::test]
    async fn sweeps_stale_draft_then_is_a_no_op() {
        let ledger = Arc::new(InMemoryBillingLedger::new());
        let now = Timestamp::now();
        let created_at = now.minus_hours(5);
        let customer = CustomerId::new();
        let created = ledger
            .create_draft(NewDraft {
                customer_id: customer,
                plan_id: PlanId::new(),
                currency: CurrencyCode::new("USD").unwrap(),
                charge: Charge {
                    subtotal: 1000,
                    tax_amount: 100,
                    credit_applied: 0,
                    total_amount: 1100,
                },
                starts_at: created_at,
                ends_at: created_at.add_days(30),
                provider_session_id: "cs_stale".to_string(),
                due_at: now.minus_hours(3),
                purpose: DraftPurpose::Subscribe,
                now: created_at,
            })
            .await
            .unwrap();
        let handler = SweepExpiredHandler::new(ledger.clone());

        let first = handler.handle(SweepExpiredCommand { now }).await.unwrap();
        assert_eq!(
            first,
            SweepReport {
                subscriptions: 1,
                invoices: 1
            }
        );
        let invoice = ledger.find_invoice(created.invoice_id).await.unwrap().unwrap();
        assert!(invoice.is_deleted());
        assert_eq!(invoice.status, InvoiceStatus::Draft);
        let sub = ledger.find_subscription(created.subscription_id).await.unwrap();
        assert!(sub.is_deleted());

        let second = handler.handle(SweepExpiredCommand { now }).await.unwrap();
        assert!(second.is_empty());
    }
}
