//! ListInvoicesHandler - Query handler for a customer's invoice history.

use std::sync::Arc;

use crate::domain::billing::{BillingError, Invoice};
use crate::domain::foundation::CustomerId;
use crate::ports::BillingLedger;

#[derive(Debug, Clone)]
pub struct ListInvoicesQuery {
    pub customer_id: CustomerId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListInvoicesResult {
    /// Newest first; swept invoices carry `deleted_at`.
    pub invoices: Vec<Invoice>,
}

pub struct ListInvoicesHandler {
    ledger: Arc<dyn BillingLedger>,
}

impl ListInvoicesHandler {
    pub fn new(ledger: Arc<dyn BillingLedger>) -> Self {
        Self { ledger }
    }

    pub async fn handle(&self, query: ListInvoicesQuery) -> Result<ListInvoicesResult, BillingError> {
        let invoices = self.ledger.list_invoices(query.customer_id).await?;
        Ok(ListInvoicesResult { invoices })
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::Fixture;
    use super::super::{DraftSettings, SubscribeCommand, SubscribeHandler};
    use super::*;

    #[tokio::test]
    async fn lists_only_the_customers_invoices() {
        let f = Fixture::new().await;
        let plan_id = f.standard_plan().await;
        let subscribed = SubscribeHandler::new(
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

        let handler = ListInvoicesHandler::new(f.ledger.clone());
        let mine = handler
            .handle(ListInvoicesQuery {
                customer_id: f.customer_id,
            })
            .await
            .unwrap();
        assert_eq!(mine.invoices.len(), 1);
        assert_eq!(mine.invoices[0].id, subscribed.invoice_id);

        let theirs = handler
            .handle(ListInvoicesQuery {
                customer_id: CustomerId::new(),
            })
            .await
            .unwrap();
        assert!(theirs.invoices.is_empty());
    }
}
