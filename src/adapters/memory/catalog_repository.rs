//! In-memory catalog for testing and local development.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::billing::{BillingError, CurrencyCode, Customer, Plan, PricingRecord};
use crate::domain::foundation::{CustomerId, DomainError, PlanId, ProductId, Timestamp};
use crate::ports::CatalogRepository;

#[derive(Debug, Clone, Default)]
pub struct InMemoryCatalog {
    customers: Arc<RwLock<HashMap<CustomerId, Customer>>>,
    plans: Arc<RwLock<HashMap<PlanId, Plan>>>,
    pricing: Arc<RwLock<Vec<PricingRecord>>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_customer(&self, customer: Customer) {
        self.customers.write().await.insert(customer.id, customer);
    }

    pub async fn insert_plan(&self, plan: Plan) {
        self.plans.write().await.insert(plan.id, plan);
    }
}

#[async_trait]
impl CatalogRepository for InMemoryCatalog {
    async fn find_customer(&self, id: CustomerId) -> Result<Option<Customer>, DomainError> {
        Ok(self.customers.read().await.get(&id).cloned())
    }

    async fn find_plan(&self, id: PlanId) -> Result<Option<Plan>, DomainError> {
        Ok(self.plans.read().await.get(&id).cloned())
    }

    async fn find_pricing(
        &self,
        product_id: ProductId,
        currency: CurrencyCode,
        as_of: Timestamp,
    ) -> Result<Option<PricingRecord>, DomainError> {
        Ok(self
            .pricing
            .read()
            .await
            .iter()
            .find(|r| r.product_id == product_id && r.currency == currency && r.covers(&as_of))
            .cloned())
    }

    async fn add_pricing_record(&self, record: PricingRecord) -> Result<(), BillingError> {
        // Write lock held across check and insert.
        let mut pricing = self.pricing.write().await;
        if pricing.iter().any(|existing| existing.overlaps(&record)) {
            return Err(BillingError::PricingOverlap {
                currency: record.currency,
            });
        }
        pricing.push(record);
        Ok(())
    }
}
