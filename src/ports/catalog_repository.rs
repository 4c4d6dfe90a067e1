//! Catalog repository port (customers, plans, pricing records).
//!
//! Reads return soft-deleted rows too; callers decide whether a deleted plan
//! still counts (historical invoices keep resolving their plan).

use async_trait::async_trait;

use crate::domain::billing::{BillingError, CurrencyCode, Customer, Plan, PricingRecord};
use crate::domain::foundation::{CustomerId, DomainError, PlanId, ProductId, Timestamp};

#[async_trait]
pub trait CatalogRepository: Send + Sync {
    async fn find_customer(&self, id: CustomerId) -> Result<Option<Customer>, DomainError>;

    async fn find_plan(&self, id: PlanId) -> Result<Option<Plan>, DomainError>;

    /// The live pricing record for `(product, currency)` whose closed validity
    /// interval contains `as_of`.
    async fn find_pricing(
        &self,
        product_id: ProductId,
        currency: CurrencyCode,
        as_of: Timestamp,
    ) -> Result<Option<PricingRecord>, DomainError>;

    /// Inserts a pricing record.
    ///
    /// # Errors
    ///
    /// - `PricingOverlap` if a live record for the same product and currency
    ///   shares any instant with the new one
    async fn add_pricing_record(&self, record: PricingRecord) -> Result<(), BillingError>;
}
