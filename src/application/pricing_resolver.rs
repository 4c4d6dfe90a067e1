//! PricingResolver - price, tax and term for a plan in a currency at a time.

use std::sync::Arc;

use crate::domain::billing::{BillingError, CurrencyCode, ResolvedPricing};
use crate::domain::foundation::{CustomerId, PlanId, Timestamp};
use crate::ports::CatalogRepository;

/// Resolves plan pricing from time-bounded pricing records.
///
/// A plan that does not exist (or was deleted) is `PlanNotFound`; a plan that
/// exists but has no live record for the currency at `as_of` is
/// `PlanCurrencyMismatch`.
#[derive(Clone)]
pub struct PricingResolver {
    catalog: Arc<dyn CatalogRepository>,
}

impl PricingResolver {
    pub fn new(catalog: Arc<dyn CatalogRepository>) -> Self {
        Self { catalog }
    }

    pub async fn resolve(
        &self,
        plan_id: PlanId,
        currency: CurrencyCode,
        as_of: Timestamp,
    ) -> Result<ResolvedPricing, BillingError> {
        let plan = self
            .catalog
            .find_plan(plan_id)
            .await?
            .filter(|p| !p.is_deleted())
            .ok_or(BillingError::PlanNotFound(plan_id))?;

        let record = self
            .catalog
            .find_pricing(plan.product_id, currency, as_of)
            .await?
            .ok_or(BillingError::PlanCurrencyMismatch { plan_id, currency })?;

        Ok(ResolvedPricing {
            plan_id,
            currency,
            price: record.price,
            tax_percentage: record.tax_percentage,
            billing_interval: plan.billing_interval,
        })
    }

    /// The customer's billing currency.
    ///
    /// # Errors
    ///
    /// - `CustomerNotFound` for unknown or deleted customers
    /// - `CurrencyNotSet` when the customer has not chosen a currency
    pub async fn customer_currency(
        &self,
        customer_id: CustomerId,
    ) -> Result<CurrencyCode, BillingError> {
        let customer = self
            .catalog
            .find_customer(customer_id)
            .await?
            .filter(|c| !c.is_deleted())
            .ok_or(BillingError::CustomerNotFound(customer_id))?;
        customer
            .currency
            .ok_or(BillingError::CurrencyNotSet(customer_id))
    }
}
