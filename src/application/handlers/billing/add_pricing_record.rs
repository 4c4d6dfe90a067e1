//! AddPricingRecordHandler - Command handler for registering a price.

use std::sync::Arc;

use rust_decimal::Decimal;

use crate::domain::billing::{BillingError, CurrencyCode, PricingRecord};
use crate::domain::foundation::{ProductId, Timestamp};
use crate::ports::CatalogRepository;

#[derive(Debug, Clone)]
pub struct AddPricingRecordCommand {
    pub product_id: ProductId,
    pub currency: CurrencyCode,
    pub valid_from: Timestamp,
    pub valid_to: Timestamp,
    /// Major units per month.
    pub price: Decimal,
    pub tax_percentage: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddPricingRecordResult {
    pub record: PricingRecord,
}

/// Registers a time-bounded price. Live records for the same product and
/// currency may never overlap.
pub struct AddPricingRecordHandler {
    catalog: Arc<dyn CatalogRepository>,
}

impl AddPricingRecordHandler {
    pub fn new(catalog: Arc<dyn CatalogRepository>) -> Self {
        Self { catalog }
    }

    pub async fn handle(
        &self,
        cmd: AddPricingRecordCommand,
    ) -> Result<AddPricingRecordResult, BillingError> {
        let record = PricingRecord::new(
            cmd.product_id,
            cmd.currency,
            cmd.valid_from,
            cmd.valid_to,
            cmd.price,
            cmd.tax_percentage,
        )?;

        self.catalog.add_pricing_record(record.clone()).await?;

        tracing::info!(
            product_id = %record.product_id,
            currency = %record.currency,
            valid_from = %record.valid_from,
            valid_to = %record.valid_to,
            "Pricing record added"
        );

        Ok(AddPricingRecordResult { record })
    }
}
