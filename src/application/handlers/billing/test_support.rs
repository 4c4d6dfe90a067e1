//! Shared fixtures for billing handler tests.

use std::sync::Arc;

use rust_decimal::Decimal;

use crate::adapters::memory::{InMemoryBillingLedger, InMemoryCatalog};
use crate::adapters::stripe::MockPaymentGateway;
use crate::domain::billing::{BillingInterval, CurrencyCode, Customer, Plan, PricingRecord};
use crate::domain::foundation::{CustomerId, PlanId, ProductId, Timestamp};
use crate::ports::CatalogRepository;

pub fn usd() -> CurrencyCode {
    CurrencyCode::new("USD").unwrap()
}

pub struct Fixture {
    pub catalog: Arc<InMemoryCatalog>,
    pub ledger: Arc<InMemoryBillingLedger>,
    pub gateway: Arc<MockPaymentGateway>,
    pub customer_id: CustomerId,
}

impl Fixture {
    /// A USD customer with an empty catalog.
    pub async fn new() -> Self {
        let catalog = Arc::new(InMemoryCatalog::new());
        let customer_id = CustomerId::new();
        catalog
            .insert_customer(Customer::new(customer_id, "buyer@example.com", Some(usd())))
            .await;
        Self {
            catalog,
            ledger: Arc::new(InMemoryBillingLedger::new()),
            gateway: Arc::new(MockPaymentGateway::new()),
            customer_id,
        }
    }

    /// Adds a plan priced in USD from a year ago to a year ahead.
    ///
    /// `price` is major units per month, `tax` a percentage.
    pub async fn plan(&self, price: Decimal, tax: Decimal, months: u32) -> PlanId {
        let plan = Plan {
            id: PlanId::new(),
            product_id: ProductId::new(),
            name: format!("{} month plan", months),
            billing_interval: BillingInterval::months(months).unwrap(),
            deleted_at: None,
        };
        let now = Timestamp::now();
        self.catalog
            .add_pricing_record(
                PricingRecord::new(
                    plan.product_id,
                    usd(),
                    now.minus_days(365),
                    now.add_days(365),
                    price,
                    tax,
                )
                .unwrap(),
            )
            .await
            .unwrap();
        let id = plan.id;
        self.catalog.insert_plan(plan).await;
        id
    }

    /// 10.00 per month, 10% tax, monthly.
    pub async fn standard_plan(&self) -> PlanId {
        self.plan(Decimal::new(1000, 2), Decimal::new(10, 0), 1).await
    }
}
