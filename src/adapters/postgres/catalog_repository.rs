//! PostgreSQL implementation of CatalogRepository.
//!
//! Pricing overlap is enforced by the `pricing_records_no_overlap` exclusion
//! constraint; a violation is reported as `PricingOverlap`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::billing::{
    BillingError, BillingInterval, CurrencyCode, Customer, Plan, PricingRecord,
};
use crate::domain::foundation::{
    CustomerId, DomainError, ErrorCode, PlanId, PricingRecordId, ProductId, Timestamp,
};
use crate::ports::CatalogRepository;

const OVERLAP_CONSTRAINT: &str = "pricing_records_no_overlap";

pub struct PostgresCatalogRepository {
    pool: PgPool,
}

impl PostgresCatalogRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct CustomerRow {
    id: Uuid,
    email: String,
    currency: Option<String>,
    created_at: DateTime<Utc>,
    deleted_at: Option<DateTime<Utc>>,
}

impl TryFrom<CustomerRow> for Customer {
    type Error = DomainError;

    fn try_from(row: CustomerRow) -> Result<Self, Self::Error> {
        let currency = row
            .currency
            .as_deref()
            .map(CurrencyCode::new)
            .transpose()
            .map_err(|e| {
                DomainError::new(ErrorCode::DatabaseError, format!("Invalid currency: {}", e))
            })?;

        Ok(Customer {
            id: CustomerId::from_uuid(row.id),
            email: row.email,
            currency,
            created_at: Timestamp::from_datetime(row.created_at),
            deleted_at: row.deleted_at.map(Timestamp::from_datetime),
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct PlanRow {
    id: Uuid,
    product_id: Uuid,
    name: String,
    billing_interval: i32,
    deleted_at: Option<DateTime<Utc>>,
}

impl TryFrom<PlanRow> for Plan {
    type Error = DomainError;

    fn try_from(row: PlanRow) -> Result<Self, Self::Error> {
        let months = u32::try_from(row.billing_interval).map_err(|_| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Invalid billing interval: {}", row.billing_interval),
            )
        })?;
        let billing_interval = BillingInterval::months(months).map_err(|e| {
            DomainError::new(ErrorCode::DatabaseError, format!("Invalid plan row: {}", e))
        })?;

        Ok(Plan {
            id: PlanId::from_uuid(row.id),
            product_id: ProductId::from_uuid(row.product_id),
            name: row.name,
            billing_interval,
            deleted_at: row.deleted_at.map(Timestamp::from_datetime),
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct PricingRow {
    id: Uuid,
    product_id: Uuid,
    currency: String,
    valid_from: DateTime<Utc>,
    valid_to: DateTime<Utc>,
    price: Decimal,
    tax_percentage: Decimal,
    deleted_at: Option<DateTime<Utc>>,
}

impl TryFrom<PricingRow> for PricingRecord {
    type Error = DomainError;

    fn try_from(row: PricingRow) -> Result<Self, Self::Error> {
        let currency = CurrencyCode::new(&row.currency).map_err(|e| {
            DomainError::new(ErrorCode::DatabaseError, format!("Invalid currency: {}", e))
        })?;

        Ok(PricingRecord {
            id: PricingRecordId::from_uuid(row.id),
            product_id: ProductId::from_uuid(row.product_id),
            currency,
            valid_from: Timestamp::from_datetime(row.valid_from),
            valid_to: Timestamp::from_datetime(row.valid_to),
            price: row.price,
            tax_percentage: row.tax_percentage,
            deleted_at: row.deleted_at.map(Timestamp::from_datetime),
        })
    }
}

fn db_error(context: &str, e: sqlx::Error) -> DomainError {
    DomainError::new(ErrorCode::DatabaseError, format!("{}: {}", context, e))
}

#[async_trait]
impl CatalogRepository for PostgresCatalogRepository {
    async fn find_customer(&self, id: CustomerId) -> Result<Option<Customer>, DomainError> {
        let row: Option<CustomerRow> = sqlx::query_as(
            "SELECT id, email, currency, created_at, deleted_at FROM customers WHERE id = $1",
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("Failed to load customer", e))?;

        row.map(Customer::try_from).transpose()
    }

    async fn find_plan(&self, id: PlanId) -> Result<Option<Plan>, DomainError> {
        let row: Option<PlanRow> = sqlx::query_as(
            "SELECT id, product_id, name, billing_interval, deleted_at FROM plans WHERE id = $1",
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("Failed to load plan", e))?;

        row.map(Plan::try_from).transpose()
    }

    async fn find_pricing(
        &self,
        product_id: ProductId,
        currency: CurrencyCode,
        as_of: Timestamp,
    ) -> Result<Option<PricingRecord>, DomainError> {
        let row: Option<PricingRow> = sqlx::query_as(
            r#"
            SELECT id, product_id, currency, valid_from, valid_to, price, tax_percentage, deleted_at
            FROM pricing_records
            WHERE product_id = $1
              AND currency = $2
              AND deleted_at IS NULL
              AND valid_from <= $3
              AND valid_to >= $3
            LIMIT 1
            "#,
        )
        .bind(product_id.as_uuid())
        .bind(currency.as_str())
        .bind(as_of.as_datetime())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("Failed to load pricing", e))?;

        row.map(PricingRecord::try_from).transpose()
    }

    async fn add_pricing_record(&self, record: PricingRecord) -> Result<(), BillingError> {
        sqlx::query(
            r#"
            INSERT INTO pricing_records (
                id, product_id, currency, valid_from, valid_to, price, tax_percentage
            ) VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(record.id.as_uuid())
        .bind(record.product_id.as_uuid())
        .bind(record.currency.as_str())
        .bind(record.valid_from.as_datetime())
        .bind(record.valid_to.as_datetime())
        .bind(record.price)
        .bind(record.tax_percentage)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(db_err) = &e {
                if db_err.constraint() == Some(OVERLAP_CONSTRAINT) {
                    return BillingError::PricingOverlap {
                        currency: record.currency,
                    };
                }
            }
            BillingError::infrastructure(format!("Failed to insert pricing record: {}", e))
        })?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plan_row_with_zero_interval_is_rejected() {
        let row = PlanRow {
            id: Uuid::new_v4(),
            product_id: Uuid::new_v4(),
            name: "Basic".to_string(),
            billing_interval: 0,
            deleted_at: None,
        };
        assert!(Plan::try_from(row).is_err());
    }

    #[test]
    fn customer_row_normalizes_currency() {
        let row = CustomerRow {
            id: Uuid::new_v4(),
            email: "a@example.com".to_string(),
            currency: Some("eur".to_string()),
            created_at: Utc::now(),
            deleted_at: None,
        };
        let customer = Customer::try_from(row).unwrap();
        assert_eq!(customer.currency.unwrap().as_str(), "EUR");
    }

    #[test]
    fn customer_row_without_currency_is_allowed() {
        let row = CustomerRow {
            id: Uuid::new_v4(),
            email: "a@example.com".to_string(),
            currency: None,
            created_at: Utc::now(),
            deleted_at: None,
        };
        assert!(Customer::try_from(row).unwrap().currency.is_none());
    }
}
