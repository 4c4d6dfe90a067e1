//! Catalog entities: customers, plans and time-bounded pricing.
//!
//! These are read by the lifecycle engine but owned elsewhere; only pricing
//! records are written from this crate, and only through the overlap check.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::foundation::{
    CustomerId, PlanId, PricingRecordId, ProductId, Timestamp, ValidationError,
};

use super::CurrencyCode;

/// Longest plan term accepted, in months.
pub const MAX_BILLING_INTERVAL_MONTHS: u32 = 120;

/// A billed customer. The billing currency may be unset until first purchase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub id: CustomerId,
    pub email: String,
    pub currency: Option<CurrencyCode>,
    pub created_at: Timestamp,
    pub deleted_at: Option<Timestamp>,
}

impl Customer {
    pub fn new(id: CustomerId, email: impl Into<String>, currency: Option<CurrencyCode>) -> Self {
        Self {
            id,
            email: email.into(),
            currency,
            created_at: Timestamp::now(),
            deleted_at: None,
        }
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// Number of whole months a plan's term covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct BillingInterval(u32);

impl BillingInterval {
    pub fn months(months: u32) -> Result<Self, ValidationError> {
        if months == 0 || months > MAX_BILLING_INTERVAL_MONTHS {
            return Err(ValidationError::out_of_range(
                "billing_interval",
                1,
                MAX_BILLING_INTERVAL_MONTHS as i64,
                months as i64,
            ));
        }
        Ok(Self(months))
    }

    pub fn as_months(&self) -> u32 {
        self.0
    }

    /// End of a term that starts at `start` (30-day months).
    pub fn period_end(&self, start: Timestamp) -> Timestamp {
        start.add_months(self.0 as i64)
    }
}

impl TryFrom<u32> for BillingInterval {
    type Error = ValidationError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::months(value)
    }
}

impl From<BillingInterval> for u32 {
    fn from(interval: BillingInterval) -> Self {
        interval.0
    }
}

/// A purchasable plan in a product's catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    pub id: PlanId,
    pub product_id: ProductId,
    pub name: String,
    pub billing_interval: BillingInterval,
    pub deleted_at: Option<Timestamp>,
}

impl Plan {
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// Price of a product in one currency over a closed validity interval.
///
/// `price` is in major units per month; `tax_percentage` is 0..=100.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingRecord {
    pub id: PricingRecordId,
    pub product_id: ProductId,
    pub currency: CurrencyCode,
    pub valid_from: Timestamp,
    pub valid_to: Timestamp,
    pub price: Decimal,
    pub tax_percentage: Decimal,
    pub deleted_at: Option<Timestamp>,
}

impl PricingRecord {
    /// Builds a record after checking interval order and amounts.
    pub fn new(
        product_id: ProductId,
        currency: CurrencyCode,
        valid_from: Timestamp,
        valid_to: Timestamp,
        price: Decimal,
        tax_percentage: Decimal,
    ) -> Result<Self, ValidationError> {
        if valid_to.is_before(&valid_from) {
            return Err(ValidationError::invalid_format(
                "valid_to",
                "must not be earlier than valid_from",
            ));
        }
        if price.is_sign_negative() {
            return Err(ValidationError::invalid_format("price", "must not be negative"));
        }
        if tax_percentage.is_sign_negative() || tax_percentage > Decimal::ONE_HUNDRED {
            return Err(ValidationError::invalid_format(
                "tax_percentage",
                "must be between 0 and 100",
            ));
        }
        Ok(Self {
            id: PricingRecordId::new(),
            product_id,
            currency,
            valid_from,
            valid_to,
            price,
            tax_percentage,
            deleted_at: None,
        })
    }

    pub fn is_active(&self) -> bool {
        self.deleted_at.is_none()
    }

    /// True when `as_of` lies inside the closed validity interval.
    pub fn covers(&self, as_of: &Timestamp) -> bool {
        self.is_active() && as_of.is_within(&self.valid_from, &self.valid_to)
    }

    /// Range-exclusion check: two live records for the same product and
    /// currency may not share any instant.
    pub fn overlaps(&self, other: &PricingRecord) -> bool {
        self.is_active()
            && other.is_active()
            && self.product_id == other.product_id
            && self.currency == other.currency
            && self.valid_from <= other.valid_to
            && other.valid_from <= self.valid_to
    }
}

/// Result of resolving a plan's price for a currency at a point in time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPricing {
    pub plan_id: PlanId,
    pub currency: CurrencyCode,
    pub price: Decimal,
    pub tax_percentage: Decimal,
    pub billing_interval: BillingInterval,
}
