//! Charge computation in integer minor units.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use super::{BillingError, ResolvedPricing};

/// Amounts for one invoice, all in the currency's minor units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Charge {
    pub subtotal: i64,
    pub tax_amount: i64,
    pub credit_applied: i64,
    pub total_amount: i64,
}

impl Charge {
    /// Full-term charge for a resolved plan price.
    ///
    /// The monthly price is multiplied by the billing interval and converted to
    /// minor units before tax is taken, so both parts are integers.
    pub fn for_term(pricing: &ResolvedPricing) -> Result<Self, BillingError> {
        let factor = Decimal::from(pricing.currency.minor_unit_factor());
        let months = Decimal::from(pricing.billing_interval.as_months());

        let subtotal = (pricing.price * months * factor)
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
        let tax = (subtotal * pricing.tax_percentage / Decimal::ONE_HUNDRED).floor();

        let subtotal = to_minor_units(subtotal, "subtotal")?;
        let tax_amount = to_minor_units(tax, "tax_amount")?;
        let total_amount = subtotal
            .checked_add(tax_amount)
            .ok_or_else(|| BillingError::validation("total_amount", "amount overflows"))?;

        Ok(Self {
            subtotal,
            tax_amount,
            credit_applied: 0,
            total_amount,
        })
    }

    /// Subtracts an unused-time credit. The total never drops below zero and
    /// tax is left untouched.
    pub fn with_credit(self, credit: i64) -> Self {
        let credit = credit.clamp(0, self.total_amount);
        Self {
            credit_applied: credit,
            total_amount: self.total_amount - credit,
            ..self
        }
    }

    /// Portion of the total that can be prorated back as credit.
    pub fn refundable(&self) -> i64 {
        (self.total_amount - self.tax_amount).max(0)
    }
}

fn to_minor_units(amount: Decimal, field: &str) -> Result<i64, BillingError> {
    amount
        .to_i64()
        .ok_or_else(|| BillingError::validation(field, "amount overflows"))
}
