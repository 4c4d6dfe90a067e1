//! Unused-time credit for a subscription being replaced.

use super::{BillingError, Invoice, Subscription};
use crate::domain::foundation::Timestamp;

/// Credit, in minor units, for the unused part of `subscription` at `as_of`.
///
/// `credit = floor((total - tax) * (ends_at - as_of) / (ends_at - starts_at))`.
/// Tax is never credited back. The subscription must be current at `as_of`.
pub fn unused_credit(
    subscription: &Subscription,
    invoice: &Invoice,
    as_of: Timestamp,
) -> Result<i64, BillingError> {
    if !subscription.is_current_at(&as_of) {
        return Err(BillingError::NoActiveSubscription(subscription.customer_id));
    }
    if invoice.id != subscription.invoice_id {
        return Err(BillingError::invalid_state(
            format!("invoice {} belongs elsewhere", invoice.id),
            format!("prorate subscription {}", subscription.id),
        ));
    }

    let refundable = (invoice.total_amount - invoice.tax_amount).max(0) as i128;
    let span = subscription
        .ends_at
        .duration_since(&subscription.starts_at)
        .num_milliseconds() as i128;
    if span <= 0 {
        return Ok(0);
    }
    let remaining = subscription
        .ends_at
        .duration_since(&as_of)
        .num_milliseconds()
        .clamp(0, span as i64) as i128;

    // Both factors are non-negative, so integer division floors.
    Ok((refundable * remaining / span) as i64)
}
