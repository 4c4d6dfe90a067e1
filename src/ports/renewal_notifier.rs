//! Outbound channel for renewal reminders.
//!
//! Delivery (email, SMS, log) belongs to the adapter.

use async_trait::async_trait;
use serde::Serialize;

use crate::domain::foundation::{CustomerId, DomainError, InvoiceId, PlanId, Timestamp};

/// A renewal reminder ready to send.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenewalNotice {
    pub customer_id: CustomerId,
    pub invoice_id: InvoiceId,
    pub plan_id: PlanId,
    pub checkout_url: String,
    pub sent_at: Timestamp,
}

#[async_trait]
pub trait RenewalNotifier: Send + Sync {
    async fn notify(&self, notice: RenewalNotice) -> Result<(), DomainError>;
}
