//! RenewalNotifier that emits reminders as structured log events.
//!
//! Suitable where an external pipeline ships logs to the delivery channel, and
//! for local development. Sent notices are also kept for inspection.

use std::sync::Mutex;

use async_trait::async_trait;

use crate::domain::foundation::DomainError;
use crate::ports::{RenewalNotice, RenewalNotifier};

#[derive(Debug, Default)]
pub struct LogRenewalNotifier {
    sent: Mutex<Vec<RenewalNotice>>,
}

impl LogRenewalNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Notices delivered so far, oldest first.
    pub fn sent(&self) -> Vec<RenewalNotice> {
        self.sent
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[async_trait]
impl RenewalNotifier for LogRenewalNotifier {
    async fn notify(&self, notice: RenewalNotice) -> Result<(), DomainError> {
        tracing::info!(
            target: "renewal_reminder",
            customer_id = %notice.customer_id,
            invoice_id = %notice.invoice_id,
            plan_id = %notice.plan_id,
            checkout_url = %notice.checkout_url,
            sent_at = %notice.sent_at,
            "Renewal reminder"
        );
        self.sent
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(notice);
        Ok(())
    }
}
