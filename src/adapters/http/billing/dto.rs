//! HTTP DTOs (Data Transfer Objects) for billing endpoints.
//!
//! These types define the JSON request/response structure for the billing API.
//! They serve as the boundary between HTTP and the application layer.

use crate::application::handlers::{SubscribeResult, UpgradeSubscriptionResult};
use crate::domain::billing::{Invoice, InvoiceStatus, Subscription, SubscriptionStatus};
use crate::domain::foundation::{InvoiceId, PlanId, SubscriptionId, Timestamp};
use crate::ports::ActiveSubscription;
use serde::{Deserialize, Serialize};

// ════════════════════════════════════════════════════════════════════════════════
// Request DTOs
// ════════════════════════════════════════════════════════════════════════════════

/// Request to subscribe to, upgrade to, or downgrade to a plan.
#[derive(Debug, Clone, Deserialize)]
pub struct PlanChangeRequest {
    pub plan_id: PlanId,
}

// ════════════════════════════════════════════════════════════════════════════════
// Response DTOs
// ════════════════════════════════════════════════════════════════════════════════

/// Response after a draft invoice was opened with the payment provider.
#[derive(Debug, Clone, Serialize)]
pub struct CheckoutResponse {
    pub invoice_id: InvoiceId,
    pub subscription_id: SubscriptionId,
    /// The subscription being replaced, for upgrades.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replaces_subscription_id: Option<SubscriptionId>,
    /// Redirect the customer here to pay. Absent when nothing was due and
    /// the change already took effect.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checkout_url: Option<String>,
    /// Amounts in minor units.
    pub subtotal: i64,
    pub tax_amount: i64,
    pub credit_applied: i64,
    pub total_amount: i64,
}

impl From<SubscribeResult> for CheckoutResponse {
    fn from(result: SubscribeResult) -> Self {
        Self {
            invoice_id: result.invoice_id,
            subscription_id: result.subscription_id,
            replaces_subscription_id: None,
            checkout_url: Some(result.checkout_url),
            subtotal: result.charge.subtotal,
            tax_amount: result.charge.tax_amount,
            credit_applied: result.charge.credit_applied,
            total_amount: result.charge.total_amount,
        }
    }
}

impl From<UpgradeSubscriptionResult> for CheckoutResponse {
    fn from(result: UpgradeSubscriptionResult) -> Self {
        Self {
            invoice_id: result.invoice_id,
            subscription_id: result.subscription_id,
            replaces_subscription_id: Some(result.previous_subscription_id),
            checkout_url: result.checkout_url,
            subtotal: result.charge.subtotal,
            tax_amount: result.charge.tax_amount,
            credit_applied: result.charge.credit_applied,
            total_amount: result.charge.total_amount,
        }
    }
}

/// Subscription details for API responses.
#[derive(Debug, Clone, Serialize)]
pub struct SubscriptionResponse {
    pub id: SubscriptionId,
    pub plan_id: PlanId,
    pub invoice_id: InvoiceId,
    pub status: SubscriptionStatus,
    pub starts_at: Timestamp,
    pub ends_at: Timestamp,
    pub upgraded_to_plan: Option<PlanId>,
    pub downgraded_to_plan: Option<PlanId>,
    pub cancelled_at: Option<Timestamp>,
    pub renewed_subscription_id: Option<SubscriptionId>,
}

impl From<Subscription> for SubscriptionResponse {
    fn from(sub: Subscription) -> Self {
        Self {
            id: sub.id,
            plan_id: sub.plan_id,
            invoice_id: sub.invoice_id,
            status: sub.status,
            starts_at: sub.starts_at,
            ends_at: sub.ends_at,
            upgraded_to_plan: sub.upgraded_to_plan,
            downgraded_to_plan: sub.downgraded_to_plan,
            cancelled_at: sub.cancelled_at,
            renewed_subscription_id: sub.renewed_subscription_id,
        }
    }
}

/// Response for the current subscription, `null` when there is none.
#[derive(Debug, Clone, Serialize)]
pub struct ActiveSubscriptionResponse {
    pub subscription: Option<SubscriptionResponse>,
    pub invoice: Option<InvoiceResponse>,
}

impl From<Option<ActiveSubscription>> for ActiveSubscriptionResponse {
    fn from(active: Option<ActiveSubscription>) -> Self {
        match active {
            Some(active) => Self {
                subscription: Some(active.subscription.into()),
                invoice: Some(active.invoice.into()),
            },
            None => Self {
                subscription: None,
                invoice: None,
            },
        }
    }
}

/// Invoice details for API responses.
#[derive(Debug, Clone, Serialize)]
pub struct InvoiceResponse {
    pub id: InvoiceId,
    pub plan_id: PlanId,
    pub currency: String,
    pub tax_amount: i64,
    pub total_amount: i64,
    pub status: InvoiceStatus,
    pub due_at: Timestamp,
    pub paid_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub deleted_at: Option<Timestamp>,
}

impl From<Invoice> for InvoiceResponse {
    fn from(invoice: Invoice) -> Self {
        Self {
            id: invoice.id,
            plan_id: invoice.plan_id,
            currency: invoice.currency.as_str().to_string(),
            tax_amount: invoice.tax_amount,
            total_amount: invoice.total_amount,
            status: invoice.status,
            due_at: invoice.due_at,
            paid_at: invoice.paid_at,
            created_at: invoice.created_at,
            deleted_at: invoice.deleted_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct InvoiceListResponse {
    pub invoices: Vec<InvoiceResponse>,
}

/// Acknowledgement returned to the payment provider.
#[derive(Debug, Clone, Serialize)]
pub struct WebhookAckResponse {
    pub received: bool,
}

/// Error response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::billing::{Charge, CurrencyCode};
    use crate::domain::foundation::CustomerId;

    #[test]
    fn plan_change_request_deserializes() {
        let plan_id = PlanId::new();
        let json = format!(r#"{{"plan_id":"{}"}}"#, plan_id);
        let req: PlanChangeRequest = serde_json::from_str(&json).unwrap();
        assert_eq!(req.plan_id, plan_id);
    }

    #[test]
    fn plan_change_request_rejects_bad_uuid() {
        assert!(serde_json::from_str::<PlanChangeRequest>(r#"{"plan_id":"nope"}"#).is_err());
    }

    #[test]
    fn subscribe_checkout_omits_replaced_subscription() {
        let response = CheckoutResponse::from(SubscribeResult {
            invoice_id: InvoiceId::new(),
            subscription_id: SubscriptionId::new(),
            checkout_url: "https://pay.example/cs_1".to_string(),
            charge: Charge {
                subtotal: 1000,
                tax_amount: 100,
                credit_applied: 0,
                total_amount: 1100,
            },
        });

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["total_amount"], 1100);
        assert!(json.get("replaces_subscription_id").is_none());
        assert_eq!(json["checkout_url"], "https://pay.example/cs_1");
    }

    #[test]
    fn settled_upgrade_has_no_checkout_url() {
        let previous = SubscriptionId::new();
        let response = CheckoutResponse::from(UpgradeSubscriptionResult {
            invoice_id: InvoiceId::new(),
            subscription_id: SubscriptionId::new(),
            previous_subscription_id: previous,
            checkout_url: None,
            charge: Charge {
                subtotal: 100,
                tax_amount: 0,
                credit_applied: 100,
                total_amount: 0,
            },
        });

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["total_amount"], 0);
        assert_eq!(json["replaces_subscription_id"], previous.to_string());
        assert!(json.get("checkout_url").is_none());
    }

    #[test]
    fn invoice_response_uses_uppercase_status() {
        let charge = Charge {
            subtotal: 1000,
            tax_amount: 100,
            credit_applied: 0,
            total_amount: 1100,
        };
        let now = Timestamp::now();
        let invoice = Invoice::draft(
            CustomerId::new(),
            PlanId::new(),
            CurrencyCode::new("usd").unwrap(),
            &charge,
            "cs_1".to_string(),
            now.plus_hours(2),
            now,
        );

        let json = serde_json::to_value(InvoiceResponse::from(invoice)).unwrap();
        assert_eq!(json["status"], "DRAFT");
        assert_eq!(json["currency"], "USD");
        assert!(json["deleted_at"].is_null());
    }

    #[test]
    fn missing_subscription_serializes_as_nulls() {
        let json = serde_json::to_value(ActiveSubscriptionResponse::from(None)).unwrap();
        assert!(json["subscription"].is_null());
        assert!(json["invoice"].is_null());
    }
}
