//! Stripe objects as they arrive in API responses and webhook bodies.

use serde::{Deserialize, Serialize};

use crate::ports::{PaymentError, PaymentEvent};

/// Envelope of every webhook delivery. Only `data.object.id` is trusted
/// beyond the event type.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeWebhookEvent {
    /// `evt_...`
    pub id: String,

    #[serde(rename = "type")]
    pub event_type: String,

    #[serde(default)]
    pub created: i64,

    pub data: StripeEventData,

    #[serde(default)]
    pub livemode: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeEventData {
    pub object: serde_json::Value,
}

/// Response of `POST /v1/checkout/sessions`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeCheckoutSession {
    /// `cs_...`, stored on the draft invoice
    pub id: String,

    /// Hosted payment page
    pub url: Option<String>,

    #[serde(default)]
    pub status: Option<String>,

    #[serde(default)]
    pub payment_status: Option<String>,
}

impl StripeWebhookEvent {
    /// Maps a verified Stripe event onto the gateway's event contract.
    ///
    /// Only the checkout session id is read from the payload.
    pub fn to_payment_event(&self) -> Result<PaymentEvent, PaymentError> {
        match self.event_type.as_str() {
            "checkout.session.completed" => Ok(PaymentEvent::Completed {
                session_id: self.session_id()?,
            }),
            "checkout.session.expired" | "checkout.session.async_payment_failed" => {
                Ok(PaymentEvent::Failed {
                    session_id: self.session_id()?,
                })
            }
            other => Ok(PaymentEvent::Unhandled {
                event_type: other.to_string(),
            }),
        }
    }

    fn session_id(&self) -> Result<String, PaymentError> {
        self.data
            .object
            .get("id")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .ok_or_else(|| PaymentError::invalid_webhook("Checkout session event without id"))
    }
}
