//! Payment gateway port for hosted checkout sessions.
//!
//! The lifecycle engine only needs two things from a payment provider: a
//! checkout session sized to an invoice, and a verified, parsed webhook event.
//! Nothing else from the provider's payload is trusted.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::billing::{BillingError, CurrencyCode};
use crate::domain::foundation::Timestamp;

/// Port for payment provider integrations.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Create a hosted checkout session for a one-off payment.
    ///
    /// Must be called outside any open ledger transaction.
    async fn create_checkout_session(
        &self,
        request: CheckoutRequest,
    ) -> Result<CheckoutSession, PaymentError>;

    /// Verify a webhook signature and parse the event.
    ///
    /// Returns `InvalidWebhook` when the signature does not match.
    async fn verify_webhook(
        &self,
        payload: &[u8],
        signature: &str,
    ) -> Result<PaymentEvent, PaymentError>;
}

/// Request to create a checkout session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutRequest {
    /// Amount to collect, in the currency's minor units.
    pub amount_minor: i64,

    pub currency: CurrencyCode,

    /// Line item name shown on the checkout page.
    pub line_name: String,

    /// Line item description, e.g. "Plan <id> for 1 month(s)".
    pub description: String,

    /// When the provider must stop accepting payment. Matches the draft
    /// invoice's `due_at`.
    pub expires_at: Timestamp,
}

/// Checkout session for payment completion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutSession {
    /// Provider's session ID.
    pub session_id: String,

    /// URL for customer to complete checkout.
    pub checkout_url: String,
}

/// Parsed, signature-verified webhook event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PaymentEvent {
    /// Checkout completed and paid.
    Completed { session_id: String },

    /// Checkout failed or expired.
    Failed { session_id: String },

    /// Verified but irrelevant to billing state.
    Unhandled { event_type: String },
}

impl PaymentEvent {
    pub fn session_id(&self) -> Option<&str> {
        match self {
            PaymentEvent::Completed { session_id } | PaymentEvent::Failed { session_id } => {
                Some(session_id)
            }
            PaymentEvent::Unhandled { .. } => None,
        }
    }
}

/// Errors from payment provider operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentError {
    /// Error code for categorization.
    pub code: PaymentErrorCode,

    /// Human-readable message.
    pub message: String,

    /// Whether the operation can be retried.
    pub retryable: bool,
}

impl PaymentError {
    /// Create a new payment error.
    pub fn new(code: PaymentErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            retryable: code.is_retryable(),
        }
    }

    /// Create a network error.
    pub fn network(message: impl Into<String>) -> Self {
        Self::new(PaymentErrorCode::NetworkError, message)
    }

    /// Create an authentication error.
    pub fn authentication(message: impl Into<String>) -> Self {
        Self::new(PaymentErrorCode::AuthenticationError, message)
    }

    /// Create an invalid webhook error.
    pub fn invalid_webhook(message: impl Into<String>) -> Self {
        Self::new(PaymentErrorCode::InvalidWebhook, message)
    }

    /// Create a provider API error.
    pub fn provider(message: impl Into<String>) -> Self {
        Self::new(PaymentErrorCode::ProviderError, message)
    }
}

impl std::fmt::Display for PaymentError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for PaymentError {}

impl From<PaymentError> for BillingError {
    fn from(err: PaymentError) -> Self {
        match err.code {
            PaymentErrorCode::InvalidWebhook => BillingError::InvalidWebhookSignature,
            _ => BillingError::gateway(err.to_string(), err.retryable),
        }
    }
}

/// Payment error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentErrorCode {
    /// Network connectivity issue.
    NetworkError,

    /// API authentication failed.
    AuthenticationError,

    /// Rate limit exceeded.
    RateLimitExceeded,

    /// Invalid webhook signature or payload.
    InvalidWebhook,

    /// Provider API error.
    ProviderError,
}

impl PaymentErrorCode {
    /// Check if this error type is typically retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            PaymentErrorCode::NetworkError | PaymentErrorCode::RateLimitExceeded
        )
    }
}

impl std::fmt::Display for PaymentErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PaymentErrorCode::NetworkError => "network_error",
            PaymentErrorCode::AuthenticationError => "authentication_error",
            PaymentErrorCode::RateLimitExceeded => "rate_limit_exceeded",
            PaymentErrorCode::InvalidWebhook => "invalid_webhook",
            PaymentErrorCode::ProviderError => "provider_error",
        };
        write!(f, "{}", s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payment_gateway_is_object_safe() {
        fn _accepts_dyn(_gateway: &dyn PaymentGateway) {}
    }

    #[test]
    fn payment_error_retryable() {
        assert!(PaymentErrorCode::NetworkError.is_retryable());
        assert!(PaymentErrorCode::RateLimitExceeded.is_retryable());
        assert!(!PaymentErrorCode::InvalidWebhook.is_retryable());
        assert!(!PaymentErrorCode::AuthenticationError.is_retryable());
    }

    #[test]
    fn invalid_webhook_maps_to_signature_error() {
        let err: BillingError = PaymentError::invalid_webhook("bad sig").into();
        assert_eq!(err, BillingError::InvalidWebhookSignature);
    }

    #[test]
    fn network_error_maps_to_retryable_gateway_error() {
        let err: BillingError = PaymentError::network("timeout").into();
        assert!(matches!(err, BillingError::Gateway { retryable: true, .. }));
    }

    #[test]
    fn event_session_id_is_none_for_unhandled() {
        let event = PaymentEvent::Unhandled {
            event_type: "invoice.created".to_string(),
        };
        assert_eq!(event.session_id(), None);
        let done = PaymentEvent::Completed {
            session_id: "cs_1".to_string(),
        };
        assert_eq!(done.session_id(), Some("cs_1"));
    }
}
