//! Mock payment gateway for testing.
//!
//! Provides a configurable mock implementation of `PaymentGateway` for unit
//! and integration tests. Supports:
//! - Pre-configured checkout sessions
//! - Error injection
//! - Call tracking
//! - Webhook event simulation

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::ports::{CheckoutRequest, CheckoutSession, PaymentError, PaymentEvent, PaymentGateway};

use super::webhook_types::StripeWebhookEvent;

/// Mock payment gateway for testing.
///
/// # Example
///
/// ```ignore
/// let mock = MockPaymentGateway::new();
/// mock.set_method_error("create_checkout_session", PaymentError::network("down"));
/// let result = mock.create_checkout_session(request).await;
/// ```
#[derive(Default)]
pub struct MockPaymentGateway {
    inner: Arc<Mutex<MockState>>,
}

#[derive(Default)]
struct MockState {
    /// Next checkout session to return.
    next_checkout: Option<CheckoutSession>,

    /// Next webhook event to return.
    next_webhook_event: Option<PaymentEvent>,

    /// Error to return on next call.
    next_error: Option<PaymentError>,

    /// Specific errors by method name.
    method_errors: HashMap<String, PaymentError>,

    /// Every checkout request received, in order.
    checkout_requests: Vec<CheckoutRequest>,

    call_log: Vec<MethodCall>,

    reject_webhooks: bool,
}

/// Recorded method call for assertions.
#[derive(Debug, Clone)]
pub struct MethodCall {
    pub method: String,
    pub args: Vec<String>,
}

impl MockPaymentGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mock that fails all webhook verifications.
    pub fn rejecting_webhooks() -> Self {
        let mock = Self::new();
        mock.state().reject_webhooks = true;
        mock
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Configuration Methods
    // ════════════════════════════════════════════════════════════════════════════

    /// Set the checkout session to return on the next call.
    pub fn set_checkout_session(&self, session: CheckoutSession) {
        self.state().next_checkout = Some(session);
    }

    /// Set the event every webhook verification returns.
    pub fn set_webhook_event(&self, event: PaymentEvent) {
        self.state().next_webhook_event = Some(event);
    }

    /// Set an error to return on the next call to any method.
    pub fn set_error(&self, error: PaymentError) {
        self.state().next_error = Some(error);
    }

    /// Set an error for a specific method.
    pub fn set_method_error(&self, method: &str, error: PaymentError) {
        self.state().method_errors.insert(method.to_string(), error);
    }

    pub fn clear_errors(&self) {
        let mut state = self.state();
        state.next_error = None;
        state.method_errors.clear();
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Call Tracking
    // ════════════════════════════════════════════════════════════════════════════

    pub fn calls(&self) -> Vec<MethodCall> {
        self.state().call_log.clone()
    }

    pub fn was_called(&self, method: &str) -> bool {
        self.state().call_log.iter().any(|c| c.method == method)
    }

    pub fn call_count(&self, method: &str) -> usize {
        self.state()
            .call_log
            .iter()
            .filter(|c| c.method == method)
            .count()
    }

    /// Checkout requests seen so far.
    pub fn checkout_requests(&self) -> Vec<CheckoutRequest> {
        self.state().checkout_requests.clone()
    }

    /// The most recent checkout request, if any.
    pub fn last_checkout_request(&self) -> Option<CheckoutRequest> {
        self.state().checkout_requests.last().cloned()
    }

    pub fn clear_calls(&self) {
        let mut state = self.state();
        state.call_log.clear();
        state.checkout_requests.clear();
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Internal Helpers
    // ════════════════════════════════════════════════════════════════════════════

    fn state(&self) -> std::sync::MutexGuard<'_, MockState> {
        // A poisoned lock only happens after a panicking test thread.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn record_call(&self, method: &str, args: Vec<String>) {
        self.state().call_log.push(MethodCall {
            method: method.to_string(),
            args,
        });
    }

    fn check_error(&self, method: &str) -> Result<(), PaymentError> {
        let mut state = self.state();

        if let Some(error) = state.method_errors.get(method) {
            return Err(error.clone());
        }

        // Global error is consumed
        if let Some(error) = state.next_error.take() {
            return Err(error);
        }

        Ok(())
    }
}

impl Clone for MockPaymentGateway {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

#[async_trait]
impl PaymentGateway for MockPaymentGateway {
    async fn create_checkout_session(
        &self,
        request: CheckoutRequest,
    ) -> Result<CheckoutSession, PaymentError> {
        self.record_call(
            "create_checkout_session",
            vec![
                request.amount_minor.to_string(),
                request.currency.to_string(),
                request.description.clone(),
            ],
        );
        self.check_error("create_checkout_session")?;

        let mut state = self.state();
        state.checkout_requests.push(request);

        let session = state.next_checkout.take().unwrap_or_else(|| {
            let id = format!("cs_mock_{}", uuid::Uuid::new_v4().simple());
            CheckoutSession {
                checkout_url: format!("https://checkout.stripe.com/c/pay/{}", id),
                session_id: id,
            }
        });

        Ok(session)
    }

    async fn verify_webhook(
        &self,
        payload: &[u8],
        signature: &str,
    ) -> Result<PaymentEvent, PaymentError> {
        self.record_call(
            "verify_webhook",
            vec![
                String::from_utf8_lossy(payload).chars().take(50).collect(),
                signature.chars().take(20).collect(),
            ],
        );
        self.check_error("verify_webhook")?;

        let state = self.state();
        if state.reject_webhooks {
            return Err(PaymentError::invalid_webhook("Verification disabled"));
        }

        if let Some(event) = &state.next_webhook_event {
            return Ok(event.clone());
        }

        // Accept any signature and read the Stripe-shaped payload
        let event: StripeWebhookEvent = serde_json::from_slice(payload)
            .map_err(|e| PaymentError::invalid_webhook(e.to_string()))?;
        event.to_payment_event()
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Test Helpers
// ════════════════════════════════════════════════════════════════════════════════

impl MockPaymentGateway {
    /// A Stripe-shaped checkout event payload for a session.
    pub fn checkout_event_payload(event_type: &str, session_id: &str) -> Vec<u8> {
        serde_json::json!({
            "id": format!("evt_{}", uuid::Uuid::new_v4().simple()),
            "type": event_type,
            "created": chrono::Utc::now().timestamp(),
            "livemode": false,
            "data": {"object": {"id": session_id, "object": "checkout.session"}}
        })
        .to_string()
        .into_bytes()
    }

    pub fn completed_payload(session_id: &str) -> Vec<u8> {
        Self::checkout_event_payload("checkout.session.completed", session_id)
    }

    pub fn expired_payload(session_id: &str) -> Vec<u8> {
        Self::checkout_event_payload("checkout.session.expired", session_id)
    }
}
