//! Stripe payment gateway adapter.
//!
//! Implements the `PaymentGateway` port against the Stripe API: one-off
//! checkout sessions sized to an invoice, and webhook signature verification.
//!
//! Signatures are checked by [`super::signature`] before the body is parsed.
//!
//! # Configuration
//!
//! ```ignore
//! let config = StripeConfig::new(api_key, webhook_secret)
//!     .with_redirect_urls(success_url, cancel_url);
//! let gateway = StripePaymentGateway::new(config);
//! ```

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};

use crate::domain::foundation::Timestamp;
use crate::ports::{
    CheckoutRequest, CheckoutSession, PaymentError, PaymentErrorCode, PaymentEvent,
    PaymentGateway,
};

use super::signature::SignatureHeader;
use super::webhook_types::{StripeCheckoutSession, StripeWebhookEvent};

#[derive(Clone)]
pub struct StripeConfig {
    api_key: SecretString,
    webhook_secret: SecretString,
    api_base_url: String,
    success_url: String,
    cancel_url: String,
    /// Refuse events with `livemode: false`
    require_livemode: bool,
}

impl StripeConfig {
    pub fn new(api_key: impl Into<String>, webhook_secret: impl Into<String>) -> Self {
        Self {
            api_key: SecretString::new(api_key.into()),
            webhook_secret: SecretString::new(webhook_secret.into()),
            api_base_url: "https://api.stripe.com".to_string(),
            success_url: "http://localhost:3000/payment/success".to_string(),
            cancel_url: "http://localhost:3000/payment/cancel".to_string(),
            require_livemode: false,
        }
    }

    /// Point at a stub server in tests.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into();
        self
    }

    pub fn with_redirect_urls(
        mut self,
        success_url: impl Into<String>,
        cancel_url: impl Into<String>,
    ) -> Self {
        self.success_url = success_url.into();
        self.cancel_url = cancel_url.into();
        self
    }

    pub fn with_require_livemode(mut self, require: bool) -> Self {
        self.require_livemode = require;
        self
    }
}

/// Stripe implementation of [`PaymentGateway`].
pub struct StripePaymentGateway {
    config: StripeConfig,
    http_client: reqwest::Client,
}

impl StripePaymentGateway {
    pub fn new(config: StripeConfig) -> Self {
        Self {
            config,
            http_client: reqwest::Client::new(),
        }
    }

    /// Header, freshness and HMAC checks, in that order.
    fn authenticate(
        &self,
        payload: &[u8],
        signature: &str,
        now: Timestamp,
    ) -> Result<(), PaymentError> {
        let header = SignatureHeader::parse(signature).map_err(|e| {
            tracing::warn!(error = %e, "Unparseable Stripe-Signature header");
            PaymentError::invalid_webhook(e.to_string())
        })?;

        header
            .verify(&self.config.webhook_secret, payload, now)
            .map_err(|rejection| {
                tracing::warn!(
                    signed_at = header.timestamp,
                    reason = %rejection,
                    "Webhook signature rejected"
                );
                PaymentError::invalid_webhook(rejection.to_string())
            })
    }

    fn decode_event(&self, payload: &[u8]) -> Result<StripeWebhookEvent, PaymentError> {
        let event: StripeWebhookEvent = serde_json::from_slice(payload)
            .map_err(|e| PaymentError::invalid_webhook(format!("Undecodable event body: {}", e)))?;

        if self.config.require_livemode && !event.livemode {
            tracing::warn!(event_id = %event.id, "Test-mode event refused");
            return Err(PaymentError::invalid_webhook("test-mode event refused"));
        }

        Ok(event)
    }

    fn checkout_params(&self, request: &CheckoutRequest) -> Vec<(&'static str, String)> {
        vec![
            ("mode", "payment".to_string()),
            (
                "line_items[0][price_data][currency]",
                request.currency.as_str().to_ascii_lowercase(),
            ),
            (
                "line_items[0][price_data][unit_amount]",
                request.amount_minor.to_string(),
            ),
            (
                "line_items[0][price_data][product_data][name]",
                request.line_name.clone(),
            ),
            (
                "line_items[0][price_data][product_data][description]",
                request.description.clone(),
            ),
            ("line_items[0][quantity]", "1".to_string()),
            ("expires_at", request.expires_at.as_unix_secs().to_string()),
            ("success_url", self.config.success_url.clone()),
            ("cancel_url", self.config.cancel_url.clone()),
        ]
    }
}

#[async_trait]
impl PaymentGateway for StripePaymentGateway {
    async fn create_checkout_session(
        &self,
        request: CheckoutRequest,
    ) -> Result<CheckoutSession, PaymentError> {
        let url = format!("{}/v1/checkout/sessions", self.config.api_base_url);

        let response = self
            .http_client
            .post(&url)
            .basic_auth(self.config.api_key.expose_secret(), Option::<&str>::None)
            .form(&self.checkout_params(&request))
            .send()
            .await
            .map_err(|e| PaymentError::network(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(PaymentError::authentication("Stripe rejected the API key"));
        }
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(PaymentError::new(
                PaymentErrorCode::RateLimitExceeded,
                "Stripe rate limit exceeded",
            ));
        }
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(PaymentError::provider(format!(
                "Stripe API error: {}",
                error_text
            )));
        }

        let session: StripeCheckoutSession = response.json().await.map_err(|e| {
            PaymentError::provider(format!("Failed to parse Stripe response: {}", e))
        })?;

        let checkout_url = session
            .url
            .unwrap_or_else(|| format!("https://checkout.stripe.com/c/pay/{}", session.id));

        tracing::debug!(session_id = %session.id, "Created Stripe checkout session");

        Ok(CheckoutSession {
            session_id: session.id,
            checkout_url,
        })
    }

    async fn verify_webhook(
        &self,
        payload: &[u8],
        signature: &str,
    ) -> Result<PaymentEvent, PaymentError> {
        self.authenticate(payload, signature, Timestamp::now())?;
        let event = self.decode_event(payload)?;

        tracing::info!(
            event_id = %event.id,
            event_type = %event.event_type,
            "Verified Stripe webhook"
        );

        event.to_payment_event()
    }
}

#[cfg(test)]
mod tests {
    use super::super::signature::sign;
    use super::*;
    use crate::domain::billing::CurrencyCode;

    const WEBHOOK_SECRET: &str = "whsec_adapter_test";

    const COMPLETED: &str = r#"{
        "id": "evt_test",
        "type": "checkout.session.completed",
        "created": 1704067200,
        "livemode": false,
        "data": {"object": {"id": "cs_test_abc", "object": "checkout.session"}}
    }"#;

    fn gateway() -> StripePaymentGateway {
        StripePaymentGateway::new(StripeConfig::new("sk_test_key", WEBHOOK_SECRET))
    }

    fn signed_now(body: &str) -> String {
        let t = Timestamp::now().as_unix_secs();
        format!(
            "t={},v1={}",
            t,
            hex::encode(sign(WEBHOOK_SECRET.as_bytes(), t, body.as_bytes()))
        )
    }

    #[test]
    fn builder_overrides_defaults() {
        let config = StripeConfig::new("sk_test_key", WEBHOOK_SECRET)
            .with_base_url("http://127.0.0.1:12111")
            .with_redirect_urls("https://shop/ok", "https://shop/no")
            .with_require_livemode(true);

        assert_eq!(config.api_base_url, "http://127.0.0.1:12111");
        assert_eq!(config.success_url, "https://shop/ok");
        assert_eq!(config.cancel_url, "https://shop/no");
        assert!(config.require_livemode);
    }

    #[test]
    fn checkout_is_a_single_line_item_for_the_invoice_total() {
        let params = gateway().checkout_params(&CheckoutRequest {
            amount_minor: 1100,
            currency: CurrencyCode::new("USD").unwrap(),
            line_name: "Subscription Plan".to_string(),
            description: "Plan x for 1 month(s)".to_string(),
            expires_at: Timestamp::from_unix_secs(1_767_232_800).unwrap(),
        });

        let value = |key: &str| {
            params
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.as_str())
                .unwrap()
        };
        assert_eq!(value("mode"), "payment");
        assert_eq!(value("line_items[0][price_data][currency]"), "usd");
        assert_eq!(value("line_items[0][price_data][unit_amount]"), "1100");
        assert_eq!(value("line_items[0][quantity]"), "1");
        assert_eq!(value("expires_at"), "1767232800");
        assert_eq!(
            value("line_items[0][price_data][product_data][name]"),
            "Subscription Plan"
        );
    }

    #[tokio::test]
    async fn signed_completed_event_maps_to_session_id() {
        let event = gateway()
            .verify_webhook(COMPLETED.as_bytes(), &signed_now(COMPLETED))
            .await
            .unwrap();

        assert_eq!(
            event,
            PaymentEvent::Completed {
                session_id: "cs_test_abc".to_string()
            }
        );
    }

    #[tokio::test]
    async fn unsigned_or_tampered_bodies_are_invalid() {
        let gw = gateway();

        let garbage = gw
            .verify_webhook(COMPLETED.as_bytes(), "garbage")
            .await
            .unwrap_err();
        assert_eq!(garbage.code, PaymentErrorCode::InvalidWebhook);

        let tampered = gw
            .verify_webhook(br#"{"id":"evt_other"}"#, &signed_now(COMPLETED))
            .await
            .unwrap_err();
        assert_eq!(tampered.code, PaymentErrorCode::InvalidWebhook);
    }

    #[tokio::test]
    async fn signed_but_undecodable_body_is_invalid() {
        let body = "not json";
        let err = gateway()
            .verify_webhook(body.as_bytes(), &signed_now(body))
            .await
            .unwrap_err();
        assert!(err.message.contains("Undecodable"));
    }

    #[tokio::test]
    async fn test_mode_event_refused_when_livemode_required() {
        let gw = StripePaymentGateway::new(
            StripeConfig::new("sk_live_key", WEBHOOK_SECRET).with_require_livemode(true),
        );
        let err = gw
            .verify_webhook(COMPLETED.as_bytes(), &signed_now(COMPLETED))
            .await
            .unwrap_err();
        assert_eq!(err.code, PaymentErrorCode::InvalidWebhook);
    }
}
