//! Payment configuration (Stripe Checkout)

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::adapters::stripe::StripeConfig;

use super::error::ValidationError;

#[derive(Debug, Clone, Deserialize)]
pub struct PaymentConfig {
    pub stripe_api_key: SecretString,

    /// Webhook signing secret (`whsec_...`)
    pub stripe_webhook_secret: SecretString,

    /// Where Checkout redirects after payment
    #[serde(default = "default_success_url")]
    pub success_url: String,

    /// Where Checkout redirects when the customer backs out
    #[serde(default = "default_cancel_url")]
    pub cancel_url: String,

    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Reject webhook events sent in test mode
    #[serde(default)]
    pub require_livemode: bool,
}

impl PaymentConfig {
    pub fn is_test_mode(&self) -> bool {
        self.stripe_api_key.expose_secret().starts_with("sk_test_")
    }

    /// Gateway settings for [`crate::adapters::stripe::StripePaymentGateway`].
    pub fn stripe_config(&self) -> StripeConfig {
        StripeConfig::new(
            self.stripe_api_key.expose_secret().clone(),
            self.stripe_webhook_secret.expose_secret().clone(),
        )
        .with_base_url(self.api_base_url.clone())
        .with_redirect_urls(self.success_url.clone(), self.cancel_url.clone())
        .with_require_livemode(self.require_livemode)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        let api_key = self.stripe_api_key.expose_secret();
        let webhook_secret = self.stripe_webhook_secret.expose_secret();

        if api_key.is_empty() {
            return Err(ValidationError::MissingRequired("PAYMENT__STRIPE_API_KEY"));
        }
        if webhook_secret.is_empty() {
            return Err(ValidationError::MissingRequired(
                "PAYMENT__STRIPE_WEBHOOK_SECRET",
            ));
        }
        if !api_key.starts_with("sk_") {
            return Err(ValidationError::InvalidStripeKey);
        }
        if !webhook_secret.starts_with("whsec_") {
            return Err(ValidationError::InvalidStripeWebhookSecret);
        }

        for (name, url) in [
            ("payment.success_url", &self.success_url),
            ("payment.cancel_url", &self.cancel_url),
            ("payment.api_base_url", &self.api_base_url),
        ] {
            if !url.starts_with("https://") && !url.starts_with("http://") {
                return Err(ValidationError::InvalidUrl(name));
            }
        }
        Ok(())
    }
}

fn default_success_url() -> String {
    "http://localhost:3000/billing/success".to_string()
}

fn default_cancel_url() -> String {
    "http://localhost:3000/billing/cancel".to_string()
}

fn default_api_base_url() -> String {
    "https://api.stripe.com".to_string()
}
