//! Stripe payment gateway adapter.
//!
//! - `StripePaymentGateway` opens one-off Checkout sessions sized to an
//!   invoice and verifies webhook deliveries
//! - `MockPaymentGateway` records calls for tests and local runs

mod mock_payment_gateway;
mod signature;
mod stripe_adapter;
mod webhook_types;

pub use mock_payment_gateway::{MethodCall, MockPaymentGateway};
pub use signature::{SignatureHeader, SignatureParseError, SignatureRejection};
pub use stripe_adapter::{StripeConfig, StripePaymentGateway};
pub use webhook_types::{StripeCheckoutSession, StripeEventData, StripeWebhookEvent};
