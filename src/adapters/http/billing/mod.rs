//! HTTP adapter for billing endpoints.
//!
//! Exposes the subscription lifecycle via REST API:
//! - `GET /subscriptions` - Current active subscription
//! - `POST /subscriptions` - Subscribe to a plan
//! - `POST /subscriptions/upgrade` - Upgrade with proration credit
//! - `POST /subscriptions/downgrade` - Downgrade at next renewal
//! - `POST /subscriptions/cancel` - Cancel renewal
//! - `GET /invoices` - Invoice history
//! - `POST /payment-webhook` - Payment provider callback

pub mod dto;
pub mod handlers;
pub mod routes;

pub use dto::*;
pub use handlers::{BillingApiError, BillingAppState, SIGNATURE_HEADER};
pub use routes::{billing_router, billing_routes, webhook_routes};
