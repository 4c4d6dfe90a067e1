//! Adapters - Implementations of port interfaces.
//!
//! - `memory` - In-memory catalog and ledger for tests and local runs
//! - `postgres` - PostgreSQL catalog and ledger
//! - `stripe` - Stripe Checkout gateway and a mock gateway
//! - `notification` - Renewal reminder delivery
//! - `http` - Axum routes for customers and the payment webhook
//! - `jobs` - Periodic sweep and reminder passes

pub mod http;
pub mod jobs;
pub mod memory;
pub mod notification;
pub mod postgres;
pub mod stripe;

pub use jobs::{BillingJobRunner, BillingJobsConfig};
pub use memory::{InMemoryBillingLedger, InMemoryCatalog};
pub use notification::LogRenewalNotifier;
pub use postgres::{PostgresBillingLedger, PostgresCatalogRepository};
pub use stripe::{MockPaymentGateway, StripePaymentGateway};
