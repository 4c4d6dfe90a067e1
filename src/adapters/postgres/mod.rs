//! PostgreSQL adapters - Database implementations for repository ports.
//!
//! - `PostgresBillingLedger` - Invoices, subscriptions and reminder records
//! - `PostgresCatalogRepository` - Customers, plans and pricing records
//!
//! The schema lives in `migrations/`.

mod billing_ledger;
mod catalog_repository;

pub use billing_ledger::PostgresBillingLedger;
pub use catalog_repository::PostgresCatalogRepository;
