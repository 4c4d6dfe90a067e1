//! In-memory adapters for tests and local development.

mod billing_ledger;
mod catalog_repository;

pub use billing_ledger::InMemoryBillingLedger;
pub use catalog_repository::InMemoryCatalog;
