//! Domain layer containing business logic and domain types.
//!
//! # Module Organization
//!
//! - `foundation` - Shared domain primitives (IDs, timestamps, errors, state machines)
//! - `billing` - Invoices, subscriptions, pricing and proration

pub mod billing;
pub mod foundation;
