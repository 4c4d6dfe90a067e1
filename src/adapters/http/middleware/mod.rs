//! HTTP middleware for axum.
//!
//! - `auth` - Customer authentication middleware and extractor

pub mod auth;

pub use auth::{
    auth_middleware, AuthError, AuthState, AuthenticatedCustomer, AuthenticationRequired,
    CustomerTokenVerifier,
};
