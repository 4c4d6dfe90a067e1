//! Customer authentication middleware and extractor for axum.
//!
//! This module provides:
//! - `CustomerTokenVerifier` - HS256 bearer token verification
//! - `auth_middleware` - Layer that validates Bearer tokens and injects the customer into extensions
//! - `AuthenticatedCustomer` - Extractor that requires an authenticated customer
//!
//! ```text
//! Request → auth_middleware → injects AuthenticatedCustomer into extensions
//!                                      ↓
//!                              Handler → AuthenticatedCustomer extractor reads from extensions
//! ```
//!
//! The customer id is then passed explicitly into each command; nothing else
//! reads the request context.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::foundation::{CustomerId, Timestamp};

use super::super::billing::dto::ErrorResponse;

/// Auth middleware state - wraps the token verifier.
pub type AuthState = Arc<CustomerTokenVerifier>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("Token expired")]
    TokenExpired,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Token could not be issued: {0}")]
    Issue(String),
}

/// Claims carried by a customer bearer token.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CustomerClaims {
    customer_id: String,
    exp: i64,
}

/// Verifies (and, for tooling, issues) HS256 customer tokens.
pub struct CustomerTokenVerifier {
    decoding_key: DecodingKey,
    encoding_key: EncodingKey,
    validation: Validation,
}

impl CustomerTokenVerifier {
    pub fn new(secret: &SecretString) -> Self {
        let bytes = secret.expose_secret().as_bytes();
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.set_required_spec_claims(&["exp"]);

        Self {
            decoding_key: DecodingKey::from_secret(bytes),
            encoding_key: EncodingKey::from_secret(bytes),
            validation,
        }
    }

    /// Validates a token and returns the customer it names.
    pub fn verify(&self, token: &str) -> Result<CustomerId, AuthError> {
        let data = decode::<CustomerClaims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| {
                use jsonwebtoken::errors::ErrorKind;
                match e.kind() {
                    ErrorKind::ExpiredSignature => {
                        tracing::debug!("Token expired");
                        AuthError::TokenExpired
                    }
                    _ => {
                        tracing::warn!("Token validation failed: {}", e);
                        AuthError::InvalidToken
                    }
                }
            })?;

        data.claims.customer_id.parse().map_err(|_| {
            tracing::warn!("Token carries a malformed customer_id");
            AuthError::InvalidToken
        })
    }

    /// Issues a token for `customer_id` valid until `expires_at`.
    pub fn issue(&self, customer_id: CustomerId, expires_at: Timestamp) -> Result<String, AuthError> {
        let claims = CustomerClaims {
            customer_id: customer_id.to_string(),
            exp: expires_at.as_unix_secs(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AuthError::Issue(e.to_string()))
    }
}

/// Authentication middleware that validates Bearer tokens.
///
/// On success the `AuthenticatedCustomer` is injected into request
/// extensions. A missing token passes through (the extractor rejects it);
/// an invalid token is answered with 401 here.
pub async fn auth_middleware(
    State(verifier): State<AuthState>,
    mut request: Request,
    next: Next,
) -> Response {
    let token = request
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "));

    match token {
        Some(token) => match verifier.verify(token) {
            Ok(customer_id) => {
                request
                    .extensions_mut()
                    .insert(AuthenticatedCustomer { customer_id });
                next.run(request).await
            }
            Err(e) => {
                let message = match e {
                    AuthError::TokenExpired => "Token expired",
                    _ => "Invalid token",
                };
                (
                    StatusCode::UNAUTHORIZED,
                    Json(ErrorResponse::new("AUTH_ERROR", message)),
                )
                    .into_response()
            }
        },
        None => next.run(request).await,
    }
}

/// The customer on whose behalf a request is made.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthenticatedCustomer {
    pub customer_id: CustomerId,
}

/// Rejection type for AuthenticatedCustomer extraction.
#[derive(Debug)]
pub struct AuthenticationRequired;

impl IntoResponse for AuthenticationRequired {
    fn into_response(self) -> Response {
        let error = ErrorResponse::new("AUTHENTICATION_REQUIRED", "Authentication is required");
        (StatusCode::UNAUTHORIZED, Json(error)).into_response()
    }
}

impl<S> axum::extract::FromRequestParts<S> for AuthenticatedCustomer
where
    S: Send + Sync,
{
    type Rejection = AuthenticationRequired;

    fn from_request_parts<'life0, 'life1, 'async_trait>(
        parts: &'life0 mut axum::http::request::Parts,
        _state: &'life1 S,
    ) -> std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self, Self::Rejection>> + Send + 'async_trait>,
    >
    where
        'life0: 'async_trait,
        'life1: 'async_trait,
        Self: 'async_trait,
    {
        Box::pin(async move {
            parts
                .extensions
                .get::<AuthenticatedCustomer>()
                .copied()
                .ok_or(AuthenticationRequired)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn verifier(secret: &str) -> CustomerTokenVerifier {
        CustomerTokenVerifier::new(&SecretString::new(secret.to_string()))
    }

    #[test]
    fn issued_token_verifies() {
        let v = verifier("test-secret");
        let customer = CustomerId::new();
        let token = v.issue(customer, Timestamp::now().plus_hours(1)).unwrap();

        assert_eq!(v.verify(&token).unwrap(), customer);
    }

    #[test]
    fn expired_token_is_rejected() {
        let v = verifier("test-secret");
        let token = v
            .issue(CustomerId::new(), Timestamp::now().minus_hours(2))
            .unwrap();

        assert_eq!(v.verify(&token), Err(AuthError::TokenExpired));
    }

    #[test]
    fn token_signed_with_other_secret_is_rejected() {
        let token = verifier("one")
            .issue(CustomerId::new(), Timestamp::now().plus_hours(1))
            .unwrap();

        assert_eq!(verifier("two").verify(&token), Err(AuthError::InvalidToken));
    }

    #[test]
    fn garbage_token_is_rejected() {
        assert_eq!(
            verifier("test-secret").verify("not.a.jwt"),
            Err(AuthError::InvalidToken)
        );
    }
}
