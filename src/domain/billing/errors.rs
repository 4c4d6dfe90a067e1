//! Billing-specific error types.
//!
//! Every lifecycle operation returns `Result<_, BillingError>`. The specific
//! variant keeps lookups distinguishable (a missing plan is not the same thing as
//! a plan that is not sold in the customer's currency), while [`BillingErrorKind`]
//! collapses them into the coarse taxonomy used by callers.
//!
//! # HTTP Status Mapping
//!
//! | Kind | HTTP Status |
//! |------|-------------|
//! | NotFound | 404 |
//! | CurrencyMismatch | 422 |
//! | InvalidState | 409 |
//! | Gateway | 502 (400 for a bad webhook signature) |
//! | Validation | 400 |
//! | Internal | 500 |

use thiserror::Error;

use crate::domain::foundation::{
    CustomerId, DomainError, ErrorCode, InvoiceId, PlanId, ValidationError,
};

use super::CurrencyCode;

/// Coarse error taxonomy shared by all lifecycle operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BillingErrorKind {
    NotFound,
    CurrencyMismatch,
    InvalidState,
    Gateway,
    Validation,
    Internal,
}

/// Billing-specific errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BillingError {
    #[error("Customer not found: {0}")]
    CustomerNotFound(CustomerId),

    #[error("Plan not found: {0}")]
    PlanNotFound(PlanId),

    #[error("Invoice not found: {0}")]
    InvoiceNotFound(String),

    #[error("Customer {0} has no active subscription")]
    NoActiveSubscription(CustomerId),

    #[error("Customer {0} has no billing currency set")]
    CurrencyNotSet(CustomerId),

    #[error("Plan {plan_id} is not priced in {currency}")]
    PlanCurrencyMismatch { plan_id: PlanId, currency: CurrencyCode },

    #[error("Pricing record overlaps an existing record for {currency}")]
    PricingOverlap { currency: CurrencyCode },

    #[error("Cannot {attempted} while {current}")]
    InvalidState { current: String, attempted: String },

    #[error("Payment gateway error: {message}")]
    Gateway { message: String, retryable: bool },

    #[error("Invalid webhook signature")]
    InvalidWebhookSignature,

    #[error("Validation failed for '{field}': {message}")]
    ValidationFailed { field: String, message: String },

    #[error("Error: {0}")]
    Infrastructure(String),
}

impl BillingError {
    pub fn invoice_not_found(reference: impl ToString) -> Self {
        BillingError::InvoiceNotFound(reference.to_string())
    }

    pub fn invalid_state(current: impl Into<String>, attempted: impl Into<String>) -> Self {
        BillingError::InvalidState {
            current: current.into(),
            attempted: attempted.into(),
        }
    }

    pub fn gateway(message: impl Into<String>, retryable: bool) -> Self {
        BillingError::Gateway {
            message: message.into(),
            retryable,
        }
    }

    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        BillingError::ValidationFailed {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn infrastructure(message: impl Into<String>) -> Self {
        BillingError::Infrastructure(message.into())
    }

    /// Maps the error onto the coarse taxonomy.
    pub fn kind(&self) -> BillingErrorKind {
        match self {
            BillingError::CustomerNotFound(_)
            | BillingError::PlanNotFound(_)
            | BillingError::InvoiceNotFound(_)
            | BillingError::NoActiveSubscription(_) => BillingErrorKind::NotFound,
            BillingError::CurrencyNotSet(_) | BillingError::PlanCurrencyMismatch { .. } => {
                BillingErrorKind::CurrencyMismatch
            }
            BillingError::PricingOverlap { .. } | BillingError::InvalidState { .. } => {
                BillingErrorKind::InvalidState
            }
            BillingError::Gateway { .. } | BillingError::InvalidWebhookSignature => {
                BillingErrorKind::Gateway
            }
            BillingError::ValidationFailed { .. } => BillingErrorKind::Validation,
            BillingError::Infrastructure(_) => BillingErrorKind::Internal,
        }
    }

    /// Stable machine-readable code used in API error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            BillingError::CustomerNotFound(_) => "CUSTOMER_NOT_FOUND",
            BillingError::PlanNotFound(_) => "PLAN_NOT_FOUND",
            BillingError::InvoiceNotFound(_) => "INVOICE_NOT_FOUND",
            BillingError::NoActiveSubscription(_) => "NO_ACTIVE_SUBSCRIPTION",
            BillingError::CurrencyNotSet(_) => "CURRENCY_NOT_SET",
            BillingError::PlanCurrencyMismatch { .. } => "PLAN_CURRENCY_MISMATCH",
            BillingError::PricingOverlap { .. } => "PRICING_OVERLAP",
            BillingError::InvalidState { .. } => "INVALID_STATE",
            BillingError::Gateway { .. } => "GATEWAY_ERROR",
            BillingError::InvalidWebhookSignature => "INVALID_WEBHOOK_SIGNATURE",
            BillingError::ValidationFailed { .. } => "VALIDATION_FAILED",
            BillingError::Infrastructure(_) => "INTERNAL_ERROR",
        }
    }

    /// Returns true if this error should trigger a retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            BillingError::Infrastructure(_) => true,
            BillingError::Gateway { retryable, .. } => *retryable,
            _ => false,
        }
    }
}

impl From<DomainError> for BillingError {
    fn from(err: DomainError) -> Self {
        match err.code {
            ErrorCode::ValidationFailed => BillingError::ValidationFailed {
                field: err
                    .details
                    .get("field")
                    .cloned()
                    .unwrap_or_else(|| "unknown".to_string()),
                message: err.message,
            },
            ErrorCode::ExternalServiceError => BillingError::gateway(err.message, true),
            _ => BillingError::Infrastructure(err.to_string()),
        }
    }
}

impl From<ValidationError> for BillingError {
    fn from(err: ValidationError) -> Self {
        BillingError::ValidationFailed {
            field: err.field().to_string(),
            message: err.to_string(),
        }
    }
}
