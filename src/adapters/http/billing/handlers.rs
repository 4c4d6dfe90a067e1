//! HTTP handlers for billing endpoints.
//!
//! These handlers connect Axum routes to the billing command/query handlers.
//! The authenticated customer id is passed explicitly into every command.

use std::sync::Arc;

use axum::extract::{Json, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;

use crate::application::handlers::{
    CancelSubscriptionCommand, CancelSubscriptionHandler, DowngradeSubscriptionCommand,
    DowngradeSubscriptionHandler, DraftSettings, GetActiveSubscriptionHandler,
    GetActiveSubscriptionQuery, HandlePaymentEventCommand, HandlePaymentEventHandler,
    ListInvoicesHandler, ListInvoicesQuery, SubscribeCommand, SubscribeHandler,
    UpgradeSubscriptionCommand, UpgradeSubscriptionHandler,
};
use crate::domain::billing::{BillingError, BillingErrorKind};
use crate::domain::foundation::DomainError;
use crate::ports::{BillingLedger, CatalogRepository, PaymentGateway};

use super::super::middleware::{AuthState, AuthenticatedCustomer};
use super::dto::{
    ActiveSubscriptionResponse, CheckoutResponse, ErrorResponse, InvoiceListResponse,
    InvoiceResponse, PlanChangeRequest, SubscriptionResponse, WebhookAckResponse,
};

/// Header carrying the provider's webhook signature.
pub const SIGNATURE_HEADER: &str = "Stripe-Signature";

// ════════════════════════════════════════════════════════════════════════════════
// Application State
// ════════════════════════════════════════════════════════════════════════════════

/// Shared application state containing all dependencies.
///
/// Cloned for each request; handlers are built on demand from the Arc-wrapped
/// ports.
#[derive(Clone)]
pub struct BillingAppState {
    pub catalog: Arc<dyn CatalogRepository>,
    pub ledger: Arc<dyn BillingLedger>,
    pub gateway: Arc<dyn PaymentGateway>,
    pub draft_settings: DraftSettings,
    pub auth: AuthState,
}

impl BillingAppState {
    pub fn subscribe_handler(&self) -> SubscribeHandler {
        SubscribeHandler::new(
            self.catalog.clone(),
            self.ledger.clone(),
            self.gateway.clone(),
            self.draft_settings,
        )
    }

    pub fn upgrade_handler(&self) -> UpgradeSubscriptionHandler {
        UpgradeSubscriptionHandler::new(
            self.catalog.clone(),
            self.ledger.clone(),
            self.gateway.clone(),
            self.draft_settings,
        )
    }

    pub fn downgrade_handler(&self) -> DowngradeSubscriptionHandler {
        DowngradeSubscriptionHandler::new(self.catalog.clone(), self.ledger.clone())
    }

    pub fn cancel_handler(&self) -> CancelSubscriptionHandler {
        CancelSubscriptionHandler::new(self.ledger.clone())
    }

    pub fn active_subscription_handler(&self) -> GetActiveSubscriptionHandler {
        GetActiveSubscriptionHandler::new(self.ledger.clone())
    }

    pub fn list_invoices_handler(&self) -> ListInvoicesHandler {
        ListInvoicesHandler::new(self.ledger.clone())
    }

    pub fn payment_event_handler(&self) -> HandlePaymentEventHandler {
        HandlePaymentEventHandler::new(
            self.ledger.clone(),
            self.catalog.clone(),
            self.gateway.clone(),
        )
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Query Handlers (GET endpoints)
// ════════════════════════════════════════════════════════════════════════════════

/// GET /subscriptions - Current active subscription
pub async fn get_active_subscription(
    State(state): State<BillingAppState>,
    customer: AuthenticatedCustomer,
) -> Result<impl IntoResponse, BillingApiError> {
    let result = state
        .active_subscription_handler()
        .handle(GetActiveSubscriptionQuery {
            customer_id: customer.customer_id,
        })
        .await?;

    Ok(Json(ActiveSubscriptionResponse::from(result)))
}

/// GET /invoices - Invoice history, newest first
pub async fn list_invoices(
    State(state): State<BillingAppState>,
    customer: AuthenticatedCustomer,
) -> Result<impl IntoResponse, BillingApiError> {
    let result = state
        .list_invoices_handler()
        .handle(ListInvoicesQuery {
            customer_id: customer.customer_id,
        })
        .await?;

    Ok(Json(InvoiceListResponse {
        invoices: result.invoices.into_iter().map(InvoiceResponse::from).collect(),
    }))
}

// ════════════════════════════════════════════════════════════════════════════════
// Command Handlers (POST endpoints)
// ════════════════════════════════════════════════════════════════════════════════

/// POST /subscriptions - Subscribe to a plan
pub async fn subscribe(
    State(state): State<BillingAppState>,
    customer: AuthenticatedCustomer,
    Json(req): Json<PlanChangeRequest>,
) -> Result<impl IntoResponse, BillingApiError> {
    let result = state
        .subscribe_handler()
        .handle(SubscribeCommand {
            customer_id: customer.customer_id,
            plan_id: req.plan_id,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(CheckoutResponse::from(result))))
}

/// POST /subscriptions/upgrade - Upgrade with proration credit
pub async fn upgrade(
    State(state): State<BillingAppState>,
    customer: AuthenticatedCustomer,
    Json(req): Json<PlanChangeRequest>,
) -> Result<impl IntoResponse, BillingApiError> {
    let result = state
        .upgrade_handler()
        .handle(UpgradeSubscriptionCommand {
            customer_id: customer.customer_id,
            plan_id: req.plan_id,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(CheckoutResponse::from(result))))
}

/// POST /subscriptions/downgrade - Record a downgrade for the next renewal
pub async fn downgrade(
    State(state): State<BillingAppState>,
    customer: AuthenticatedCustomer,
    Json(req): Json<PlanChangeRequest>,
) -> Result<impl IntoResponse, BillingApiError> {
    let result = state
        .downgrade_handler()
        .handle(DowngradeSubscriptionCommand {
            customer_id: customer.customer_id,
            plan_id: req.plan_id,
        })
        .await?;

    Ok(Json(SubscriptionResponse::from(result.subscription)))
}

/// POST /subscriptions/cancel - Stop renewal reminders
pub async fn cancel(
    State(state): State<BillingAppState>,
    customer: AuthenticatedCustomer,
) -> Result<impl IntoResponse, BillingApiError> {
    let result = state
        .cancel_handler()
        .handle(CancelSubscriptionCommand {
            customer_id: customer.customer_id,
        })
        .await?;

    Ok(Json(SubscriptionResponse::from(result.subscription)))
}

// ════════════════════════════════════════════════════════════════════════════════
// Webhook Handler
// ════════════════════════════════════════════════════════════════════════════════

/// POST /payment-webhook - Provider callback (no auth, signature verified)
pub async fn handle_payment_webhook(
    State(state): State<BillingAppState>,
    headers: axum::http::HeaderMap,
    body: axum::body::Bytes,
) -> Result<impl IntoResponse, BillingApiError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            BillingError::validation(SIGNATURE_HEADER, "Missing Stripe-Signature header")
        })?;

    state
        .payment_event_handler()
        .handle(HandlePaymentEventCommand {
            payload: body.to_vec(),
            signature: signature.to_string(),
        })
        .await?;

    Ok(Json(WebhookAckResponse { received: true }))
}

// ════════════════════════════════════════════════════════════════════════════════
// Error Handling
// ════════════════════════════════════════════════════════════════════════════════

/// API error type that converts billing errors to HTTP responses.
#[derive(Debug)]
pub struct BillingApiError(BillingError);

impl From<BillingError> for BillingApiError {
    fn from(err: BillingError) -> Self {
        Self(err)
    }
}

impl From<DomainError> for BillingApiError {
    fn from(err: DomainError) -> Self {
        Self(BillingError::from(err))
    }
}

impl IntoResponse for BillingApiError {
    fn into_response(self) -> axum::response::Response {
        let status = match (&self.0, self.0.kind()) {
            (BillingError::InvalidWebhookSignature, _) => StatusCode::BAD_REQUEST,
            (_, BillingErrorKind::NotFound) => StatusCode::NOT_FOUND,
            (_, BillingErrorKind::CurrencyMismatch) => StatusCode::UNPROCESSABLE_ENTITY,
            (_, BillingErrorKind::InvalidState) => StatusCode::CONFLICT,
            (_, BillingErrorKind::Gateway) => StatusCode::BAD_GATEWAY,
            (_, BillingErrorKind::Validation) => StatusCode::BAD_REQUEST,
            (_, BillingErrorKind::Internal) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        // Infrastructure details stay in the logs
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self.0, "Billing request failed");
            "An internal error occurred".to_string()
        } else {
            self.0.to_string()
        };

        (status, Json(ErrorResponse::new(self.0.code(), message))).into_response()
    }
}
