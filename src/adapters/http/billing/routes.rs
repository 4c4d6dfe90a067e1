//! Axum router configuration for billing endpoints.

use std::time::Duration;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use super::super::middleware::auth_middleware;
use super::handlers::{
    cancel, downgrade, get_active_subscription, handle_payment_webhook, list_invoices, subscribe,
    upgrade, BillingAppState,
};

/// Customer-facing routes. All require an authenticated customer.
///
/// # Routes
/// - `GET /subscriptions` - Current active subscription
/// - `POST /subscriptions` - Subscribe to a plan
/// - `POST /subscriptions/upgrade` - Upgrade with proration credit
/// - `POST /subscriptions/downgrade` - Record a downgrade for the next renewal
/// - `POST /subscriptions/cancel` - Cancel renewal
/// - `GET /invoices` - Invoice history
pub fn billing_routes() -> Router<BillingAppState> {
    Router::new()
        .route("/subscriptions", get(get_active_subscription).post(subscribe))
        .route("/subscriptions/upgrade", post(upgrade))
        .route("/subscriptions/downgrade", post(downgrade))
        .route("/subscriptions/cancel", post(cancel))
        .route("/invoices", get(list_invoices))
}

/// Payment provider callback. Not authenticated; the signature is verified.
///
/// # Routes
/// - `POST /payment-webhook`
pub fn webhook_routes() -> Router<BillingAppState> {
    Router::new().route("/payment-webhook", post(handle_payment_webhook))
}

/// The complete billing service router with tracing and a request timeout.
///
/// # Example
///
/// ```ignore
/// let app = billing_router(state, Duration::from_secs(30));
/// axum::serve(listener, app).await?;
/// ```
pub fn billing_router(state: BillingAppState, request_timeout: Duration) -> Router {
    let customer_routes = billing_routes().route_layer(middleware::from_fn_with_state(
        state.auth.clone(),
        auth_middleware,
    ));

    Router::new()
        .merge(customer_routes)
        .merge(webhook_routes())
        .layer(TimeoutLayer::new(request_timeout))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
