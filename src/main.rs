//! Subscription billing service entry point.

use std::sync::Arc;

use subscription_billing::adapters::http::{billing_router, BillingAppState, CustomerTokenVerifier};
use subscription_billing::adapters::{
    BillingJobRunner, LogRenewalNotifier, PostgresBillingLedger, PostgresCatalogRepository,
    StripePaymentGateway,
};
use subscription_billing::application::handlers::{
    SendRenewalRemindersHandler, SweepExpiredHandler,
};
use subscription_billing::config::{AppConfig, LogFormat};
use subscription_billing::ports::{BillingLedger, CatalogRepository, PaymentGateway};
use tokio::signal;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.server.log_level));

    if config.server.log_format() == LogFormat::Json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_current_span(false)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}

fn startup_error(context: &str, e: impl std::fmt::Display) -> std::io::Error {
    tracing::error!(error = %e, "{}", context);
    std::io::Error::other(format!("{}: {}", context, e))
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    let config = AppConfig::load().map_err(|e| {
        eprintln!("Failed to load configuration: {}", e);
        std::io::Error::other(format!("Configuration error: {}", e))
    })?;

    init_tracing(&config);

    config
        .validate()
        .map_err(|e| startup_error("Invalid configuration", e))?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        environment = ?config.server.environment,
        stripe_test_mode = config.payment.is_test_mode(),
        draft_ttl_minutes = config.billing.draft_ttl_minutes,
        "Starting subscription-billing"
    );

    let pool = config
        .database
        .connect()
        .await
        .map_err(|e| startup_error("Failed to connect to database", e))?;

    if config.database.run_migrations {
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| startup_error("Failed to run migrations", e))?;
        tracing::info!("Migrations applied");
    }

    let catalog: Arc<dyn CatalogRepository> =
        Arc::new(PostgresCatalogRepository::new(pool.clone()));
    let ledger: Arc<dyn BillingLedger> = Arc::new(PostgresBillingLedger::new(pool));
    let gateway: Arc<dyn PaymentGateway> =
        Arc::new(StripePaymentGateway::new(config.payment.stripe_config()));
    let draft_settings = config.billing.draft_settings();

    let jobs = BillingJobRunner::new(
        SweepExpiredHandler::new(ledger.clone()),
        SendRenewalRemindersHandler::new(
            catalog.clone(),
            ledger.clone(),
            gateway.clone(),
            Arc::new(LogRenewalNotifier::new()),
            draft_settings,
            config.billing.reminder_policy(),
        ),
        config.billing.jobs_config(),
    );
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let jobs_handle = tokio::spawn(async move { jobs.run(shutdown_rx).await });

    let state = BillingAppState {
        catalog,
        ledger,
        gateway,
        draft_settings,
        auth: Arc::new(CustomerTokenVerifier::new(&config.auth.jwt_secret)),
    };
    let app = billing_router(state, config.server.request_timeout());

    let addr = config
        .server
        .socket_addr()
        .map_err(|e| startup_error("Invalid bind address", e))?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(address = %addr, "Listening");

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    let _ = shutdown_tx.send(true);
    if let Err(e) = jobs_handle.await {
        tracing::error!(error = %e, "Billing jobs task failed");
    }

    if let Err(e) = served {
        tracing::error!(error = %e, "Server error");
        return Err(e);
    }

    tracing::info!("Service shutdown complete");
    Ok(())
}
