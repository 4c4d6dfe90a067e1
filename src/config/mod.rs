//! Application configuration module
//!
//! Configuration is read from environment variables with the
//! `SUBSCRIPTION_BILLING` prefix; nested values are separated by `__`.
//!
//! # Example
//!
//! ```no_run
//! use subscription_billing::config::AppConfig;
//!
//! let config = AppConfig::load().expect("Failed to load configuration");
//! config.validate().expect("Invalid configuration");
//! ```

mod auth;
mod billing;
mod database;
mod error;
mod payment;
mod server;

pub use auth::AuthConfig;
pub use billing::BillingConfig;
pub use database::DatabaseConfig;
pub use error::{ConfigError, ValidationError};
pub use payment::PaymentConfig;
pub use server::{Environment, LogFormat, ServerConfig};

use serde::Deserialize;

/// Root application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Bind address, environment, log filter
    #[serde(default)]
    pub server: ServerConfig,

    /// PostgreSQL ledger and catalog
    pub database: DatabaseConfig,

    /// Stripe Checkout and webhook verification
    pub payment: PaymentConfig,

    /// Customer bearer tokens
    pub auth: AuthConfig,

    /// Draft expiry, reminder window and job cadence
    #[serde(default)]
    pub billing: BillingConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// A `.env` file is read first if present.
    ///
    /// - `SUBSCRIPTION_BILLING__SERVER__PORT=8080` -> `server.port = 8080`
    /// - `SUBSCRIPTION_BILLING__BILLING__DRAFT_TTL_MINUTES=60` -> `billing.draft_ttl_minutes = 60`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or a value
    /// cannot be parsed.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .prefix("SUBSCRIPTION_BILLING")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Validate every section. Stops at the first invalid value.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.server.validate()?;
        self.database.validate()?;
        self.payment.validate()?;
        self.auth.validate(&self.server.environment)?;
        self.billing.validate()?;
        Ok(())
    }

    pub fn is_production(&self) -> bool {
        self.server.is_production()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::Mutex;

    // env vars are process-global
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    const VARS: &[&str] = &[
        "SUBSCRIPTION_BILLING__DATABASE__URL",
        "SUBSCRIPTION_BILLING__PAYMENT__STRIPE_API_KEY",
        "SUBSCRIPTION_BILLING__PAYMENT__STRIPE_WEBHOOK_SECRET",
        "SUBSCRIPTION_BILLING__AUTH__JWT_SECRET",
        "SUBSCRIPTION_BILLING__SERVER__PORT",
        "SUBSCRIPTION_BILLING__SERVER__ENVIRONMENT",
        "SUBSCRIPTION_BILLING__BILLING__DRAFT_TTL_MINUTES",
    ];

    fn set_minimal_env() {
        env::set_var(
            "SUBSCRIPTION_BILLING__DATABASE__URL",
            "postgresql://test@localhost/billing",
        );
        env::set_var("SUBSCRIPTION_BILLING__PAYMENT__STRIPE_API_KEY", "sk_test_xxx");
        env::set_var(
            "SUBSCRIPTION_BILLING__PAYMENT__STRIPE_WEBHOOK_SECRET",
            "whsec_xxx",
        );
        env::set_var("SUBSCRIPTION_BILLING__AUTH__JWT_SECRET", "local-dev-secret");
    }

    fn clear_env() {
        for var in VARS {
            env::remove_var(var);
        }
    }

    fn load_with(extra: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        set_minimal_env();
        for (key, value) in extra {
            env::set_var(key, value);
        }
        let result = AppConfig::load();
        clear_env();
        result
    }

    #[test]
    fn loads_minimal_environment() {
        let _guard = ENV_MUTEX.lock().unwrap();
        let config = load_with(&[]).unwrap();

        assert_eq!(config.database.url, "postgresql://test@localhost/billing");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.environment, Environment::Development);
        assert_eq!(config.billing.draft_ttl_minutes, 120);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn billing_values_can_be_overridden() {
        let _guard = ENV_MUTEX.lock().unwrap();
        let config = load_with(&[("SUBSCRIPTION_BILLING__BILLING__DRAFT_TTL_MINUTES", "30")])
            .unwrap();

        assert_eq!(config.billing.draft_ttl_minutes, 30);
        assert_eq!(config.billing.reminder_window_days, 7);
    }

    #[test]
    fn production_requires_a_long_jwt_secret() {
        let _guard = ENV_MUTEX.lock().unwrap();
        let config = load_with(&[("SUBSCRIPTION_BILLING__SERVER__ENVIRONMENT", "production")])
            .unwrap();

        assert!(config.is_production());
        assert_eq!(
            config.validate(),
            Err(ValidationError::JwtSecretTooShort(32))
        );
    }

    #[test]
    fn missing_database_section_fails_to_load() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_minimal_env();
        env::remove_var("SUBSCRIPTION_BILLING__DATABASE__URL");
        let result = AppConfig::load();
        clear_env();

        assert!(result.is_err());
    }

    #[test]
    fn custom_port_is_parsed() {
        let _guard = ENV_MUTEX.lock().unwrap();
        let config = load_with(&[("SUBSCRIPTION_BILLING__SERVER__PORT", "3000")]).unwrap();
        assert_eq!(config.server.port, 3000);
    }
}
