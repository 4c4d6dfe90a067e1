//! Startup configuration failures

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    /// Missing variable or a value of the wrong type
    #[error("could not read configuration: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("configuration rejected: {0}")]
    ValidationFailed(#[from] ValidationError),
}

/// A value that parsed but cannot be used.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{0} is not set")]
    MissingRequired(&'static str),

    #[error("cannot bind to {0}")]
    InvalidBindAddress(String),

    #[error("port must be non-zero")]
    InvalidPort,

    #[error("request timeout must be between 1 and 300 seconds")]
    InvalidTimeout,

    #[error("database url must use the postgres:// or postgresql:// scheme")]
    InvalidDatabaseUrl,

    #[error("database.min_connections is larger than database.max_connections")]
    InvalidPoolSize,

    #[error("database.max_connections is above 100")]
    PoolSizeTooLarge,

    #[error("Stripe API key must start with sk_")]
    InvalidStripeKey,

    #[error("Stripe webhook secret must start with whsec_")]
    InvalidStripeWebhookSecret,

    #[error("{0} must be an http(s) URL")]
    InvalidUrl(&'static str),

    #[error("auth.jwt_secret must be at least {0} bytes in production")]
    JwtSecretTooShort(usize),

    #[error("{0} must be greater than zero")]
    MustBePositive(&'static str),

    /// Checkout sessions can only expire between 30 minutes and 24 hours out
    #[error("billing.draft_ttl_minutes must be between 30 and 1440")]
    InvalidDraftTtl,
}
