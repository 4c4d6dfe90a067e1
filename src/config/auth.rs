//! Authentication configuration (HS256 customer tokens)

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use super::error::ValidationError;
use super::server::Environment;

/// Minimum secret length accepted outside development.
pub const MIN_PRODUCTION_SECRET_BYTES: usize = 32;

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Shared secret used to verify bearer tokens
    pub jwt_secret: SecretString,
}

impl AuthConfig {
    pub fn validate(&self, environment: &Environment) -> Result<(), ValidationError> {
        let secret = self.jwt_secret.expose_secret();
        if secret.is_empty() {
            return Err(ValidationError::MissingRequired("AUTH__JWT_SECRET"));
        }
        if *environment == Environment::Production && secret.len() < MIN_PRODUCTION_SECRET_BYTES {
            return Err(ValidationError::JwtSecretTooShort(MIN_PRODUCTION_SECRET_BYTES));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(secret: &str) -> AuthConfig {
        AuthConfig {
            jwt_secret: SecretString::new(secret.to_string()),
        }
    }

    #[test]
    fn empty_secret_is_rejected() {
        assert!(config("").validate(&Environment::Development).is_err());
    }

    #[test]
    fn short_secret_only_allowed_outside_production() {
        let cfg = config("dev-secret");
        assert!(cfg.validate(&Environment::Development).is_ok());
        assert_eq!(
            cfg.validate(&Environment::Production),
            Err(ValidationError::JwtSecretTooShort(32))
        );
    }

    #[test]
    fn long_secret_passes_in_production() {
        let cfg = config(&"x".repeat(48));
        assert!(cfg.validate(&Environment::Production).is_ok());
    }
}
