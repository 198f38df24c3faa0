//! Authentication configuration (HS256 bearer tokens)

use serde::Deserialize;

use super::error::ValidationError;
use super::server::Environment;

/// Bearer token validation settings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthConfig {
    /// Shared HMAC secret used to sign access tokens
    pub jwt_secret: String,

    /// Expected `iss` claim, if any
    pub issuer: Option<String>,

    /// Expected `aud` claim, if any
    pub audience: Option<String>,
}

impl AuthConfig {
    /// Validate authentication configuration
    ///
    /// Production requires a secret of at least 32 bytes.
    pub fn validate(&self, environment: &Environment) -> Result<(), ValidationError> {
        if self.jwt_secret.is_empty() {
            return Err(ValidationError::MissingRequired("BILLING_GATE__AUTH__JWT_SECRET"));
        }
        if *environment == Environment::Production && self.jwt_secret.len() < 32 {
            return Err(ValidationError::WeakJwtSecret);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_missing_secret() {
        let config = AuthConfig::default();
        assert_eq!(
            config.validate(&Environment::Development),
            Err(ValidationError::MissingRequired("BILLING_GATE__AUTH__JWT_SECRET"))
        );
    }

    #[test]
    fn test_short_secret_only_allowed_outside_production() {
        let config = AuthConfig {
            jwt_secret: "dev-secret".to_string(),
            ..Default::default()
        };
        assert!(config.validate(&Environment::Development).is_ok());
        assert_eq!(
            config.validate(&Environment::Production),
            Err(ValidationError::WeakJwtSecret)
        );
    }

    #[test]
    fn test_long_secret_valid_in_production() {
        let config = AuthConfig {
            jwt_secret: "a".repeat(48),
            issuer: Some("https://auth.example.com".to_string()),
            audience: Some("billing-gate".to_string()),
        };
        assert!(config.validate(&Environment::Production).is_ok());
    }
}
