//! Application configuration module
//!
//! Type-safe configuration loaded from environment variables with the
//! `config` and `dotenvy` crates. Variables use the `BILLING_GATE` prefix
//! and `__` separates nested values.
//!
//! # Example
//!
//! ```no_run
//! use billing_gate::config::AppConfig;
//!
//! let config = AppConfig::load().expect("Failed to load configuration");
//! config.validate().expect("Invalid configuration");
//! ```

mod auth;
mod billing;
mod database;
mod error;
mod redis;
mod server;
mod stripe;

pub use auth::AuthConfig;
pub use billing::{BillingSettings, PUBLIC_KEY_ENV_FALLBACK};
pub use database::DatabaseConfig;
pub use error::{ConfigError, ValidationError};
pub use redis::RedisConfig;
pub use server::{Environment, ServerConfig};
pub use stripe::StripeSettings;

#[cfg(test)]
pub(crate) use billing::test_settings;

use serde::Deserialize;

/// Root application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Server configuration (host, port, environment)
    #[serde(default)]
    pub server: ServerConfig,

    /// PostgreSQL user store; users stay in memory when absent
    pub database: Option<DatabaseConfig>,

    /// Redis subscription cache; in-process cache when absent
    pub redis: Option<RedisConfig>,

    /// Bearer token validation
    #[serde(default)]
    pub auth: AuthConfig,

    /// Stripe API access
    #[serde(default)]
    pub stripe: StripeSettings,

    /// Billing behaviour
    #[serde(default)]
    pub billing: BillingSettings,
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// 1. Loads `.env` if present (development)
    /// 2. Reads variables with the `BILLING_GATE` prefix
    /// 3. Uses `__` (double underscore) to separate nested values
    /// 4. Applies the `STRIPE_PUBLIC_KEY` fallback
    ///
    /// - `BILLING_GATE__SERVER__PORT=8080` -> `server.port = 8080`
    /// - `BILLING_GATE__BILLING__PAYMENT_METHOD_TYPES=card,sepa_debit`
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let mut config: AppConfig = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .prefix("BILLING_GATE")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        config.billing = config.billing.with_public_key_fallback();
        Ok(config)
    }

    /// Load and validate in one step; the binary refuses to start on error.
    pub fn load_validated() -> Result<Self, ConfigError> {
        let config = Self::load()?;
        config.validate()?;
        Ok(config)
    }

    /// Validate all configuration values
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.server.validate()?;
        if let Some(database) = &self.database {
            database.validate()?;
        }
        if let Some(redis) = &self.redis {
            redis.validate()?;
        }
        self.auth.validate(&self.server.environment)?;
        self.stripe.validate()?;
        self.billing.validate()?;
        Ok(())
    }

    /// Check if running in production environment
    pub fn is_production(&self) -> bool {
        self.server.is_production()
    }
}
