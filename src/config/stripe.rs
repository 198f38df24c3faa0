//! Stripe API configuration

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;

/// Stripe API access settings.
#[derive(Debug, Clone, Deserialize)]
pub struct StripeSettings {
    /// Stripe secret API key
    pub api_key: String,

    /// Base URL for the Stripe API
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl StripeSettings {
    /// Check if using Stripe test mode
    pub fn is_test_mode(&self) -> bool {
        self.api_key.starts_with("sk_test_") || self.api_key.starts_with("rk_test_")
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Validate Stripe configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.api_key.is_empty() {
            return Err(ValidationError::MissingRequired("BILLING_GATE__STRIPE__API_KEY"));
        }
        // Secret or restricted keys only; a publishable key here is a deployment mistake
        if !self.api_key.starts_with("sk_") && !self.api_key.starts_with("rk_") {
            return Err(ValidationError::InvalidStripeKey);
        }
        if !self.api_base_url.starts_with("https://") && !self.api_base_url.starts_with("http://") {
            return Err(ValidationError::InvalidUrl("BILLING_GATE__STRIPE__API_BASE_URL"));
        }
        if self.timeout_secs == 0 {
            return Err(ValidationError::InvalidTimeout);
        }
        Ok(())
    }
}

impl Default for StripeSettings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_base_url: default_api_base_url(),
            timeout_secs: default_timeout(),
        }
    }
}

fn default_api_base_url() -> String {
    "https://api.stripe.com".to_string()
}

fn default_timeout() -> u64 {
    30
}
