//! Billing behaviour settings
//!
//! Resolved once at startup into an immutable struct. Required values are
//! checked by [`BillingSettings::validate`] so a misconfigured deployment
//! fails at boot instead of on the first checkout.

use serde::{Deserialize, Deserializer};
use std::time::Duration;

use super::error::ValidationError;

/// Environment variable consulted when `public_key` is not configured.
pub const PUBLIC_KEY_ENV_FALLBACK: &str = "STRIPE_PUBLIC_KEY";

/// Named billing settings with their defaults.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BillingSettings {
    /// Redirect after a completed checkout (required)
    pub checkout_success_url: String,

    /// Redirect after an abandoned checkout (required)
    pub checkout_cancel_url: String,

    /// Payment method types offered and listed
    #[serde(deserialize_with = "comma_list")]
    pub payment_method_types: Vec<String>,

    /// Push local email/name changes to the remote customer
    pub keep_customer_details_updated: bool,

    /// Publishable key handed to browser clients
    pub public_key: Option<String>,

    /// Where the billing portal sends the user back to
    pub billing_portal_return_url: Option<String>,

    /// Price id reported for manually granted access
    pub free_access_price_id: Option<String>,

    /// Product checked when no product is named (required)
    pub default_subscription_product_id: String,

    /// Restrict catalog browsing to the default product
    pub allow_default_product_only: bool,

    /// Cache namespace for subscription checks
    pub subscription_cache_name: String,

    /// TTL for positive subscription checks
    pub subscription_check_cache_timeout_secs: u64,
}

impl BillingSettings {
    pub fn subscription_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.subscription_check_cache_timeout_secs)
    }

    /// Fill `public_key` from the process environment when unset.
    pub fn with_public_key_fallback(mut self) -> Self {
        if self.public_key.is_none() {
            self.public_key = std::env::var(PUBLIC_KEY_ENV_FALLBACK).ok();
        }
        self
    }

    /// Whether `product_id` is browsable under the restriction policy.
    pub fn product_allowed(&self, product_id: &str) -> bool {
        !self.allow_default_product_only || product_id == self.default_subscription_product_id
    }

    /// Validate billing settings
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.checkout_success_url.is_empty() {
            return Err(ValidationError::MissingRequired(
                "BILLING_GATE__BILLING__CHECKOUT_SUCCESS_URL",
            ));
        }
        if !is_http_url(&self.checkout_success_url) {
            return Err(ValidationError::InvalidUrl("BILLING_GATE__BILLING__CHECKOUT_SUCCESS_URL"));
        }
        if self.checkout_cancel_url.is_empty() {
            return Err(ValidationError::MissingRequired(
                "BILLING_GATE__BILLING__CHECKOUT_CANCEL_URL",
            ));
        }
        if !is_http_url(&self.checkout_cancel_url) {
            return Err(ValidationError::InvalidUrl("BILLING_GATE__BILLING__CHECKOUT_CANCEL_URL"));
        }
        if let Some(url) = &self.billing_portal_return_url {
            if !is_http_url(url) {
                return Err(ValidationError::InvalidUrl(
                    "BILLING_GATE__BILLING__BILLING_PORTAL_RETURN_URL",
                ));
            }
        }
        if self.default_subscription_product_id.is_empty() {
            return Err(ValidationError::MissingRequired(
                "BILLING_GATE__BILLING__DEFAULT_SUBSCRIPTION_PRODUCT_ID",
            ));
        }
        if self.payment_method_types.is_empty() {
            return Err(ValidationError::NoPaymentMethodTypes);
        }
        if let Some(key) = &self.public_key {
            if !key.starts_with("pk_") {
                return Err(ValidationError::InvalidStripePublicKey);
            }
        }
        if self.subscription_check_cache_timeout_secs == 0 {
            return Err(ValidationError::InvalidCacheTimeout);
        }
        Ok(())
    }
}

impl Default for BillingSettings {
    fn default() -> Self {
        Self {
            checkout_success_url: String::new(),
            checkout_cancel_url: String::new(),
            payment_method_types: vec!["card".to_string()],
            keep_customer_details_updated: true,
            public_key: None,
            billing_portal_return_url: None,
            free_access_price_id: None,
            default_subscription_product_id: String::new(),
            allow_default_product_only: false,
            subscription_cache_name: "default".to_string(),
            subscription_check_cache_timeout_secs: 300,
        }
    }
}

fn is_http_url(value: &str) -> bool {
    value.starts_with("https://") || value.starts_with("http://")
}

/// Accepts either a sequence or a comma-separated string (the env form).
fn comma_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        One(String),
        Many(Vec<String>),
    }

    let items = match Raw::deserialize(deserializer)? {
        Raw::One(s) => s.split(',').map(|t| t.trim().to_string()).collect(),
        Raw::Many(v) => v.into_iter().map(|t| t.trim().to_string()).collect::<Vec<_>>(),
    };
    Ok(items.into_iter().filter(|t| !t.is_empty()).collect())
}

#[cfg(test)]
pub(crate) fn test_settings() -> BillingSettings {
    BillingSettings {
        checkout_success_url: "http://localhost/success".to_string(),
        checkout_cancel_url: "http://localhost/cancel".to_string(),
        default_subscription_product_id: "prod_default".to_string(),
        billing_portal_return_url: Some("http://localhost/account".to_string()),
        free_access_price_id: Some("price_free".to_string()),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let settings = BillingSettings::default();
        assert_eq!(settings.payment_method_types, vec!["card"]);
        assert!(settings.keep_customer_details_updated);
        assert!(!settings.allow_default_product_only);
        assert_eq!(settings.subscription_cache_name, "default");
        assert_eq!(settings.subscription_cache_ttl(), Duration::from_secs(300));
    }

    #[test]
    fn required_values_fail_fast() {
        assert_eq!(
            BillingSettings::default().validate(),
            Err(ValidationError::MissingRequired("BILLING_GATE__BILLING__CHECKOUT_SUCCESS_URL"))
        );

        let settings = BillingSettings {
            default_subscription_product_id: String::new(),
            ..test_settings()
        };
        assert_eq!(
            settings.validate(),
            Err(ValidationError::MissingRequired(
                "BILLING_GATE__BILLING__DEFAULT_SUBSCRIPTION_PRODUCT_ID"
            ))
        );
    }

    #[test]
    fn test_settings_are_valid() {
        assert!(test_settings().validate().is_ok());
    }

    #[test]
    fn rejects_secret_key_as_public_key() {
        let settings = BillingSettings {
            public_key: Some("sk_test_oops".to_string()),
            ..test_settings()
        };
        assert_eq!(settings.validate(), Err(ValidationError::InvalidStripePublicKey));
    }

    #[test]
    fn payment_method_types_accept_comma_string() {
        let json = r#"{"payment_method_types": "card, sepa_debit,"}"#;
        let settings: BillingSettings = serde_json::from_str(json).unwrap();
        assert_eq!(settings.payment_method_types, vec!["card", "sepa_debit"]);
    }

    #[test]
    fn payment_method_types_accept_list() {
        let json = r#"{"payment_method_types": ["card", "us_bank_account"]}"#;
        let settings: BillingSettings = serde_json::from_str(json).unwrap();
        assert_eq!(settings.payment_method_types, vec!["card", "us_bank_account"]);
    }

    #[test]
    fn restriction_policy_only_admits_default_product() {
        let open = test_settings();
        assert!(open.product_allowed("prod_other"));

        let restricted = BillingSettings {
            allow_default_product_only: true,
            ..test_settings()
        };
        assert!(restricted.product_allowed("prod_default"));
        assert!(!restricted.product_allowed("prod_other"));
    }
}
