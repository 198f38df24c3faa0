//! Catalog - Prices and products, with the default-product restriction.
//!
//! When `allow_default_product_only` is set, any request naming another
//! product or price is refused and unnamed requests are scoped to the
//! default product.

use futures::future::try_join_all;
use std::sync::Arc;

use crate::config::BillingSettings;
use crate::domain::billing::{
    BillingError, LocalUser, Price, Product, ResourceKind, Subscription, SubscriptionInfo,
};
use crate::ports::{PaymentsClient, PriceFilter, ProductFilter};

use super::gateway::{lookup_error, provider_failure};
use super::resource_types::{SubscriptionQuery, Subscriptions};
use super::ResourceGateway;

/// A price with the caller's subscription state for it.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceEntry {
    pub price: Price,
    pub subscription_info: SubscriptionInfo,
}

/// A product with its prices and the caller's subscription state for it.
#[derive(Debug, Clone, PartialEq)]
pub struct ProductEntry {
    pub product: Product,
    pub prices: Vec<PriceEntry>,
    pub subscription_info: SubscriptionInfo,
}

#[derive(Clone)]
pub struct Catalog {
    payments: Arc<dyn PaymentsClient>,
    gateway: ResourceGateway,
    settings: Arc<BillingSettings>,
}

impl Catalog {
    pub fn new(
        payments: Arc<dyn PaymentsClient>,
        gateway: ResourceGateway,
        settings: Arc<BillingSettings>,
    ) -> Self {
        Self {
            payments,
            gateway,
            settings,
        }
    }

    fn deny_product(product_id: &str) -> BillingError {
        BillingError::permission_denied(format!("Cannot access product {}", product_id))
    }

    /// Product to browse under the restriction policy.
    fn scoped_product(&self, product: Option<&str>) -> Result<Option<String>, BillingError> {
        if !self.settings.allow_default_product_only {
            return Ok(product.map(str::to_string));
        }
        match product {
            Some(id) if !self.settings.product_allowed(id) => Err(Self::deny_product(id)),
            _ => Ok(Some(self.settings.default_subscription_product_id.clone())),
        }
    }

    /// Subscriptions used to annotate catalog entries; empty for anonymous
    /// or customer-less callers.
    async fn caller_subscriptions(
        &self,
        user: Option<&LocalUser>,
    ) -> Result<Vec<Subscription>, BillingError> {
        match user {
            Some(user) => {
                self.gateway
                    .list_owned(
                        &Subscriptions::new(self.payments.clone()),
                        user,
                        &SubscriptionQuery::default(),
                    )
                    .await
            }
            None => Ok(Vec::new()),
        }
    }

    fn annotate(price: Price, subscriptions: &[Subscription]) -> PriceEntry {
        let subscription_info = SubscriptionInfo::for_price(subscriptions, &price.id);
        PriceEntry {
            price,
            subscription_info,
        }
    }

    async fn fetch_prices(
        &self,
        product: Option<String>,
        currency: Option<String>,
    ) -> Result<Vec<Price>, BillingError> {
        let filter = PriceFilter {
            product,
            currency,
            ..Default::default()
        };
        let prices = self
            .payments
            .list_prices(&filter)
            .await
            .map_err(provider_failure)?;
        Ok(prices
            .into_iter()
            .filter(|p| p.active && p.is_recurring())
            .collect())
    }

    /// Active recurring prices, optionally for one product and currency.
    pub async fn get_prices(
        &self,
        user: Option<&LocalUser>,
        product: Option<&str>,
        currency: Option<&str>,
    ) -> Result<Vec<PriceEntry>, BillingError> {
        let currency = currency.map(validate_currency).transpose()?;
        let product = self.scoped_product(product)?;

        let prices = self.fetch_prices(product, currency).await?;
        let subscriptions = self.caller_subscriptions(user).await?;
        Ok(prices
            .into_iter()
            .map(|price| Self::annotate(price, &subscriptions))
            .collect())
    }

    /// Active products with their prices. An empty `ids` means all.
    pub async fn get_products(
        &self,
        user: Option<&LocalUser>,
        ids: &[String],
    ) -> Result<Vec<ProductEntry>, BillingError> {
        let ids = if self.settings.allow_default_product_only {
            if let Some(denied) = ids.iter().find(|id| !self.settings.product_allowed(id)) {
                return Err(Self::deny_product(denied));
            }
            vec![self.settings.default_subscription_product_id.clone()]
        } else {
            ids.to_vec()
        };

        let products = self
            .payments
            .list_products(&ProductFilter {
                ids,
                ..Default::default()
            })
            .await
            .map_err(provider_failure)?;
        let subscriptions = self.caller_subscriptions(user).await?;

        let prices = try_join_all(
            products
                .iter()
                .map(|p| self.fetch_prices(Some(p.id.clone()), None)),
        )
        .await?;

        Ok(products
            .into_iter()
            .zip(prices)
            .map(|(product, prices)| self.product_entry(product, prices, &subscriptions))
            .collect())
    }

    fn product_entry(
        &self,
        product: Product,
        prices: Vec<Price>,
        subscriptions: &[Subscription],
    ) -> ProductEntry {
        let subscription_info = SubscriptionInfo::for_product(subscriptions, &product.id);
        ProductEntry {
            prices: prices
                .into_iter()
                .map(|price| Self::annotate(price, subscriptions))
                .collect(),
            product,
            subscription_info,
        }
    }

    pub async fn retrieve_product(
        &self,
        user: Option<&LocalUser>,
        id: &str,
    ) -> Result<ProductEntry, BillingError> {
        if !self.settings.product_allowed(id) {
            return Err(Self::deny_product(id));
        }

        let product = self
            .payments
            .retrieve_product(id)
            .await
            .map_err(|e| lookup_error(ResourceKind::Product, id, e))?;
        let prices = self.fetch_prices(Some(product.id.clone()), None).await?;
        let subscriptions = self.caller_subscriptions(user).await?;
        Ok(self.product_entry(product, prices, &subscriptions))
    }

    pub async fn retrieve_price(
        &self,
        user: Option<&LocalUser>,
        id: &str,
    ) -> Result<PriceEntry, BillingError> {
        let price = self.allowed_price(id).await?;
        let subscriptions = self.caller_subscriptions(user).await?;
        Ok(Self::annotate(price, &subscriptions))
    }

    /// Retrieves a price the caller may buy. Unknown ids are `NotFound`.
    pub async fn allowed_price(&self, id: &str) -> Result<Price, BillingError> {
        let price = self
            .payments
            .retrieve_price(id)
            .await
            .map_err(|e| lookup_error(ResourceKind::Price, id, e))?;
        if !self.settings.product_allowed(&price.product) {
            return Err(BillingError::permission_denied(format!(
                "Cannot access price {}",
                id
            )));
        }
        Ok(price)
    }
}

/// Currency codes are exactly three letters; the provider wants lowercase.
fn validate_currency(currency: &str) -> Result<String, BillingError> {
    if currency.chars().count() != 3 {
        return Err(BillingError::validation(
            "currency",
            "Ensure this field has exactly 3 characters.",
        ));
    }
    Ok(currency.to_lowercase())
}
