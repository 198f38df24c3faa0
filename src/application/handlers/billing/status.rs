//! SubscriptionStatusEvaluator - "Is this user subscribed to product P".
//!
//! An open manual access window answers without contacting the provider.
//! Otherwise the customer's subscriptions are fetched and the most recent
//! one in a relevant state decides. The cached variant stores positive
//! answers only, so a new purchase is seen on the very next check.

use std::sync::Arc;

use crate::config::BillingSettings;
use crate::domain::billing::{BillingError, LocalUser, SubscriptionStatus};
use crate::domain::foundation::Timestamp;
use crate::ports::{CacheStore, PaymentsClient};

use super::capabilities::Listable;
use super::gateway::provider_failure;
use super::resource_types::{SubscriptionQuery, Subscriptions};

const CACHED_TRUE: &str = "true";

/// Cache key for one user and product.
pub fn subscription_cache_key(user: &LocalUser, product_id: &str) -> String {
    format!("is_subscribed_{}_{}", user.id, product_id)
}

#[derive(Clone)]
pub struct SubscriptionStatusEvaluator {
    subscriptions: Subscriptions,
    cache: Option<Arc<dyn CacheStore>>,
    settings: Arc<BillingSettings>,
}

impl SubscriptionStatusEvaluator {
    pub fn new(payments: Arc<dyn PaymentsClient>, settings: Arc<BillingSettings>) -> Self {
        Self {
            subscriptions: Subscriptions::new(payments),
            cache: None,
            settings,
        }
    }

    pub fn with_cache(mut self, cache: Arc<dyn CacheStore>) -> Self {
        self.cache = Some(cache);
        self
    }

    fn product_or_default<'a>(&'a self, product_id: Option<&'a str>) -> &'a str {
        product_id.unwrap_or(&self.settings.default_subscription_product_id)
    }

    /// Status of `user` for `product_id`, or the default product.
    pub async fn evaluate(
        &self,
        user: &LocalUser,
        product_id: Option<&str>,
    ) -> Result<SubscriptionStatus, BillingError> {
        let product_id = self.product_or_default(product_id);

        if let Some(status) = SubscriptionStatus::for_manual_access(
            user,
            &Timestamp::now(),
            product_id,
            self.settings.free_access_price_id.clone(),
        ) {
            tracing::debug!(user_id = %user.id, product_id, "Manual access window is open");
            return Ok(status);
        }

        let Some(customer) = user.customer_ref.as_ref() else {
            return Ok(SubscriptionStatus::not_subscribed(product_id));
        };

        let query = SubscriptionQuery::default();
        match self.subscriptions.list(customer, &query).await {
            Ok(subscriptions) => Ok(SubscriptionStatus::from_subscriptions(
                &subscriptions,
                product_id,
            )),
            Err(e) if e.is_resource_missing() => {
                tracing::warn!(
                    user_id = %user.id,
                    customer_id = %customer,
                    "Remote customer missing, treating as not subscribed"
                );
                Ok(SubscriptionStatus::not_subscribed(product_id))
            }
            Err(e) => Err(provider_failure(e)),
        }
    }

    pub async fn is_subscribed(
        &self,
        user: &LocalUser,
        product_id: Option<&str>,
    ) -> Result<bool, BillingError> {
        Ok(self.evaluate(user, product_id).await?.subscribed)
    }

    /// Like `is_subscribed`, reading and filling the cache when one is set.
    pub async fn is_subscribed_with_cache(
        &self,
        user: &LocalUser,
        product_id: Option<&str>,
    ) -> Result<bool, BillingError> {
        let Some(cache) = self.cache.as_ref() else {
            return self.is_subscribed(user, product_id).await;
        };
        let product_id = self.product_or_default(product_id);
        let key = subscription_cache_key(user, product_id);

        match cache.get(&key).await {
            Ok(Some(value)) if value == CACHED_TRUE => return Ok(true),
            Ok(_) => {}
            Err(e) => tracing::warn!(key = %key, error = %e, "Subscription cache read failed"),
        }

        let subscribed = self.is_subscribed(user, Some(product_id)).await?;
        if subscribed {
            if let Err(e) = cache
                .set(&key, CACHED_TRUE, self.settings.subscription_cache_ttl())
                .await
            {
                tracing::warn!(key = %key, error = %e, "Subscription cache write failed");
            }
        }
        Ok(subscribed)
    }
}
