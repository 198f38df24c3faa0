//! SubscriptionsHandler - Subscribe, change plan or payment method, cancel.

use std::sync::Arc;

use crate::domain::billing::{BillingError, LocalUser, Subscription};
use crate::ports::{PaymentsClient, SubscriptionUpdate};

use super::resource_types::{NewSubscription, SubscriptionQuery, Subscriptions};
use super::{Catalog, ResourceGateway};

const DEFAULT_PM_REQUIRED: &str =
    "The default_payment_method field must be set if set_as_default_payment_method is True.";

/// Request to start a subscription.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubscribeRequest {
    pub price_id: String,
    pub default_payment_method: Option<String>,
    /// Also make `default_payment_method` the customer's invoice default.
    pub set_as_default_payment_method: bool,
}

fn require_default_payment_method(
    set_as_default: bool,
    default_payment_method: Option<&str>,
) -> Result<Option<String>, BillingError> {
    match (set_as_default, default_payment_method) {
        (false, _) => Ok(None),
        (true, Some(pm)) if !pm.is_empty() => Ok(Some(pm.to_string())),
        (true, _) => Err(BillingError::validation(
            "default_payment_method",
            DEFAULT_PM_REQUIRED,
        )),
    }
}

#[derive(Clone)]
pub struct SubscriptionsHandler {
    gateway: ResourceGateway,
    catalog: Catalog,
    subscriptions: Subscriptions,
}

impl SubscriptionsHandler {
    pub fn new(payments: Arc<dyn PaymentsClient>, gateway: ResourceGateway, catalog: Catalog) -> Self {
        Self {
            gateway,
            catalog,
            subscriptions: Subscriptions::new(payments),
        }
    }

    pub async fn list(
        &self,
        user: &LocalUser,
        query: &SubscriptionQuery,
    ) -> Result<Vec<Subscription>, BillingError> {
        self.gateway.list_owned(&self.subscriptions, user, query).await
    }

    pub async fn retrieve(&self, user: &LocalUser, id: &str) -> Result<Subscription, BillingError> {
        self.gateway.retrieve_owned(&self.subscriptions, user, id).await
    }

    /// Creates a subscription, creating the remote customer first if needed.
    ///
    /// Setting the default payment method is a second remote write. If it
    /// fails the subscription stays in place and the error is returned.
    pub async fn create(
        &self,
        user: &LocalUser,
        request: &SubscribeRequest,
    ) -> Result<(LocalUser, Subscription), BillingError> {
        let set_default = require_default_payment_method(
            request.set_as_default_payment_method,
            request.default_payment_method.as_deref(),
        )?;
        let price = self.catalog.allowed_price(&request.price_id).await?;

        let params = NewSubscription {
            price_id: price.id,
            default_payment_method: request.default_payment_method.clone(),
        };
        let (user, subscription) = self
            .gateway
            .create_for(&self.subscriptions, user, &params)
            .await?;

        if set_default.is_some() {
            self.set_default_from(&user, &subscription).await?;
        }
        Ok((user, subscription))
    }

    /// Applies `changes` to a subscription the caller owns.
    pub async fn modify(
        &self,
        user: &LocalUser,
        id: &str,
        changes: &SubscriptionUpdate,
        set_as_default_payment_method: bool,
    ) -> Result<Subscription, BillingError> {
        require_default_payment_method(
            set_as_default_payment_method,
            changes.default_payment_method.as_deref(),
        )?;
        if let Some(price_id) = &changes.price_id {
            self.catalog.allowed_price(price_id).await?;
        }

        let subscription = self
            .gateway
            .modify_owned(&self.subscriptions, user, id, changes)
            .await?;

        if set_as_default_payment_method {
            self.set_default_from(user, &subscription).await?;
        }
        Ok(subscription)
    }

    /// Cancels a subscription the caller owns, effective immediately.
    pub async fn cancel(&self, user: &LocalUser, id: &str) -> Result<Subscription, BillingError> {
        self.gateway.delete_owned(&self.subscriptions, user, id).await
    }

    async fn set_default_from(
        &self,
        user: &LocalUser,
        subscription: &Subscription,
    ) -> Result<(), BillingError> {
        let Some(pm) = subscription.default_payment_method.as_deref() else {
            tracing::warn!(subscription_id = %subscription.id, "Subscription has no default payment method to promote");
            return Ok(());
        };
        if let Err(e) = self
            .gateway
            .customers()
            .set_default_payment_method(user, pm)
            .await
        {
            tracing::error!(
                user_id = %user.id,
                subscription_id = %subscription.id,
                payment_method = %pm,
                error = %e,
                "Subscription saved but setting the default payment method failed"
            );
            return Err(e);
        }
        Ok(())
    }
}
