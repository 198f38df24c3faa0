//! PaymentMethodsHandler - List, inspect, modify and detach saved methods.

use futures::future::join_all;
use futures::{StreamExt, TryStreamExt};
use std::sync::Arc;

use crate::config::BillingSettings;
use crate::domain::billing::{BillingError, BillingEventPayload, LocalUser, PaymentMethod};
use crate::ports::{PaymentMethodUpdate, PaymentsClient};

use super::capabilities::Deletable;
use super::gateway::provider_failure;
use super::resource_types::PaymentMethods;
use super::ResourceGateway;

/// Sentinel id meaning every method of the configured types.
pub const DETACH_ALL: &str = "*";

/// Per-type list calls allowed in flight at once.
const LIST_CONCURRENCY: usize = 4;

/// A saved method and whether it is the customer's invoice default.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentMethodEntry {
    pub payment_method: PaymentMethod,
    pub is_default: bool,
}

#[derive(Clone)]
pub struct PaymentMethodsHandler {
    gateway: ResourceGateway,
    methods: PaymentMethods,
    settings: Arc<BillingSettings>,
}

impl PaymentMethodsHandler {
    pub fn new(
        payments: Arc<dyn PaymentsClient>,
        gateway: ResourceGateway,
        settings: Arc<BillingSettings>,
    ) -> Self {
        Self {
            gateway,
            methods: PaymentMethods::new(payments),
            settings,
        }
    }

    fn types_or_default<'a>(&'a self, types: Option<&'a [String]>) -> &'a [String] {
        match types {
            Some(types) if !types.is_empty() => types,
            _ => &self.settings.payment_method_types,
        }
    }

    async fn list_methods(
        &self,
        user: &LocalUser,
        types: &[String],
    ) -> Result<Vec<PaymentMethod>, BillingError> {
        // The provider lists one type per call
        let lists: Vec<Vec<PaymentMethod>> = futures::stream::iter(
            types
                .iter()
                .map(|t| self.gateway.list_owned(&self.methods, user, t))
                .collect::<Vec<_>>(),
        )
        .buffered(LIST_CONCURRENCY)
        .try_collect()
        .await?;
        Ok(lists.into_iter().flatten().collect())
    }

    /// Methods of `types` (the configured types by default), flagged with
    /// the customer's default.
    pub async fn list(
        &self,
        user: &LocalUser,
        types: Option<&[String]>,
    ) -> Result<Vec<PaymentMethodEntry>, BillingError> {
        if user.customer_ref.is_none() {
            return Ok(Vec::new());
        }
        let types = self.types_or_default(types);

        let (customer, methods) = futures::try_join!(
            self.gateway.customers().retrieve_customer(user),
            self.list_methods(user, types),
        )?;
        let default = customer.as_ref().and_then(|c| c.default_payment_method());

        Ok(methods
            .into_iter()
            .map(|pm| PaymentMethodEntry {
                is_default: default == Some(pm.id.as_str()),
                payment_method: pm,
            })
            .collect())
    }

    pub async fn retrieve(&self, user: &LocalUser, id: &str) -> Result<PaymentMethod, BillingError> {
        self.gateway.retrieve_owned(&self.methods, user, id).await
    }

    /// Applies `changes` and optionally makes the method the default.
    ///
    /// Setting the default modifies the customer. With no other changes
    /// the method itself is re-fetched and returned unchanged.
    pub async fn modify(
        &self,
        user: &LocalUser,
        id: &str,
        set_as_default: bool,
        changes: &PaymentMethodUpdate,
    ) -> Result<PaymentMethod, BillingError> {
        if set_as_default {
            self.gateway.retrieve_owned(&self.methods, user, id).await?;
            tracing::debug!(user_id = %user.id, payment_method = %id, "Setting default payment method");
            self.gateway
                .customers()
                .set_default_payment_method(user, id)
                .await?;
            if changes.is_empty() {
                return self.gateway.retrieve_owned(&self.methods, user, id).await;
            }
        }
        self.gateway
            .modify_owned(&self.methods, user, id, changes)
            .await
    }

    /// Detaches one method, or all of them for `DETACH_ALL`.
    pub async fn detach(
        &self,
        user: &LocalUser,
        id: &str,
    ) -> Result<Vec<PaymentMethod>, BillingError> {
        if id == DETACH_ALL {
            return self.detach_all(user, None).await;
        }
        let detached = self.gateway.delete_owned(&self.methods, user, id).await?;
        Ok(vec![detached])
    }

    /// Detaches every method of `types`. One event covers the whole batch,
    /// and none is sent when nothing was detached.
    ///
    /// Every detach is attempted. When some fail, the event still covers
    /// the ones that succeeded and the first failure is returned.
    pub async fn detach_all(
        &self,
        user: &LocalUser,
        types: Option<&[String]>,
    ) -> Result<Vec<PaymentMethod>, BillingError> {
        let types = self.types_or_default(types);
        let owned = self.list_methods(user, types).await?;

        let mut detached = Vec::with_capacity(owned.len());
        let mut first_error = None;
        for (pm, result) in owned
            .iter()
            .zip(join_all(owned.iter().map(|pm| self.methods.delete(&pm.id))).await)
        {
            match result {
                Ok(method) => detached.push(method),
                Err(e) => {
                    tracing::warn!(
                        user_id = %user.id,
                        payment_method = %pm.id,
                        error = %e,
                        "Failed to detach payment method"
                    );
                    first_error.get_or_insert(e);
                }
            }
        }

        if owned.is_empty() {
            tracing::info!(user_id = %user.id, types = ?types, "No payment methods to detach");
        } else if !detached.is_empty() {
            tracing::debug!(user_id = %user.id, count = detached.len(), "Detached payment methods");
            self.gateway
                .events()
                .emit(
                    user,
                    BillingEventPayload::PaymentMethodDetached {
                        payment_methods: detached.clone(),
                    },
                )
                .await;
        }
        match first_error {
            Some(e) => Err(provider_failure(e)),
            None => Ok(detached),
        }
    }
}
