//! CheckoutHandler - Hosted checkout and billing portal sessions.
//!
//! Sessions are created for the caller's customer, which is created on
//! first use. Each session yields one event.

use std::sync::Arc;

use crate::config::BillingSettings;
use crate::domain::billing::{
    BillingError, BillingEventPayload, BillingPortalSession, CheckoutSession, LocalUser,
};
use crate::domain::foundation::CustomerRef;
use crate::ports::{
    CheckoutMode, CreateBillingPortalParams, CreateCheckoutParams, CreateCustomerParams,
    PaymentsClient,
};

use super::gateway::provider_failure;
use super::resource_types::Subscriptions;
use super::{Catalog, ResourceGateway};

#[derive(Clone)]
pub struct CheckoutHandler {
    payments: Arc<dyn PaymentsClient>,
    gateway: ResourceGateway,
    catalog: Catalog,
    subscriptions: Subscriptions,
    settings: Arc<BillingSettings>,
}

impl CheckoutHandler {
    pub fn new(
        payments: Arc<dyn PaymentsClient>,
        gateway: ResourceGateway,
        catalog: Catalog,
        settings: Arc<BillingSettings>,
    ) -> Self {
        Self {
            subscriptions: Subscriptions::new(payments.clone()),
            payments,
            gateway,
            catalog,
            settings,
        }
    }

    async fn customer_for(&self, user: &LocalUser) -> Result<(LocalUser, CustomerRef), BillingError> {
        let user = self
            .gateway
            .customers()
            .ensure_customer(user, CreateCustomerParams::default())
            .await?;
        let customer = user
            .customer_ref
            .clone()
            .ok_or_else(|| BillingError::infrastructure("Customer reference missing after creation"))?;
        Ok((user, customer))
    }

    fn session_params(
        &self,
        user: &LocalUser,
        customer: CustomerRef,
        mode: CheckoutMode,
    ) -> CreateCheckoutParams {
        CreateCheckoutParams {
            customer,
            mode,
            client_reference_id: user.id.to_string(),
            success_url: self.settings.checkout_success_url.clone(),
            cancel_url: self.settings.checkout_cancel_url.clone(),
            payment_method_types: self.settings.payment_method_types.clone(),
            price_id: None,
            setup_subscription_id: None,
        }
    }

    async fn open_session(
        &self,
        user: &LocalUser,
        params: CreateCheckoutParams,
    ) -> Result<CheckoutSession, BillingError> {
        let session = self
            .payments
            .create_checkout_session(&params)
            .await
            .map_err(provider_failure)?;
        tracing::info!(
            user_id = %user.id,
            session_id = %session.id,
            mode = params.mode.as_str(),
            "Checkout session created"
        );
        self.gateway
            .events()
            .emit(
                user,
                BillingEventPayload::CheckoutCreated {
                    session: session.clone(),
                },
            )
            .await;
        Ok(session)
    }

    /// Checkout for a new subscription to `price_id`.
    pub async fn create_subscription_checkout(
        &self,
        user: &LocalUser,
        price_id: &str,
    ) -> Result<CheckoutSession, BillingError> {
        let price = self.catalog.allowed_price(price_id).await?;
        let (user, customer) = self.customer_for(user).await?;

        let params = CreateCheckoutParams {
            price_id: Some(price.id),
            ..self.session_params(&user, customer, CheckoutMode::Subscription)
        };
        self.open_session(&user, params).await
    }

    /// Checkout that collects a payment method, optionally for one of the
    /// caller's subscriptions.
    pub async fn create_setup_checkout(
        &self,
        user: &LocalUser,
        subscription_id: Option<&str>,
    ) -> Result<CheckoutSession, BillingError> {
        if let Some(id) = subscription_id {
            self.gateway
                .retrieve_owned(&self.subscriptions, user, id)
                .await?;
        }
        let (user, customer) = self.customer_for(user).await?;

        let params = CreateCheckoutParams {
            setup_subscription_id: subscription_id.map(str::to_string),
            ..self.session_params(&user, customer, CheckoutMode::Setup)
        };
        self.open_session(&user, params).await
    }

    /// Self-service billing portal session.
    pub async fn create_billing_portal(
        &self,
        user: &LocalUser,
    ) -> Result<BillingPortalSession, BillingError> {
        let (user, customer) = self.customer_for(user).await?;
        let params = CreateBillingPortalParams {
            customer,
            return_url: self.settings.billing_portal_return_url.clone(),
        };

        let session = self
            .payments
            .create_billing_portal_session(&params)
            .await
            .map_err(provider_failure)?;
        tracing::info!(user_id = %user.id, session_id = %session.id, "Billing portal session created");
        self.gateway
            .events()
            .emit(
                &user,
                BillingEventPayload::BillingPortalCreated {
                    session: session.clone(),
                },
            )
            .await;
        Ok(session)
    }
}
