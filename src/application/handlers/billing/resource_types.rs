//! Customer-scoped resource types, composed over the payments client.

use async_trait::async_trait;
use std::sync::Arc;

use crate::domain::billing::{BillingEventPayload, Invoice, PaymentMethod, SetupIntent, Subscription};
use crate::domain::foundation::CustomerRef;
use crate::ports::{
    CreateSetupIntentParams, CreateSubscriptionParams, InvoiceFilter, PaymentMethodUpdate,
    PaymentsClient, ProviderError, SubscriptionFilter, SubscriptionUpdate,
};

use super::capabilities::{
    Creatable, Deletable, Listable, Modifiable, RemoteResource, Retrievable,
};

// ════════════════════════════════════════════════════════════════════════════════
// Payment methods
// ════════════════════════════════════════════════════════════════════════════════

/// Payment methods attached to a customer. Delete means detach.
#[derive(Clone)]
pub struct PaymentMethods {
    client: Arc<dyn PaymentsClient>,
}

impl PaymentMethods {
    pub fn new(client: Arc<dyn PaymentsClient>) -> Self {
        Self { client }
    }
}

impl RemoteResource for PaymentMethods {
    type Item = PaymentMethod;
}

#[async_trait]
impl Listable for PaymentMethods {
    /// Payment method type, e.g. `card`.
    type Query = String;

    async fn list(
        &self,
        customer: &CustomerRef,
        method_type: &String,
    ) -> Result<Vec<PaymentMethod>, ProviderError> {
        self.client.list_payment_methods(customer, method_type).await
    }
}

#[async_trait]
impl Retrievable for PaymentMethods {
    async fn retrieve(&self, id: &str) -> Result<PaymentMethod, ProviderError> {
        self.client.retrieve_payment_method(id).await
    }
}

#[async_trait]
impl Modifiable for PaymentMethods {
    type Changes = PaymentMethodUpdate;

    async fn modify(
        &self,
        current: &PaymentMethod,
        changes: &PaymentMethodUpdate,
    ) -> Result<PaymentMethod, ProviderError> {
        self.client.modify_payment_method(&current.id, changes).await
    }

    fn modified_event(item: &PaymentMethod) -> BillingEventPayload {
        BillingEventPayload::PaymentMethodModified {
            payment_method: item.clone(),
        }
    }
}

#[async_trait]
impl Deletable for PaymentMethods {
    async fn delete(&self, id: &str) -> Result<PaymentMethod, ProviderError> {
        self.client.detach_payment_method(id).await
    }

    fn deleted_event(item: &PaymentMethod) -> BillingEventPayload {
        BillingEventPayload::PaymentMethodDetached {
            payment_methods: vec![item.clone()],
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Subscriptions
// ════════════════════════════════════════════════════════════════════════════════

/// Filters for listing a customer's subscriptions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubscriptionQuery {
    pub price: Option<String>,
    pub status: Option<String>,
}

/// Parameters for a new subscription; the customer is injected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSubscription {
    pub price_id: String,
    pub default_payment_method: Option<String>,
}

/// Subscriptions of a customer. Delete cancels immediately.
#[derive(Clone)]
pub struct Subscriptions {
    client: Arc<dyn PaymentsClient>,
}

impl Subscriptions {
    pub fn new(client: Arc<dyn PaymentsClient>) -> Self {
        Self { client }
    }
}

impl RemoteResource for Subscriptions {
    type Item = Subscription;
}

#[async_trait]
impl Listable for Subscriptions {
    type Query = SubscriptionQuery;

    async fn list(
        &self,
        customer: &CustomerRef,
        query: &SubscriptionQuery,
    ) -> Result<Vec<Subscription>, ProviderError> {
        let filter = SubscriptionFilter {
            price: query.price.clone(),
            status: query.status.clone(),
            ..SubscriptionFilter::for_customer(customer.clone())
        };
        self.client.list_subscriptions(&filter).await
    }
}

#[async_trait]
impl Retrievable for Subscriptions {
    async fn retrieve(&self, id: &str) -> Result<Subscription, ProviderError> {
        self.client.retrieve_subscription(id).await
    }
}

#[async_trait]
impl Creatable for Subscriptions {
    type Params = NewSubscription;

    async fn create(
        &self,
        customer: &CustomerRef,
        params: &NewSubscription,
    ) -> Result<Subscription, ProviderError> {
        let params = CreateSubscriptionParams {
            customer: customer.clone(),
            price_id: params.price_id.clone(),
            default_payment_method: params.default_payment_method.clone(),
            metadata: Default::default(),
        };
        self.client.create_subscription(&params).await
    }

    fn created_event(item: &Subscription) -> BillingEventPayload {
        BillingEventPayload::SubscriptionCreated {
            subscription: item.clone(),
        }
    }
}

#[async_trait]
impl Modifiable for Subscriptions {
    type Changes = SubscriptionUpdate;

    /// A price change replaces the current first item rather than adding
    /// a second one.
    async fn modify(
        &self,
        current: &Subscription,
        changes: &SubscriptionUpdate,
    ) -> Result<Subscription, ProviderError> {
        let mut changes = changes.clone();
        if changes.price_id.is_some() && changes.item_id.is_none() {
            changes.item_id = current.items.data.first().map(|item| item.id.clone());
        }
        self.client.modify_subscription(&current.id, &changes).await
    }

    fn modified_event(item: &Subscription) -> BillingEventPayload {
        BillingEventPayload::SubscriptionModified {
            subscription: item.clone(),
        }
    }
}

#[async_trait]
impl Deletable for Subscriptions {
    async fn delete(&self, id: &str) -> Result<Subscription, ProviderError> {
        self.client.cancel_subscription(id).await
    }

    fn deleted_event(item: &Subscription) -> BillingEventPayload {
        BillingEventPayload::SubscriptionCancelled {
            subscription: item.clone(),
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Invoices
// ════════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvoiceQuery {
    pub subscription: Option<String>,
    pub status: Option<String>,
}

/// Invoices of a customer. Read only.
#[derive(Clone)]
pub struct Invoices {
    client: Arc<dyn PaymentsClient>,
}

impl Invoices {
    pub fn new(client: Arc<dyn PaymentsClient>) -> Self {
        Self { client }
    }
}

impl RemoteResource for Invoices {
    type Item = Invoice;
}

#[async_trait]
impl Listable for Invoices {
    type Query = InvoiceQuery;

    async fn list(
        &self,
        customer: &CustomerRef,
        query: &InvoiceQuery,
    ) -> Result<Vec<Invoice>, ProviderError> {
        let filter = InvoiceFilter {
            subscription: query.subscription.clone(),
            status: query.status.clone(),
            ..InvoiceFilter::for_customer(customer.clone())
        };
        self.client.list_invoices(&filter).await
    }
}

#[async_trait]
impl Retrievable for Invoices {
    async fn retrieve(&self, id: &str) -> Result<Invoice, ProviderError> {
        self.client.retrieve_invoice(id).await
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Setup intents
// ════════════════════════════════════════════════════════════════════════════════

/// Setup intents for saving a payment method off-session.
#[derive(Clone)]
pub struct SetupIntents {
    client: Arc<dyn PaymentsClient>,
}

impl SetupIntents {
    pub fn new(client: Arc<dyn PaymentsClient>) -> Self {
        Self { client }
    }
}

impl RemoteResource for SetupIntents {
    type Item = SetupIntent;
}

#[async_trait]
impl Retrievable for SetupIntents {
    async fn retrieve(&self, id: &str) -> Result<SetupIntent, ProviderError> {
        self.client.retrieve_setup_intent(id).await
    }
}

#[async_trait]
impl Creatable for SetupIntents {
    /// Payment method types the intent accepts.
    type Params = Vec<String>;

    async fn create(
        &self,
        customer: &CustomerRef,
        payment_method_types: &Vec<String>,
    ) -> Result<SetupIntent, ProviderError> {
        let params =
            CreateSetupIntentParams::off_session(customer.clone(), payment_method_types.clone());
        self.client.create_setup_intent(&params).await
    }

    fn created_event(item: &SetupIntent) -> BillingEventPayload {
        BillingEventPayload::SetupIntentCreated {
            setup_intent: item.clone(),
        }
    }
}
