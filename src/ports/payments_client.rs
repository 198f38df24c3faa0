//! PaymentsClient port - Interface to the remote payments provider.
//!
//! Resource-oriented CRUD and list calls for the objects billing touches.
//! Adapters own transport, authentication and timeouts; nothing here
//! retries.
//!
//! Parameter structs render themselves as Stripe form fields via
//! `to_form()`, using bracketed keys for nested values
//! (`items[0][price]`, `metadata[user_id]`).

use async_trait::async_trait;
use std::collections::BTreeMap;
use thiserror::Error;

use crate::domain::billing::{
    BillingError, BillingPortalSession, CheckoutSession, Customer, Invoice, PaymentMethod, Price,
    Product, ProviderErrorKind, SetupIntent, Subscription,
};
use crate::domain::foundation::CustomerRef;

/// Form fields sent to the provider.
pub type FormParams = Vec<(String, String)>;

/// Error reported by a payments client.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ProviderError {
    pub kind: ProviderErrorKind,
    /// Provider message, possibly prefixed with `Request req_...: `.
    pub message: String,
    pub request_id: Option<String>,
    pub http_status: Option<u16>,
}

impl ProviderError {
    pub fn new(kind: ProviderErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            request_id: None,
            http_status: None,
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::Network, message)
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::Decode, message)
    }

    pub fn resource_missing(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::ResourceMissing, message)
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.http_status = Some(status);
        self
    }

    pub fn is_resource_missing(&self) -> bool {
        self.kind == ProviderErrorKind::ResourceMissing
    }
}

impl From<ProviderError> for BillingError {
    fn from(err: ProviderError) -> Self {
        BillingError::provider(err.kind, &err.message, err.request_id)
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Parameters
// ════════════════════════════════════════════════════════════════════════════════

fn push_metadata(form: &mut FormParams, metadata: &BTreeMap<String, String>) {
    for (key, value) in metadata {
        form.push((format!("metadata[{}]", key), value.clone()));
    }
}

fn push_list(form: &mut FormParams, key: &str, values: &[String]) {
    for (i, value) in values.iter().enumerate() {
        form.push((format!("{}[{}]", key, i), value.clone()));
    }
}

/// Fields for a new remote customer.
///
/// `merge` lets later sources override earlier ones field by field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreateCustomerParams {
    pub email: Option<String>,
    pub description: Option<String>,
    pub name: Option<String>,
    pub metadata: BTreeMap<String, String>,
}

impl CreateCustomerParams {
    /// Overlays `other` on top of `self`.
    pub fn merge(mut self, other: CreateCustomerParams) -> Self {
        if other.email.is_some() {
            self.email = other.email;
        }
        if other.description.is_some() {
            self.description = other.description;
        }
        if other.name.is_some() {
            self.name = other.name;
        }
        self.metadata.extend(other.metadata);
        self
    }

    pub fn to_form(&self) -> FormParams {
        let mut form = Vec::new();
        if let Some(email) = &self.email {
            form.push(("email".to_string(), email.clone()));
        }
        if let Some(description) = &self.description {
            form.push(("description".to_string(), description.clone()));
        }
        if let Some(name) = &self.name {
            form.push(("name".to_string(), name.clone()));
        }
        push_metadata(&mut form, &self.metadata);
        form
    }
}

/// Changes to an existing customer. Unset fields are left alone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CustomerUpdate {
    pub email: Option<String>,
    pub description: Option<String>,
    pub name: Option<String>,
    /// Sets `invoice_settings[default_payment_method]`.
    pub default_payment_method: Option<String>,
    pub metadata: BTreeMap<String, String>,
}

impl CustomerUpdate {
    pub fn default_payment_method(payment_method_id: impl Into<String>) -> Self {
        Self {
            default_payment_method: Some(payment_method_id.into()),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.email.is_none()
            && self.description.is_none()
            && self.name.is_none()
            && self.default_payment_method.is_none()
            && self.metadata.is_empty()
    }

    pub fn to_form(&self) -> FormParams {
        let mut form = Vec::new();
        if let Some(email) = &self.email {
            form.push(("email".to_string(), email.clone()));
        }
        if let Some(description) = &self.description {
            form.push(("description".to_string(), description.clone()));
        }
        if let Some(name) = &self.name {
            form.push(("name".to_string(), name.clone()));
        }
        if let Some(pm) = &self.default_payment_method {
            form.push((
                "invoice_settings[default_payment_method]".to_string(),
                pm.clone(),
            ));
        }
        push_metadata(&mut form, &self.metadata);
        form
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BillingDetailsUpdate {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

/// Changes to a payment method.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PaymentMethodUpdate {
    pub billing_details: Option<BillingDetailsUpdate>,
    pub card_exp_month: Option<u32>,
    pub card_exp_year: Option<u32>,
    pub metadata: BTreeMap<String, String>,
}

impl PaymentMethodUpdate {
    pub fn is_empty(&self) -> bool {
        self.billing_details.is_none()
            && self.card_exp_month.is_none()
            && self.card_exp_year.is_none()
            && self.metadata.is_empty()
    }

    pub fn to_form(&self) -> FormParams {
        let mut form = Vec::new();
        if let Some(details) = &self.billing_details {
            if let Some(name) = &details.name {
                form.push(("billing_details[name]".to_string(), name.clone()));
            }
            if let Some(email) = &details.email {
                form.push(("billing_details[email]".to_string(), email.clone()));
            }
            if let Some(phone) = &details.phone {
                form.push(("billing_details[phone]".to_string(), phone.clone()));
            }
        }
        if let Some(month) = self.card_exp_month {
            form.push(("card[exp_month]".to_string(), month.to_string()));
        }
        if let Some(year) = self.card_exp_year {
            form.push(("card[exp_year]".to_string(), year.to_string()));
        }
        push_metadata(&mut form, &self.metadata);
        form
    }
}

/// Filter for customer subscriptions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionFilter {
    pub customer: CustomerRef,
    pub price: Option<String>,
    /// Provider status filter; the provider omits canceled ones when unset.
    pub status: Option<String>,
}

impl SubscriptionFilter {
    pub fn for_customer(customer: CustomerRef) -> Self {
        Self {
            customer,
            price: None,
            status: None,
        }
    }

    pub fn to_form(&self) -> FormParams {
        let mut form = vec![("customer".to_string(), self.customer.to_string())];
        if let Some(price) = &self.price {
            form.push(("price".to_string(), price.clone()));
        }
        if let Some(status) = &self.status {
            form.push(("status".to_string(), status.clone()));
        }
        form
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateSubscriptionParams {
    pub customer: CustomerRef,
    pub price_id: String,
    pub default_payment_method: Option<String>,
    pub metadata: BTreeMap<String, String>,
}

impl CreateSubscriptionParams {
    pub fn to_form(&self) -> FormParams {
        let mut form = vec![
            ("customer".to_string(), self.customer.to_string()),
            ("items[0][price]".to_string(), self.price_id.clone()),
        ];
        if let Some(pm) = &self.default_payment_method {
            form.push(("default_payment_method".to_string(), pm.clone()));
        }
        push_metadata(&mut form, &self.metadata);
        form
    }
}

/// Changes to a subscription.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubscriptionUpdate {
    /// Switch the existing item to this price.
    pub price_id: Option<String>,
    /// Item the new price replaces; filled in from the current subscription.
    pub item_id: Option<String>,
    pub default_payment_method: Option<String>,
    pub cancel_at_period_end: Option<bool>,
    pub metadata: BTreeMap<String, String>,
}

impl SubscriptionUpdate {
    pub fn is_empty(&self) -> bool {
        self.price_id.is_none()
            && self.default_payment_method.is_none()
            && self.cancel_at_period_end.is_none()
            && self.metadata.is_empty()
    }

    pub fn to_form(&self) -> FormParams {
        let mut form = Vec::new();
        if let Some(price) = &self.price_id {
            if let Some(item) = &self.item_id {
                form.push(("items[0][id]".to_string(), item.clone()));
            }
            form.push(("items[0][price]".to_string(), price.clone()));
        }
        if let Some(pm) = &self.default_payment_method {
            form.push(("default_payment_method".to_string(), pm.clone()));
        }
        if let Some(cancel) = self.cancel_at_period_end {
            form.push(("cancel_at_period_end".to_string(), cancel.to_string()));
        }
        push_metadata(&mut form, &self.metadata);
        form
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvoiceFilter {
    pub customer: CustomerRef,
    pub subscription: Option<String>,
    pub status: Option<String>,
}

impl InvoiceFilter {
    pub fn for_customer(customer: CustomerRef) -> Self {
        Self {
            customer,
            subscription: None,
            status: None,
        }
    }

    pub fn to_form(&self) -> FormParams {
        let mut form = vec![("customer".to_string(), self.customer.to_string())];
        if let Some(subscription) = &self.subscription {
            form.push(("subscription".to_string(), subscription.clone()));
        }
        if let Some(status) = &self.status {
            form.push(("status".to_string(), status.clone()));
        }
        form
    }
}

/// Catalog price filter. Catalog browsing only ever wants active
/// recurring prices, so those are the defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceFilter {
    pub product: Option<String>,
    pub currency: Option<String>,
    pub active: bool,
    pub recurring_only: bool,
}

impl Default for PriceFilter {
    fn default() -> Self {
        Self {
            product: None,
            currency: None,
            active: true,
            recurring_only: true,
        }
    }
}

impl PriceFilter {
    pub fn to_form(&self) -> FormParams {
        let mut form = vec![("active".to_string(), self.active.to_string())];
        if self.recurring_only {
            form.push(("type".to_string(), "recurring".to_string()));
        }
        if let Some(product) = &self.product {
            form.push(("product".to_string(), product.clone()));
        }
        if let Some(currency) = &self.currency {
            form.push(("currency".to_string(), currency.clone()));
        }
        form
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductFilter {
    /// Restrict to these ids; empty means all.
    pub ids: Vec<String>,
    pub active: bool,
}

impl Default for ProductFilter {
    fn default() -> Self {
        Self {
            ids: Vec::new(),
            active: true,
        }
    }
}

impl ProductFilter {
    pub fn to_form(&self) -> FormParams {
        let mut form = vec![("active".to_string(), self.active.to_string())];
        push_list(&mut form, "ids", &self.ids);
        form
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateSetupIntentParams {
    pub customer: CustomerRef,
    pub payment_method_types: Vec<String>,
    pub confirm: bool,
    pub usage: String,
    pub metadata: BTreeMap<String, String>,
}

impl CreateSetupIntentParams {
    /// Off-session, unconfirmed intent for saving a method.
    pub fn off_session(customer: CustomerRef, payment_method_types: Vec<String>) -> Self {
        Self {
            customer,
            payment_method_types,
            confirm: false,
            usage: "off_session".to_string(),
            metadata: BTreeMap::new(),
        }
    }

    pub fn to_form(&self) -> FormParams {
        let mut form = vec![
            ("customer".to_string(), self.customer.to_string()),
            ("confirm".to_string(), self.confirm.to_string()),
            ("usage".to_string(), self.usage.clone()),
        ];
        push_list(&mut form, "payment_method_types", &self.payment_method_types);
        push_metadata(&mut form, &self.metadata);
        form
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckoutMode {
    Subscription,
    Setup,
}

impl CheckoutMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckoutMode::Subscription => "subscription",
            CheckoutMode::Setup => "setup",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateCheckoutParams {
    pub customer: CustomerRef,
    pub mode: CheckoutMode,
    pub client_reference_id: String,
    pub success_url: String,
    pub cancel_url: String,
    pub payment_method_types: Vec<String>,
    /// Line item price for subscription mode.
    pub price_id: Option<String>,
    /// Subscription whose payment method a setup session replaces.
    pub setup_subscription_id: Option<String>,
}

impl CreateCheckoutParams {
    pub fn to_form(&self) -> FormParams {
        let mut form = vec![
            ("customer".to_string(), self.customer.to_string()),
            ("mode".to_string(), self.mode.as_str().to_string()),
            (
                "client_reference_id".to_string(),
                self.client_reference_id.clone(),
            ),
            ("success_url".to_string(), self.success_url.clone()),
            ("cancel_url".to_string(), self.cancel_url.clone()),
        ];
        push_list(&mut form, "payment_method_types", &self.payment_method_types);
        if let Some(price) = &self.price_id {
            form.push(("line_items[0][price]".to_string(), price.clone()));
            form.push(("line_items[0][quantity]".to_string(), "1".to_string()));
        }
        if let Some(sub) = &self.setup_subscription_id {
            form.push((
                "setup_intent_data[metadata][subscription_id]".to_string(),
                sub.clone(),
            ));
        }
        form
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateBillingPortalParams {
    pub customer: CustomerRef,
    pub return_url: Option<String>,
}

impl CreateBillingPortalParams {
    pub fn to_form(&self) -> FormParams {
        let mut form = vec![("customer".to_string(), self.customer.to_string())];
        if let Some(url) = &self.return_url {
            form.push(("return_url".to_string(), url.clone()));
        }
        form
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Port
// ════════════════════════════════════════════════════════════════════════════════

/// Port for the remote payments provider.
///
/// Implementations must return `ProviderErrorKind::ResourceMissing` for
/// unknown ids so callers can tell "absent" from "broken".
#[async_trait]
pub trait PaymentsClient: Send + Sync {
    // Customers
    async fn create_customer(&self, params: &CreateCustomerParams)
        -> Result<Customer, ProviderError>;

    async fn retrieve_customer(&self, customer: &CustomerRef) -> Result<Customer, ProviderError>;

    async fn modify_customer(
        &self,
        customer: &CustomerRef,
        update: &CustomerUpdate,
    ) -> Result<Customer, ProviderError>;

    // Payment methods (the provider lists one type per call)
    async fn list_payment_methods(
        &self,
        customer: &CustomerRef,
        method_type: &str,
    ) -> Result<Vec<PaymentMethod>, ProviderError>;

    async fn retrieve_payment_method(&self, id: &str) -> Result<PaymentMethod, ProviderError>;

    async fn modify_payment_method(
        &self,
        id: &str,
        update: &PaymentMethodUpdate,
    ) -> Result<PaymentMethod, ProviderError>;

    async fn detach_payment_method(&self, id: &str) -> Result<PaymentMethod, ProviderError>;

    // Subscriptions
    async fn list_subscriptions(
        &self,
        filter: &SubscriptionFilter,
    ) -> Result<Vec<Subscription>, ProviderError>;

    async fn retrieve_subscription(&self, id: &str) -> Result<Subscription, ProviderError>;

    async fn create_subscription(
        &self,
        params: &CreateSubscriptionParams,
    ) -> Result<Subscription, ProviderError>;

    async fn modify_subscription(
        &self,
        id: &str,
        update: &SubscriptionUpdate,
    ) -> Result<Subscription, ProviderError>;

    /// Cancels immediately.
    async fn cancel_subscription(&self, id: &str) -> Result<Subscription, ProviderError>;

    // Invoices
    async fn list_invoices(&self, filter: &InvoiceFilter) -> Result<Vec<Invoice>, ProviderError>;

    async fn retrieve_invoice(&self, id: &str) -> Result<Invoice, ProviderError>;

    // Catalog
    async fn list_prices(&self, filter: &PriceFilter) -> Result<Vec<Price>, ProviderError>;

    async fn retrieve_price(&self, id: &str) -> Result<Price, ProviderError>;

    async fn list_products(&self, filter: &ProductFilter) -> Result<Vec<Product>, ProviderError>;

    async fn retrieve_product(&self, id: &str) -> Result<Product, ProviderError>;

    // Sessions and intents
    async fn create_setup_intent(
        &self,
        params: &CreateSetupIntentParams,
    ) -> Result<SetupIntent, ProviderError>;

    async fn retrieve_setup_intent(&self, id: &str) -> Result<SetupIntent, ProviderError>;

    async fn create_checkout_session(
        &self,
        params: &CreateCheckoutParams,
    ) -> Result<CheckoutSession, ProviderError>;

    async fn create_billing_portal_session(
        &self,
        params: &CreateBillingPortalParams,
    ) -> Result<BillingPortalSession, ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    // Compile-time check that trait is object-safe
    #[allow(dead_code)]
    fn assert_object_safe(_: &dyn PaymentsClient) {}

    fn customer() -> CustomerRef {
        CustomerRef::new("cus_1").unwrap()
    }

    fn has(form: &FormParams, key: &str, value: &str) -> bool {
        form.iter().any(|(k, v)| k == key && v == value)
    }

    #[test]
    fn later_customer_params_win() {
        let base = CreateCustomerParams {
            email: Some("a@x.com".into()),
            description: Some("Ada Lovelace".into()),
            metadata: [("user_id".to_string(), "u1".to_string())].into(),
            ..Default::default()
        };
        let hook = CreateCustomerParams {
            description: Some("VIP".into()),
            metadata: [("plan".to_string(), "gold".to_string())].into(),
            ..Default::default()
        };
        let merged = base.merge(hook);
        assert_eq!(merged.email.as_deref(), Some("a@x.com"));
        assert_eq!(merged.description.as_deref(), Some("VIP"));
        assert_eq!(merged.metadata.len(), 2);

        let form = merged.to_form();
        assert!(has(&form, "metadata[user_id]", "u1"));
        assert!(has(&form, "metadata[plan]", "gold"));
    }

    #[test]
    fn default_payment_method_goes_under_invoice_settings() {
        let form = CustomerUpdate::default_payment_method("pm_1").to_form();
        assert_eq!(
            form,
            vec![(
                "invoice_settings[default_payment_method]".to_string(),
                "pm_1".to_string()
            )]
        );
        assert!(CustomerUpdate::default().is_empty());
    }

    #[test]
    fn subscription_form_uses_item_keys() {
        let params = CreateSubscriptionParams {
            customer: customer(),
            price_id: "price_abc".into(),
            default_payment_method: Some("pm_123".into()),
            metadata: BTreeMap::new(),
        };
        let form = params.to_form();
        assert!(has(&form, "customer", "cus_1"));
        assert!(has(&form, "items[0][price]", "price_abc"));
        assert!(has(&form, "default_payment_method", "pm_123"));
    }

    #[test]
    fn setup_intent_is_off_session_and_unconfirmed() {
        let params =
            CreateSetupIntentParams::off_session(customer(), vec!["card".into(), "sepa_debit".into()]);
        let form = params.to_form();
        assert!(has(&form, "confirm", "false"));
        assert!(has(&form, "usage", "off_session"));
        assert!(has(&form, "payment_method_types[0]", "card"));
        assert!(has(&form, "payment_method_types[1]", "sepa_debit"));
    }

    #[test]
    fn setup_checkout_carries_subscription_metadata() {
        let params = CreateCheckoutParams {
            customer: customer(),
            mode: CheckoutMode::Setup,
            client_reference_id: "u1".into(),
            success_url: "http://localhost/ok".into(),
            cancel_url: "http://localhost/cancel".into(),
            payment_method_types: vec!["card".into()],
            price_id: None,
            setup_subscription_id: Some("sub_1".into()),
        };
        let form = params.to_form();
        assert!(has(&form, "mode", "setup"));
        assert!(has(&form, "setup_intent_data[metadata][subscription_id]", "sub_1"));
        assert!(!form.iter().any(|(k, _)| k.starts_with("line_items")));
    }

    #[test]
    fn price_filter_defaults_to_active_recurring() {
        let form = PriceFilter::default().to_form();
        assert!(has(&form, "active", "true"));
        assert!(has(&form, "type", "recurring"));
    }

    #[test]
    fn provider_error_converts_without_request_prefix() {
        let err = ProviderError::new(
            ProviderErrorKind::InvalidRequest,
            "Request req_9: No such price: 'price_x'",
        );
        let billing: BillingError = err.into();
        assert_eq!(billing.to_string(), "No such price: 'price_x'");
    }
}
