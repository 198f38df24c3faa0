//! Mock payments client for testing.
//!
//! An in-memory stand-in for Stripe that behaves like the real API for the
//! calls billing makes. Supports:
//! - Seeded objects (customers, payment methods, subscriptions, ...)
//! - Error injection per method
//! - Call tracking

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use serde_json::json;

use crate::domain::billing::{
    BillingPortalSession, CheckoutSession, Customer, InvoiceSettings, Invoice, List,
    PaymentMethod, Price, Product, ProviderErrorKind, ResourceKind, SetupIntent, Subscription,
    SubscriptionItem, SubscriptionState,
};
use crate::domain::foundation::CustomerRef;
use crate::ports::{
    CreateBillingPortalParams, CreateCheckoutParams, CreateCustomerParams,
    CreateSetupIntentParams, CreateSubscriptionParams, CustomerUpdate, InvoiceFilter,
    PaymentMethodUpdate, PaymentsClient, PriceFilter, ProductFilter, ProviderError,
    SubscriptionFilter, SubscriptionUpdate,
};

/// First `created` value handed out; increases by one per new object.
const EPOCH: i64 = 1_700_000_000;

/// Mock payments client for testing.
///
/// ```ignore
/// let mock = MockPaymentsClient::new();
/// mock.add_price(price("price_abc", "prod_1"));
/// mock.set_method_error("create_subscription", ProviderError::new(ProviderErrorKind::Card, "declined"));
///
/// // ... exercise code ...
/// assert_eq!(mock.call_count("create_customer"), 1);
/// ```
#[derive(Default, Clone)]
pub struct MockPaymentsClient {
    inner: Arc<Mutex<MockState>>,
}

#[derive(Default)]
struct MockState {
    customers: HashMap<String, Customer>,
    payment_methods: HashMap<String, PaymentMethod>,
    subscriptions: HashMap<String, Subscription>,
    invoices: HashMap<String, Invoice>,
    prices: HashMap<String, Price>,
    products: HashMap<String, Product>,
    setup_intents: HashMap<String, SetupIntent>,

    /// Counter for ids and `created` timestamps.
    sequence: i64,

    /// Specific errors by method name.
    method_errors: HashMap<String, ProviderError>,

    /// Errors for calls whose first argument is the given object id.
    id_errors: HashMap<String, ProviderError>,

    /// Track method calls for assertions.
    call_log: Vec<MethodCall>,
}

impl MockState {
    fn next(&mut self) -> i64 {
        self.sequence += 1;
        EPOCH + self.sequence
    }
}

/// Recorded method call for assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodCall {
    pub method: String,
    pub args: Vec<String>,
}

fn missing(kind: ResourceKind, id: &str) -> ProviderError {
    ProviderError::resource_missing(format!("Request req_mock: No such {}: '{}'", kind, id))
        .with_request_id("req_mock")
        .with_status(404)
}

impl MockPaymentsClient {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Seeding
    // ════════════════════════════════════════════════════════════════════════════

    pub fn add_customer(&self, customer: Customer) {
        self.state().customers.insert(customer.id.clone(), customer);
    }

    pub fn add_payment_method(&self, payment_method: PaymentMethod) {
        self.state()
            .payment_methods
            .insert(payment_method.id.clone(), payment_method);
    }

    pub fn add_subscription(&self, subscription: Subscription) {
        self.state()
            .subscriptions
            .insert(subscription.id.clone(), subscription);
    }

    pub fn add_invoice(&self, invoice: Invoice) {
        self.state().invoices.insert(invoice.id.clone(), invoice);
    }

    pub fn add_price(&self, price: Price) {
        self.state().prices.insert(price.id.clone(), price);
    }

    pub fn add_product(&self, product: Product) {
        self.state().products.insert(product.id.clone(), product);
    }

    /// Changes a stored subscription's state behind the caller's back.
    pub fn set_subscription_status(&self, id: &str, status: SubscriptionState) {
        if let Some(sub) = self.state().subscriptions.get_mut(id) {
            sub.status = status;
        }
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Inspection
    // ════════════════════════════════════════════════════════════════════════════

    pub fn customer(&self, id: &str) -> Option<Customer> {
        self.state().customers.get(id).cloned()
    }

    pub fn customer_count(&self) -> usize {
        self.state().customers.len()
    }

    pub fn payment_method(&self, id: &str) -> Option<PaymentMethod> {
        self.state().payment_methods.get(id).cloned()
    }

    pub fn subscription(&self, id: &str) -> Option<Subscription> {
        self.state().subscriptions.get(id).cloned()
    }

    pub fn subscriptions(&self) -> Vec<Subscription> {
        self.state().subscriptions.values().cloned().collect()
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Error Injection
    // ════════════════════════════════════════════════════════════════════════════

    /// Set an error for a specific method.
    pub fn set_method_error(&self, method: &str, error: ProviderError) {
        self.state().method_errors.insert(method.to_string(), error);
    }

    /// Set an error for any call that addresses object `id`.
    pub fn set_id_error(&self, id: &str, error: ProviderError) {
        self.state().id_errors.insert(id.to_string(), error);
    }

    /// Clear all configured errors.
    pub fn clear_errors(&self) {
        let mut state = self.state();
        state.method_errors.clear();
        state.id_errors.clear();
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Call Tracking
    // ════════════════════════════════════════════════════════════════════════════

    pub fn calls(&self) -> Vec<MethodCall> {
        self.state().call_log.clone()
    }

    pub fn was_called(&self, method: &str) -> bool {
        self.state().call_log.iter().any(|c| c.method == method)
    }

    pub fn call_count(&self, method: &str) -> usize {
        self.state()
            .call_log
            .iter()
            .filter(|c| c.method == method)
            .count()
    }

    pub fn total_calls(&self) -> usize {
        self.state().call_log.len()
    }

    pub fn clear_calls(&self) {
        self.state().call_log.clear();
    }

    /// Records the call and returns an injected error, if any.
    fn enter(&self, method: &str, args: Vec<String>) -> Result<MutexGuard<'_, MockState>, ProviderError> {
        let mut state = self.state();
        let id_error = args.first().and_then(|id| state.id_errors.get(id)).cloned();
        state.call_log.push(MethodCall {
            method: method.to_string(),
            args,
        });
        if let Some(error) = state.method_errors.get(method) {
            return Err(error.clone());
        }
        if let Some(error) = id_error {
            return Err(error);
        }
        Ok(state)
    }
}

#[async_trait]
impl PaymentsClient for MockPaymentsClient {
    async fn create_customer(
        &self,
        params: &CreateCustomerParams,
    ) -> Result<Customer, ProviderError> {
        let mut state = self.enter("create_customer", vec![params.email.clone().unwrap_or_default()])?;
        let created = state.next();
        let customer = Customer {
            id: format!("cus_mock_{}", state.sequence),
            email: params.email.clone(),
            description: params.description.clone(),
            invoice_settings: InvoiceSettings::default(),
            metadata: params.metadata.clone().into_iter().collect(),
            created,
        };
        state.customers.insert(customer.id.clone(), customer.clone());
        Ok(customer)
    }

    async fn retrieve_customer(&self, customer: &CustomerRef) -> Result<Customer, ProviderError> {
        let state = self.enter("retrieve_customer", vec![customer.to_string()])?;
        state
            .customers
            .get(customer.as_str())
            .cloned()
            .ok_or_else(|| missing(ResourceKind::Customer, customer.as_str()))
    }

    async fn modify_customer(
        &self,
        customer: &CustomerRef,
        update: &CustomerUpdate,
    ) -> Result<Customer, ProviderError> {
        let args: Vec<String> = update.to_form().into_iter().map(|(k, _)| k).collect();
        let mut state = self.enter("modify_customer", [vec![customer.to_string()], args].concat())?;
        let stored = state
            .customers
            .get_mut(customer.as_str())
            .ok_or_else(|| missing(ResourceKind::Customer, customer.as_str()))?;
        if let Some(email) = &update.email {
            stored.email = Some(email.clone());
        }
        if let Some(description) = &update.description {
            stored.description = Some(description.clone());
        }
        if let Some(pm) = &update.default_payment_method {
            stored.invoice_settings.default_payment_method = Some(pm.clone());
        }
        stored.metadata.extend(update.metadata.clone());
        Ok(stored.clone())
    }

    async fn list_payment_methods(
        &self,
        customer: &CustomerRef,
        method_type: &str,
    ) -> Result<Vec<PaymentMethod>, ProviderError> {
        let state = self.enter(
            "list_payment_methods",
            vec![customer.to_string(), method_type.to_string()],
        )?;
        Ok(state
            .payment_methods
            .values()
            .filter(|pm| pm.customer.as_deref() == Some(customer.as_str()))
            .filter(|pm| pm.method_type == method_type)
            .cloned()
            .collect())
    }

    async fn retrieve_payment_method(&self, id: &str) -> Result<PaymentMethod, ProviderError> {
        let state = self.enter("retrieve_payment_method", vec![id.to_string()])?;
        state
            .payment_methods
            .get(id)
            .cloned()
            .ok_or_else(|| missing(ResourceKind::PaymentMethod, id))
    }

    async fn modify_payment_method(
        &self,
        id: &str,
        update: &PaymentMethodUpdate,
    ) -> Result<PaymentMethod, ProviderError> {
        let mut state = self.enter("modify_payment_method", vec![id.to_string()])?;
        let stored = state
            .payment_methods
            .get_mut(id)
            .ok_or_else(|| missing(ResourceKind::PaymentMethod, id))?;
        if let Some(details) = &update.billing_details {
            if !stored.billing_details.is_object() {
                stored.billing_details = json!({});
            }
            for (key, value) in [
                ("name", &details.name),
                ("email", &details.email),
                ("phone", &details.phone),
            ] {
                if let Some(value) = value {
                    stored.billing_details[key] = json!(value);
                }
            }
        }
        if let Some(card) = stored.card.as_mut() {
            if let Some(month) = update.card_exp_month {
                card["exp_month"] = json!(month);
            }
            if let Some(year) = update.card_exp_year {
                card["exp_year"] = json!(year);
            }
        }
        Ok(stored.clone())
    }

    async fn detach_payment_method(&self, id: &str) -> Result<PaymentMethod, ProviderError> {
        let mut state = self.enter("detach_payment_method", vec![id.to_string()])?;
        let stored = state
            .payment_methods
            .get_mut(id)
            .ok_or_else(|| missing(ResourceKind::PaymentMethod, id))?;
        stored.customer = None;
        Ok(stored.clone())
    }

    async fn list_subscriptions(
        &self,
        filter: &SubscriptionFilter,
    ) -> Result<Vec<Subscription>, ProviderError> {
        let state = self.enter("list_subscriptions", vec![filter.customer.to_string()])?;
        Ok(state
            .subscriptions
            .values()
            .filter(|s| s.customer == filter.customer.as_str())
            .filter(|s| filter.price.as_deref().map_or(true, |p| s.covers_price(p)))
            .filter(|s| match filter.status.as_deref() {
                None => s.status != SubscriptionState::Canceled,
                Some("all") => true,
                Some(status) => serde_json::to_value(s.status)
                    .map(|v| v == status)
                    .unwrap_or(false),
            })
            .cloned()
            .collect())
    }

    async fn retrieve_subscription(&self, id: &str) -> Result<Subscription, ProviderError> {
        let state = self.enter("retrieve_subscription", vec![id.to_string()])?;
        state
            .subscriptions
            .get(id)
            .cloned()
            .ok_or_else(|| missing(ResourceKind::Subscription, id))
    }

    async fn create_subscription(
        &self,
        params: &CreateSubscriptionParams,
    ) -> Result<Subscription, ProviderError> {
        let mut state = self.enter(
            "create_subscription",
            vec![params.customer.to_string(), params.price_id.clone()],
        )?;
        if !state.customers.contains_key(params.customer.as_str()) {
            return Err(missing(ResourceKind::Customer, params.customer.as_str()));
        }
        let price = state
            .prices
            .get(&params.price_id)
            .cloned()
            .ok_or_else(|| missing(ResourceKind::Price, &params.price_id))?;
        let created = state.next();
        let n = state.sequence;
        let subscription = Subscription {
            id: format!("sub_mock_{}", n),
            customer: params.customer.to_string(),
            status: SubscriptionState::Active,
            cancel_at: None,
            current_period_end: Some(created + 30 * 24 * 60 * 60),
            current_period_start: Some(created),
            days_until_due: None,
            default_payment_method: params.default_payment_method.clone(),
            latest_invoice: Some(format!("in_mock_{}", n)),
            start_date: Some(created),
            trial_end: None,
            trial_start: None,
            items: List::new(vec![SubscriptionItem {
                id: format!("si_mock_{}", n),
                price,
            }]),
            created,
        };
        state
            .subscriptions
            .insert(subscription.id.clone(), subscription.clone());
        Ok(subscription)
    }

    async fn modify_subscription(
        &self,
        id: &str,
        update: &SubscriptionUpdate,
    ) -> Result<Subscription, ProviderError> {
        let form = update.to_form().into_iter().map(|(k, v)| format!("{}={}", k, v));
        let mut state = self.enter(
            "modify_subscription",
            std::iter::once(id.to_string()).chain(form).collect(),
        )?;
        let new_price = match &update.price_id {
            Some(price_id) => Some(
                state
                    .prices
                    .get(price_id)
                    .cloned()
                    .ok_or_else(|| missing(ResourceKind::Price, price_id))?,
            ),
            None => None,
        };
        let stored = state
            .subscriptions
            .get_mut(id)
            .ok_or_else(|| missing(ResourceKind::Subscription, id))?;
        if let Some(price) = new_price {
            let target = update
                .item_id
                .as_deref()
                .and_then(|item_id| stored.items.data.iter().position(|i| i.id == item_id));
            match target {
                Some(index) => stored.items.data[index].price = price,
                None => {
                    let n = stored.items.data.len();
                    stored.items.data.push(SubscriptionItem {
                        id: format!("si_{}_{}", id, n),
                        price,
                    });
                }
            }
        }
        if let Some(pm) = &update.default_payment_method {
            stored.default_payment_method = Some(pm.clone());
        }
        if let Some(cancel) = update.cancel_at_period_end {
            stored.cancel_at = if cancel { stored.current_period_end } else { None };
        }
        Ok(stored.clone())
    }

    async fn cancel_subscription(&self, id: &str) -> Result<Subscription, ProviderError> {
        let mut state = self.enter("cancel_subscription", vec![id.to_string()])?;
        let stored = state
            .subscriptions
            .get_mut(id)
            .ok_or_else(|| missing(ResourceKind::Subscription, id))?;
        stored.status = SubscriptionState::Canceled;
        Ok(stored.clone())
    }

    async fn list_invoices(&self, filter: &InvoiceFilter) -> Result<Vec<Invoice>, ProviderError> {
        let state = self.enter("list_invoices", vec![filter.customer.to_string()])?;
        Ok(state
            .invoices
            .values()
            .filter(|i| i.customer.as_deref() == Some(filter.customer.as_str()))
            .filter(|i| {
                filter
                    .subscription
                    .as_deref()
                    .map_or(true, |s| i.subscription.as_deref() == Some(s))
            })
            .filter(|i| {
                filter
                    .status
                    .as_deref()
                    .map_or(true, |s| i.status.as_deref() == Some(s))
            })
            .cloned()
            .collect())
    }

    async fn retrieve_invoice(&self, id: &str) -> Result<Invoice, ProviderError> {
        let state = self.enter("retrieve_invoice", vec![id.to_string()])?;
        state
            .invoices
            .get(id)
            .cloned()
            .ok_or_else(|| missing(ResourceKind::Invoice, id))
    }

    async fn list_prices(&self, filter: &PriceFilter) -> Result<Vec<Price>, ProviderError> {
        let state = self.enter(
            "list_prices",
            vec![filter.product.clone().unwrap_or_default()],
        )?;
        if let Some(currency) = &filter.currency {
            if !matches!(currency.to_lowercase().as_str(), "usd" | "eur" | "gbp" | "cad") {
                return Err(ProviderError::new(
                    ProviderErrorKind::InvalidRequest,
                    format!("Request req_mock: Invalid currency: {}", currency),
                )
                .with_request_id("req_mock")
                .with_status(400));
            }
        }
        Ok(state
            .prices
            .values()
            .filter(|p| p.active == filter.active)
            .filter(|p| !filter.recurring_only || p.is_recurring())
            .filter(|p| filter.product.as_deref().map_or(true, |id| p.product == id))
            .filter(|p| {
                filter
                    .currency
                    .as_deref()
                    .map_or(true, |c| p.currency.eq_ignore_ascii_case(c))
            })
            .cloned()
            .collect())
    }

    async fn retrieve_price(&self, id: &str) -> Result<Price, ProviderError> {
        let state = self.enter("retrieve_price", vec![id.to_string()])?;
        state
            .prices
            .get(id)
            .cloned()
            .ok_or_else(|| missing(ResourceKind::Price, id))
    }

    async fn list_products(&self, filter: &ProductFilter) -> Result<Vec<Product>, ProviderError> {
        let state = self.enter("list_products", filter.ids.clone())?;
        Ok(state
            .products
            .values()
            .filter(|p| p.active == filter.active)
            .filter(|p| filter.ids.is_empty() || filter.ids.contains(&p.id))
            .cloned()
            .collect())
    }

    async fn retrieve_product(&self, id: &str) -> Result<Product, ProviderError> {
        let state = self.enter("retrieve_product", vec![id.to_string()])?;
        state
            .products
            .get(id)
            .cloned()
            .ok_or_else(|| missing(ResourceKind::Product, id))
    }

    async fn create_setup_intent(
        &self,
        params: &CreateSetupIntentParams,
    ) -> Result<SetupIntent, ProviderError> {
        let mut state = self.enter("create_setup_intent", vec![params.customer.to_string()])?;
        let created = state.next();
        let n = state.sequence;
        let intent = SetupIntent {
            id: format!("seti_mock_{}", n),
            customer: Some(params.customer.to_string()),
            client_secret: Some(format!("seti_mock_{}_secret", n)),
            payment_method_types: params.payment_method_types.clone(),
            status: Some("requires_payment_method".to_string()),
            created,
        };
        state.setup_intents.insert(intent.id.clone(), intent.clone());
        Ok(intent)
    }

    async fn retrieve_setup_intent(&self, id: &str) -> Result<SetupIntent, ProviderError> {
        let state = self.enter("retrieve_setup_intent", vec![id.to_string()])?;
        state
            .setup_intents
            .get(id)
            .cloned()
            .ok_or_else(|| missing(ResourceKind::SetupIntent, id))
    }

    async fn create_checkout_session(
        &self,
        params: &CreateCheckoutParams,
    ) -> Result<CheckoutSession, ProviderError> {
        let mut state = self.enter(
            "create_checkout_session",
            vec![
                params.customer.to_string(),
                params.mode.as_str().to_string(),
                params.price_id.clone().unwrap_or_default(),
            ],
        )?;
        let created = state.next();
        let n = state.sequence;
        Ok(CheckoutSession {
            id: format!("cs_mock_{}", n),
            customer: Some(params.customer.to_string()),
            mode: Some(params.mode.as_str().to_string()),
            url: Some(format!("https://checkout.example.com/c/cs_mock_{}", n)),
            client_reference_id: Some(params.client_reference_id.clone()),
            created,
        })
    }

    async fn create_billing_portal_session(
        &self,
        params: &CreateBillingPortalParams,
    ) -> Result<BillingPortalSession, ProviderError> {
        let mut state = self.enter(
            "create_billing_portal_session",
            vec![params.customer.to_string()],
        )?;
        let created = state.next();
        let n = state.sequence;
        Ok(BillingPortalSession {
            id: format!("bps_mock_{}", n),
            customer: params.customer.to_string(),
            url: format!("https://billing.example.com/p/session/{}", n),
            return_url: params.return_url.clone(),
            created,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn price(id: &str, product: &str) -> Price {
        serde_json::from_value(json!({
            "id": id,
            "product": product,
            "currency": "usd",
            "unit_amount": 999,
            "recurring": {"interval": "month"},
            "type": "recurring"
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn created_customers_can_be_retrieved() {
        let mock = MockPaymentsClient::new();
        let customer = mock
            .create_customer(&CreateCustomerParams {
                email: Some("a@x.com".into()),
                ..Default::default()
            })
            .await
            .unwrap();

        let customer_ref = CustomerRef::new(customer.id.clone()).unwrap();
        let fetched = mock.retrieve_customer(&customer_ref).await.unwrap();
        assert_eq!(fetched, customer);
        assert_eq!(mock.call_count("create_customer"), 1);
        assert_eq!(mock.call_count("retrieve_customer"), 1);
    }

    #[tokio::test]
    async fn unknown_ids_are_resource_missing() {
        let mock = MockPaymentsClient::new();
        let err = mock.retrieve_price("price_nope").await.unwrap_err();
        assert!(err.is_resource_missing());
        assert_eq!(err.request_id.as_deref(), Some("req_mock"));
    }

    #[tokio::test]
    async fn injected_errors_are_returned_and_logged() {
        let mock = MockPaymentsClient::new();
        mock.set_method_error(
            "retrieve_price",
            ProviderError::new(ProviderErrorKind::Api, "boom"),
        );
        mock.add_price(price("price_1", "prod_1"));

        let err = mock.retrieve_price("price_1").await.unwrap_err();
        assert_eq!(err.kind, ProviderErrorKind::Api);
        assert!(mock.was_called("retrieve_price"));

        mock.clear_errors();
        assert!(mock.retrieve_price("price_1").await.is_ok());
    }

    #[tokio::test]
    async fn id_errors_only_hit_that_object() {
        let mock = MockPaymentsClient::new();
        mock.add_price(price("price_1", "prod_1"));
        mock.add_price(price("price_2", "prod_1"));
        mock.set_id_error(
            "price_2",
            ProviderError::new(ProviderErrorKind::RateLimit, "slow down"),
        );

        assert!(mock.retrieve_price("price_1").await.is_ok());
        let err = mock.retrieve_price("price_2").await.unwrap_err();
        assert_eq!(err.kind, ProviderErrorKind::RateLimit);
        assert_eq!(mock.call_count("retrieve_price"), 2);
    }

    #[tokio::test]
    async fn canceled_subscriptions_are_hidden_by_default() {
        let mock = MockPaymentsClient::new();
        let customer = mock
            .create_customer(&CreateCustomerParams::default())
            .await
            .unwrap();
        let customer_ref = CustomerRef::new(customer.id).unwrap();
        mock.add_price(price("price_1", "prod_1"));

        let sub = mock
            .create_subscription(&CreateSubscriptionParams {
                customer: customer_ref.clone(),
                price_id: "price_1".into(),
                default_payment_method: None,
                metadata: Default::default(),
            })
            .await
            .unwrap();
        mock.cancel_subscription(&sub.id).await.unwrap();

        let filter = SubscriptionFilter::for_customer(customer_ref.clone());
        assert!(mock.list_subscriptions(&filter).await.unwrap().is_empty());

        let all = SubscriptionFilter {
            status: Some("all".into()),
            ..SubscriptionFilter::for_customer(customer_ref)
        };
        assert_eq!(mock.list_subscriptions(&all).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn price_without_item_id_adds_an_item() {
        let mock = MockPaymentsClient::new();
        mock.add_price(price("price_1", "prod_1"));
        mock.add_price(price("price_2", "prod_1"));
        let customer = mock
            .create_customer(&CreateCustomerParams::default())
            .await
            .unwrap();
        let sub = mock
            .create_subscription(&CreateSubscriptionParams {
                customer: CustomerRef::new(customer.id).unwrap(),
                price_id: "price_1".into(),
                default_payment_method: None,
                metadata: Default::default(),
            })
            .await
            .unwrap();

        let updated = mock
            .modify_subscription(
                &sub.id,
                &SubscriptionUpdate {
                    price_id: Some("price_2".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let prices: Vec<&str> = updated.items.data.iter().map(|i| i.price.id.as_str()).collect();
        assert_eq!(prices, vec!["price_1", "price_2"]);
    }
}
