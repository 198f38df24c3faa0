//! Stripe REST adapter.
//!
//! Implements `PaymentsClient` against the Stripe HTTP API with form
//! encoded requests and basic auth. Timeouts come from configuration;
//! retries are not attempted.
//!
//! Failed calls are mapped to `ProviderError` from Stripe's error body.
//! The message is prefixed with `Request req_...: ` when Stripe returns a
//! request id, matching what Stripe's own client libraries show.
//!
//! ```ignore
//! let config = StripeConfig::from_settings(&app_config.stripe);
//! let client = StripeClient::new(config)?;
//! ```

use async_trait::async_trait;
use reqwest::{RequestBuilder, Response, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;

use crate::config::StripeSettings;
use crate::domain::billing::{
    BillingPortalSession, CheckoutSession, Customer, Invoice, List, PaymentMethod, Price, Product,
    ProviderErrorKind, SetupIntent, Subscription,
};
use crate::domain::foundation::CustomerRef;
use crate::ports::{
    CreateBillingPortalParams, CreateCheckoutParams, CreateCustomerParams,
    CreateSetupIntentParams, CreateSubscriptionParams, CustomerUpdate, FormParams, InvoiceFilter,
    PaymentMethodUpdate, PaymentsClient, PriceFilter, ProductFilter, ProviderError,
    SubscriptionFilter, SubscriptionUpdate,
};

/// Largest page Stripe serves.
const PAGE_LIMIT: &str = "100";

/// Stripe API configuration.
#[derive(Clone)]
pub struct StripeConfig {
    /// Secret API key (sk_live_... or sk_test_...).
    api_key: SecretString,

    /// Base URL for Stripe API (default: https://api.stripe.com).
    api_base_url: String,

    timeout: Duration,
}

impl StripeConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: SecretString::new(api_key.into()),
            api_base_url: "https://api.stripe.com".to_string(),
            timeout: Duration::from_secs(30),
        }
    }

    pub fn from_settings(settings: &StripeSettings) -> Self {
        Self::new(settings.api_key.clone())
            .with_base_url(settings.api_base_url.clone())
            .with_timeout(settings.timeout())
    }

    /// Set a custom API base URL (for testing).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Stripe payments client.
pub struct StripeClient {
    config: StripeConfig,
    http_client: reqwest::Client,
}

impl StripeClient {
    pub fn new(config: StripeConfig) -> Result<Self, ProviderError> {
        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ProviderError::network(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            config,
            http_client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v1/{}", self.config.api_base_url, path)
    }

    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &FormParams,
    ) -> Result<T, ProviderError> {
        let request = self.http_client.get(self.url(path)).query(query);
        self.send(request).await
    }

    async fn post<T: DeserializeOwned>(
        &self,
        path: &str,
        form: &FormParams,
    ) -> Result<T, ProviderError> {
        let request = self.http_client.post(self.url(path)).form(form);
        self.send(request).await
    }

    async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T, ProviderError> {
        let request = self.http_client.delete(self.url(path));
        self.send(request).await
    }

    async fn list<T: DeserializeOwned>(
        &self,
        path: &str,
        mut query: FormParams,
    ) -> Result<Vec<T>, ProviderError> {
        query.push(("limit".to_string(), PAGE_LIMIT.to_string()));
        let list: List<T> = self.get(path, &query).await?;
        if list.has_more {
            tracing::warn!(path, "Stripe list truncated at {} items", PAGE_LIMIT);
        }
        Ok(list.data)
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ProviderError> {
        let response = request
            .basic_auth(self.config.api_key.expose_secret(), Option::<&str>::None)
            .send()
            .await
            .map_err(|e| ProviderError::network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        response
            .json()
            .await
            .map_err(|e| ProviderError::decode(format!("Failed to parse Stripe response: {}", e)))
    }
}

#[derive(Debug, Deserialize)]
struct StripeErrorBody {
    error: StripeErrorDetail,
}

#[derive(Debug, Deserialize)]
struct StripeErrorDetail {
    #[serde(rename = "type", default)]
    error_type: Option<String>,
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

async fn error_from_response(response: Response) -> ProviderError {
    let status = response.status();
    let request_id = response
        .headers()
        .get("request-id")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let body = response.text().await.unwrap_or_default();
    let error = provider_error(status, request_id.as_deref(), &body);
    tracing::error!(
        status = status.as_u16(),
        request_id = request_id.as_deref().unwrap_or("-"),
        kind = ?error.kind,
        "Stripe request failed"
    );
    error
}

/// Builds a `ProviderError` from a non-success Stripe response.
fn provider_error(status: StatusCode, request_id: Option<&str>, body: &str) -> ProviderError {
    let detail = serde_json::from_str::<StripeErrorBody>(body)
        .map(|b| b.error)
        .ok();

    let kind = classify(
        status,
        detail.as_ref().and_then(|d| d.error_type.as_deref()),
        detail.as_ref().and_then(|d| d.code.as_deref()),
    );
    let message = detail
        .and_then(|d| d.message)
        .unwrap_or_else(|| format!("Stripe API error ({})", status.as_u16()));

    let error = match request_id {
        Some(id) => ProviderError::new(kind, format!("Request {}: {}", id, message))
            .with_request_id(id),
        None => ProviderError::new(kind, message),
    };
    error.with_status(status.as_u16())
}

fn classify(status: StatusCode, error_type: Option<&str>, code: Option<&str>) -> ProviderErrorKind {
    if code == Some("resource_missing") {
        return ProviderErrorKind::ResourceMissing;
    }
    match error_type {
        Some("card_error") => return ProviderErrorKind::Card,
        Some("authentication_error") => return ProviderErrorKind::Authentication,
        Some("rate_limit_error") => return ProviderErrorKind::RateLimit,
        Some("invalid_request_error") if status != StatusCode::NOT_FOUND => {
            return ProviderErrorKind::InvalidRequest
        }
        _ => {}
    }
    match status {
        StatusCode::NOT_FOUND => ProviderErrorKind::ResourceMissing,
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ProviderErrorKind::Authentication,
        StatusCode::TOO_MANY_REQUESTS => ProviderErrorKind::RateLimit,
        StatusCode::PAYMENT_REQUIRED => ProviderErrorKind::Card,
        s if s.is_client_error() => ProviderErrorKind::InvalidRequest,
        _ => ProviderErrorKind::Api,
    }
}

#[async_trait]
impl PaymentsClient for StripeClient {
    async fn create_customer(
        &self,
        params: &CreateCustomerParams,
    ) -> Result<Customer, ProviderError> {
        self.post("customers", &params.to_form()).await
    }

    async fn retrieve_customer(&self, customer: &CustomerRef) -> Result<Customer, ProviderError> {
        let path = format!("customers/{}", customer);
        let value: serde_json::Value = self.get(&path, &Vec::new()).await?;
        // Deleted customers come back as a 200 stub
        if value.get("deleted").and_then(|d| d.as_bool()) == Some(true) {
            return Err(ProviderError::resource_missing(format!(
                "No such customer: '{}'",
                customer
            )));
        }
        serde_json::from_value(value)
            .map_err(|e| ProviderError::decode(format!("Failed to parse Stripe response: {}", e)))
    }

    async fn modify_customer(
        &self,
        customer: &CustomerRef,
        update: &CustomerUpdate,
    ) -> Result<Customer, ProviderError> {
        self.post(&format!("customers/{}", customer), &update.to_form())
            .await
    }

    async fn list_payment_methods(
        &self,
        customer: &CustomerRef,
        method_type: &str,
    ) -> Result<Vec<PaymentMethod>, ProviderError> {
        let query = vec![
            ("customer".to_string(), customer.to_string()),
            ("type".to_string(), method_type.to_string()),
        ];
        self.list("payment_methods", query).await
    }

    async fn retrieve_payment_method(&self, id: &str) -> Result<PaymentMethod, ProviderError> {
        self.get(&format!("payment_methods/{}", id), &Vec::new())
            .await
    }

    async fn modify_payment_method(
        &self,
        id: &str,
        update: &PaymentMethodUpdate,
    ) -> Result<PaymentMethod, ProviderError> {
        self.post(&format!("payment_methods/{}", id), &update.to_form())
            .await
    }

    async fn detach_payment_method(&self, id: &str) -> Result<PaymentMethod, ProviderError> {
        self.post(&format!("payment_methods/{}/detach", id), &Vec::new())
            .await
    }

    async fn list_subscriptions(
        &self,
        filter: &SubscriptionFilter,
    ) -> Result<Vec<Subscription>, ProviderError> {
        self.list("subscriptions", filter.to_form()).await
    }

    async fn retrieve_subscription(&self, id: &str) -> Result<Subscription, ProviderError> {
        self.get(&format!("subscriptions/{}", id), &Vec::new())
            .await
    }

    async fn create_subscription(
        &self,
        params: &CreateSubscriptionParams,
    ) -> Result<Subscription, ProviderError> {
        self.post("subscriptions", &params.to_form()).await
    }

    async fn modify_subscription(
        &self,
        id: &str,
        update: &SubscriptionUpdate,
    ) -> Result<Subscription, ProviderError> {
        self.post(&format!("subscriptions/{}", id), &update.to_form())
            .await
    }

    async fn cancel_subscription(&self, id: &str) -> Result<Subscription, ProviderError> {
        self.delete(&format!("subscriptions/{}", id)).await
    }

    async fn list_invoices(&self, filter: &InvoiceFilter) -> Result<Vec<Invoice>, ProviderError> {
        self.list("invoices", filter.to_form()).await
    }

    async fn retrieve_invoice(&self, id: &str) -> Result<Invoice, ProviderError> {
        self.get(&format!("invoices/{}", id), &Vec::new()).await
    }

    async fn list_prices(&self, filter: &PriceFilter) -> Result<Vec<Price>, ProviderError> {
        self.list("prices", filter.to_form()).await
    }

    async fn retrieve_price(&self, id: &str) -> Result<Price, ProviderError> {
        self.get(&format!("prices/{}", id), &Vec::new()).await
    }

    async fn list_products(&self, filter: &ProductFilter) -> Result<Vec<Product>, ProviderError> {
        self.list("products", filter.to_form()).await
    }

    async fn retrieve_product(&self, id: &str) -> Result<Product, ProviderError> {
        self.get(&format!("products/{}", id), &Vec::new()).await
    }

    async fn create_setup_intent(
        &self,
        params: &CreateSetupIntentParams,
    ) -> Result<SetupIntent, ProviderError> {
        self.post("setup_intents", &params.to_form()).await
    }

    async fn retrieve_setup_intent(&self, id: &str) -> Result<SetupIntent, ProviderError> {
        self.get(&format!("setup_intents/{}", id), &Vec::new())
            .await
    }

    async fn create_checkout_session(
        &self,
        params: &CreateCheckoutParams,
    ) -> Result<CheckoutSession, ProviderError> {
        self.post("checkout/sessions", &params.to_form()).await
    }

    async fn create_billing_portal_session(
        &self,
        params: &CreateBillingPortalParams,
    ) -> Result<BillingPortalSession, ProviderError> {
        self.post("billing_portal/sessions", &params.to_form())
            .await
    }
}
