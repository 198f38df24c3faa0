//! HTTP DTOs for billing endpoints.
//!
//! Responses are fixed allow-lists of fields per resource type. Provider
//! payloads are never passed through whole.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::{BTreeMap, HashMap};

use crate::application::handlers::billing::{PaymentMethodEntry, PriceEntry, ProductEntry};
use crate::domain::billing::{
    Invoice, PaymentMethod, Recurring, SetupIntent, Subscription, SubscriptionInfo,
    SubscriptionState,
};
use crate::ports::{BillingDetailsUpdate, PaymentMethodUpdate, SubscriptionUpdate};

// ════════════════════════════════════════════════════════════════════════════════
// Query Parameters
// ════════════════════════════════════════════════════════════════════════════════

/// Splits a comma separated query value, dropping empty items.
pub fn split_list(value: Option<&str>) -> Vec<String> {
    value
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PricesParams {
    pub product: Option<String>,
    pub currency: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductsParams {
    /// Comma separated product ids.
    pub ids: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PaymentMethodsParams {
    /// Comma separated payment method types.
    pub types: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SubscriptionsParams {
    pub price: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct InvoicesParams {
    pub subscription: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StatusParams {
    pub product_id: Option<String>,
}

// ════════════════════════════════════════════════════════════════════════════════
// Request DTOs
// ════════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SetupCheckoutRequest {
    #[serde(default)]
    pub subscription_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateSubscriptionRequest {
    pub price_id: String,
    #[serde(default)]
    pub default_payment_method: Option<String>,
    #[serde(default)]
    pub set_as_default_payment_method: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ModifySubscriptionRequest {
    #[serde(default)]
    pub price_id: Option<String>,
    #[serde(default)]
    pub default_payment_method: Option<String>,
    #[serde(default)]
    pub cancel_at_period_end: Option<bool>,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
    #[serde(default)]
    pub set_as_default_payment_method: bool,
}

impl ModifySubscriptionRequest {
    pub fn changes(&self) -> SubscriptionUpdate {
        SubscriptionUpdate {
            price_id: self.price_id.clone(),
            item_id: None,
            default_payment_method: self.default_payment_method.clone(),
            cancel_at_period_end: self.cancel_at_period_end,
            metadata: self.metadata.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BillingDetailsRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CardChangesRequest {
    pub exp_month: Option<u32>,
    pub exp_year: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ModifyPaymentMethodRequest {
    #[serde(default)]
    pub set_as_default: bool,
    #[serde(default)]
    pub billing_details: Option<BillingDetailsRequest>,
    #[serde(default)]
    pub card: Option<CardChangesRequest>,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl ModifyPaymentMethodRequest {
    pub fn changes(&self) -> PaymentMethodUpdate {
        PaymentMethodUpdate {
            billing_details: self.billing_details.as_ref().map(|d| BillingDetailsUpdate {
                name: d.name.clone(),
                email: d.email.clone(),
                phone: d.phone.clone(),
            }),
            card_exp_month: self.card.as_ref().and_then(|c| c.exp_month),
            card_exp_year: self.card.as_ref().and_then(|c| c.exp_year),
            metadata: self.metadata.clone(),
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Response DTOs
// ════════════════════════════════════════════════════════════════════════════════

/// Sorts newest first by (`created`, `id`).
pub fn newest_first<T, F>(mut items: Vec<T>, key: F) -> Vec<T>
where
    F: Fn(&T) -> (i64, &str),
{
    items.sort_by(|a, b| key(b).cmp(&key(a)));
    items
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckoutResponse {
    #[serde(rename = "sessionId")]
    pub session_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PortalResponse {
    pub url: String,
}

/// Browser-side settings. `publicKey` is null when none is configured.
#[derive(Debug, Clone, Serialize)]
pub struct ClientConfigResponse {
    #[serde(rename = "publicKey")]
    pub public_key: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PaymentMethodView {
    pub id: String,
    #[serde(rename = "type")]
    pub method_type: String,
    pub billing_details: JsonValue,
    pub card: Option<JsonValue>,
    pub created: i64,
    /// Only present on list responses.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<bool>,
}

impl From<PaymentMethod> for PaymentMethodView {
    fn from(pm: PaymentMethod) -> Self {
        Self {
            id: pm.id,
            method_type: pm.method_type,
            billing_details: pm.billing_details,
            card: pm.card,
            created: pm.created,
            default: None,
        }
    }
}

impl From<PaymentMethodEntry> for PaymentMethodView {
    fn from(entry: PaymentMethodEntry) -> Self {
        Self {
            default: Some(entry.is_default),
            ..Self::from(entry.payment_method)
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SubscriptionView {
    pub id: String,
    pub status: SubscriptionState,
    pub cancel_at: Option<i64>,
    pub current_period_end: Option<i64>,
    pub current_period_start: Option<i64>,
    pub days_until_due: Option<i64>,
    pub default_payment_method: Option<String>,
    pub latest_invoice: Option<String>,
    pub start_date: Option<i64>,
    pub trial_end: Option<i64>,
    pub trial_start: Option<i64>,
    pub created: i64,
}

impl From<Subscription> for SubscriptionView {
    fn from(sub: Subscription) -> Self {
        Self {
            id: sub.id,
            status: sub.status,
            cancel_at: sub.cancel_at,
            current_period_end: sub.current_period_end,
            current_period_start: sub.current_period_start,
            days_until_due: sub.days_until_due,
            default_payment_method: sub.default_payment_method,
            latest_invoice: sub.latest_invoice,
            start_date: sub.start_date,
            trial_end: sub.trial_end,
            trial_start: sub.trial_start,
            created: sub.created,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct InvoiceView {
    pub id: String,
    pub created: i64,
    pub amount_due: i64,
    pub amount_paid: i64,
    pub currency: String,
    pub status: Option<String>,
    pub subscription: Option<String>,
    pub hosted_invoice_url: Option<String>,
    pub invoice_pdf: Option<String>,
    pub number: Option<String>,
}

impl From<Invoice> for InvoiceView {
    fn from(invoice: Invoice) -> Self {
        Self {
            id: invoice.id,
            created: invoice.created,
            amount_due: invoice.amount_due,
            amount_paid: invoice.amount_paid,
            currency: invoice.currency,
            status: invoice.status,
            subscription: invoice.subscription,
            hosted_invoice_url: invoice.hosted_invoice_url,
            invoice_pdf: invoice.invoice_pdf,
            number: invoice.number,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PriceView {
    pub id: String,
    pub recurring: Option<Recurring>,
    #[serde(rename = "type")]
    pub price_type: String,
    pub currency: String,
    pub unit_amount: Option<i64>,
    pub unit_amount_decimal: Option<String>,
    pub nickname: Option<String>,
    pub metadata: HashMap<String, String>,
    pub product: String,
    pub subscription_info: SubscriptionInfo,
}

impl From<PriceEntry> for PriceView {
    fn from(entry: PriceEntry) -> Self {
        let price = entry.price;
        Self {
            id: price.id,
            recurring: price.recurring,
            price_type: price.price_type,
            currency: price.currency,
            unit_amount: price.unit_amount,
            unit_amount_decimal: price.unit_amount_decimal,
            nickname: price.nickname,
            metadata: price.metadata,
            product: price.product,
            subscription_info: entry.subscription_info,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ProductView {
    pub id: String,
    pub images: Vec<String>,
    pub metadata: HashMap<String, String>,
    pub name: String,
    pub prices: Vec<PriceView>,
    pub shippable: Option<bool>,
    pub subscription_info: SubscriptionInfo,
    #[serde(rename = "type")]
    pub product_type: Option<String>,
    pub unit_label: Option<String>,
    pub url: Option<String>,
}

impl From<ProductEntry> for ProductView {
    fn from(entry: ProductEntry) -> Self {
        let product = entry.product;
        Self {
            id: product.id,
            images: product.images,
            metadata: product.metadata,
            name: product.name,
            prices: entry.prices.into_iter().map(PriceView::from).collect(),
            shippable: product.shippable,
            subscription_info: entry.subscription_info,
            product_type: product.product_type,
            unit_label: product.unit_label,
            url: product.url,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SetupIntentView {
    pub id: String,
    pub client_secret: Option<String>,
    pub payment_method_types: Vec<String>,
}

impl From<SetupIntent> for SetupIntentView {
    fn from(intent: SetupIntent) -> Self {
        Self {
            id: intent.id,
            client_secret: intent.client_secret,
            payment_method_types: intent.payment_method_types,
        }
    }
}

/// Standard error response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error code for programmatic handling.
    pub code: String,
    /// Human-readable error message.
    pub detail: String,
}

impl ErrorResponse {
    pub fn new(code: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            detail: detail.into(),
        }
    }
}
