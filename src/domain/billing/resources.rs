//! Remote payments-provider objects.
//!
//! Shapes follow the Stripe REST API. Only fields this crate reads or
//! returns are modelled; unknown fields are ignored on decode.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::fmt;

/// Paginated list envelope returned by list endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct List<T> {
    pub data: Vec<T>,
    #[serde(default)]
    pub has_more: bool,
}

impl<T> List<T> {
    pub fn new(data: Vec<T>) -> Self {
        Self {
            data,
            has_more: false,
        }
    }
}

impl<T> Default for List<T> {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

/// Kinds of remote object, used for routing and error messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Customer,
    PaymentMethod,
    Subscription,
    Invoice,
    Price,
    Product,
    SetupIntent,
    CheckoutSession,
    BillingPortalSession,
}

impl ResourceKind {
    /// Machine name, e.g. `payment_method`.
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Customer => "customer",
            ResourceKind::PaymentMethod => "payment_method",
            ResourceKind::Subscription => "subscription",
            ResourceKind::Invoice => "invoice",
            ResourceKind::Price => "price",
            ResourceKind::Product => "product",
            ResourceKind::SetupIntent => "setup_intent",
            ResourceKind::CheckoutSession => "checkout_session",
            ResourceKind::BillingPortalSession => "billing_portal_session",
        }
    }
}

/// Human wording, e.g. `payment method`, as used in "No such ..." messages.
impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str().replace('_', " "))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceSettings {
    #[serde(default)]
    pub default_payment_method: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub invoice_settings: InvoiceSettings,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    #[serde(default)]
    pub created: i64,
}

impl Customer {
    pub fn default_payment_method(&self) -> Option<&str> {
        self.invoice_settings.default_payment_method.as_deref()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentMethod {
    pub id: String,
    #[serde(rename = "type")]
    pub method_type: String,
    #[serde(default)]
    pub billing_details: JsonValue,
    #[serde(default)]
    pub card: Option<JsonValue>,
    #[serde(default)]
    pub customer: Option<String>,
    #[serde(default)]
    pub created: i64,
}

/// Remote subscription lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionState {
    Incomplete,
    IncompleteExpired,
    Trialing,
    Active,
    PastDue,
    Canceled,
    Unpaid,
    Paused,
    #[serde(other)]
    Unknown,
}

impl SubscriptionState {
    /// States that count towards "is subscribed".
    pub fn is_relevant(&self) -> bool {
        matches!(
            self,
            SubscriptionState::Active
                | SubscriptionState::Trialing
                | SubscriptionState::PastDue
                | SubscriptionState::Unpaid
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionItem {
    pub id: String,
    pub price: Price,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subscription {
    pub id: String,
    pub customer: String,
    pub status: SubscriptionState,
    #[serde(default)]
    pub cancel_at: Option<i64>,
    #[serde(default)]
    pub current_period_end: Option<i64>,
    #[serde(default)]
    pub current_period_start: Option<i64>,
    #[serde(default)]
    pub days_until_due: Option<i64>,
    #[serde(default)]
    pub default_payment_method: Option<String>,
    #[serde(default)]
    pub latest_invoice: Option<String>,
    #[serde(default)]
    pub start_date: Option<i64>,
    #[serde(default)]
    pub trial_end: Option<i64>,
    #[serde(default)]
    pub trial_start: Option<i64>,
    #[serde(default)]
    pub items: List<SubscriptionItem>,
    #[serde(default)]
    pub created: i64,
}

impl Subscription {
    /// Whether any item is priced under `product_id`.
    pub fn covers_product(&self, product_id: &str) -> bool {
        self.items.data.iter().any(|i| i.price.product == product_id)
    }

    pub fn covers_price(&self, price_id: &str) -> bool {
        self.items.data.iter().any(|i| i.price.id == price_id)
    }

    /// First item price belonging to `product_id`.
    pub fn price_for_product(&self, product_id: &str) -> Option<&Price> {
        self.items
            .data
            .iter()
            .map(|i| &i.price)
            .find(|p| p.product == product_id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invoice {
    pub id: String,
    #[serde(default)]
    pub customer: Option<String>,
    #[serde(default)]
    pub amount_due: i64,
    #[serde(default)]
    pub amount_paid: i64,
    #[serde(default)]
    pub currency: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub subscription: Option<String>,
    #[serde(default)]
    pub hosted_invoice_url: Option<String>,
    #[serde(default)]
    pub invoice_pdf: Option<String>,
    #[serde(default)]
    pub number: Option<String>,
    #[serde(default)]
    pub created: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recurring {
    pub interval: String,
    #[serde(default = "one")]
    pub interval_count: i64,
    #[serde(default)]
    pub usage_type: Option<String>,
}

fn one() -> i64 {
    1
}

fn yes() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Price {
    pub id: String,
    pub product: String,
    #[serde(default = "yes")]
    pub active: bool,
    #[serde(default)]
    pub currency: String,
    #[serde(default)]
    pub unit_amount: Option<i64>,
    #[serde(default)]
    pub unit_amount_decimal: Option<String>,
    #[serde(default)]
    pub nickname: Option<String>,
    #[serde(default)]
    pub recurring: Option<Recurring>,
    #[serde(rename = "type", default)]
    pub price_type: String,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    #[serde(default)]
    pub created: i64,
}

impl Price {
    pub fn is_recurring(&self) -> bool {
        self.recurring.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default = "yes")]
    pub active: bool,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    #[serde(default)]
    pub shippable: Option<bool>,
    #[serde(rename = "type", default)]
    pub product_type: Option<String>,
    #[serde(default)]
    pub unit_label: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub created: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetupIntent {
    pub id: String,
    #[serde(default)]
    pub customer: Option<String>,
    #[serde(default)]
    pub client_secret: Option<String>,
    #[serde(default)]
    pub payment_method_types: Vec<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub created: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    #[serde(default)]
    pub customer: Option<String>,
    #[serde(default)]
    pub mode: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub client_reference_id: Option<String>,
    #[serde(default)]
    pub created: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BillingPortalSession {
    pub id: String,
    pub customer: String,
    pub url: String,
    #[serde(default)]
    pub return_url: Option<String>,
    #[serde(default)]
    pub created: i64,
}
