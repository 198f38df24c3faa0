//! Derived subscription status.
//!
//! Not persisted. Built either from the manual access window or from the
//! customer's remote subscriptions.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::Timestamp;

use super::{LocalUser, Subscription};

/// `sub_id` reported when access comes from the manual window.
pub const FREE: &str = "FREE";

/// Answer to "is this user subscribed to product P".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionStatus {
    /// Subscription that grants access; `FREE` for the manual window.
    pub sub_id: Option<String>,
    pub subscribed: bool,
    pub cancel_at: Option<i64>,
    pub current_period_end: Option<i64>,
    pub price_id: Option<String>,
    pub product_id: String,
    /// True when the manual access window answered, not the provider.
    pub evaluation: bool,
}

impl SubscriptionStatus {
    /// Status for an open manual access window.
    pub fn free_access(
        until: Timestamp,
        product_id: impl Into<String>,
        free_price_id: Option<String>,
    ) -> Self {
        Self {
            sub_id: Some(FREE.to_string()),
            subscribed: true,
            cancel_at: None,
            current_period_end: Some(until.as_unix_secs()),
            price_id: free_price_id,
            product_id: product_id.into(),
            evaluation: true,
        }
    }

    pub fn not_subscribed(product_id: impl Into<String>) -> Self {
        Self {
            sub_id: None,
            subscribed: false,
            cancel_at: None,
            current_period_end: None,
            price_id: None,
            product_id: product_id.into(),
            evaluation: false,
        }
    }

    /// Evaluates remote subscriptions for `product_id`.
    pub fn from_subscriptions(subscriptions: &[Subscription], product_id: &str) -> Self {
        match select_relevant(subscriptions, |s| s.covers_product(product_id)) {
            Some(sub) => Self {
                sub_id: Some(sub.id.clone()),
                subscribed: true,
                cancel_at: sub.cancel_at,
                current_period_end: sub.current_period_end,
                price_id: sub.price_for_product(product_id).map(|p| p.id.clone()),
                product_id: product_id.to_string(),
                evaluation: false,
            },
            None => Self::not_subscribed(product_id),
        }
    }

    /// Manual window status, if the window is open at `now`.
    pub fn for_manual_access(
        user: &LocalUser,
        now: &Timestamp,
        product_id: &str,
        free_price_id: Option<String>,
    ) -> Option<Self> {
        if !user.has_free_access_at(now) {
            return None;
        }
        user.allowed_access_until
            .map(|until| Self::free_access(until, product_id, free_price_id))
    }
}

/// Per-price subscription flag attached to catalog entries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionInfo {
    pub subscribed: bool,
    pub cancel_at: Option<i64>,
}

impl SubscriptionInfo {
    pub fn for_price(subscriptions: &[Subscription], price_id: &str) -> Self {
        match select_relevant(subscriptions, |s| s.covers_price(price_id)) {
            Some(sub) => Self {
                subscribed: true,
                cancel_at: sub.cancel_at,
            },
            None => Self::default(),
        }
    }

    pub fn for_product(subscriptions: &[Subscription], product_id: &str) -> Self {
        match select_relevant(subscriptions, |s| s.covers_product(product_id)) {
            Some(sub) => Self {
                subscribed: true,
                cancel_at: sub.cancel_at,
            },
            None => Self::default(),
        }
    }
}

/// Most recently created subscription in a relevant state matching `filter`.
pub fn select_relevant<F>(subscriptions: &[Subscription], filter: F) -> Option<&Subscription>
where
    F: Fn(&Subscription) -> bool,
{
    subscriptions
        .iter()
        .filter(|s| s.status.is_relevant() && filter(s))
        .max_by(|a, b| a.created.cmp(&b.created).then_with(|| a.id.cmp(&b.id)))
}
