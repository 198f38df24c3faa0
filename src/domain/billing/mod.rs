//! Billing domain: local users, remote payments objects, ownership,
//! subscription status, events and errors.

mod errors;
mod events;
mod ownership;
mod resources;
mod subscription_status;
mod user;

pub use errors::{strip_request_id, BillingError, ProviderErrorKind};
pub use events::{BillingEvent, BillingEventPayload};
pub use ownership::OwnedByCustomer;
pub use resources::{
    BillingPortalSession, CheckoutSession, Customer, Invoice, InvoiceSettings, List,
    PaymentMethod, Price, Product, Recurring, ResourceKind, SetupIntent, Subscription,
    SubscriptionItem, SubscriptionState,
};
pub use subscription_status::{select_relevant, SubscriptionInfo, SubscriptionStatus, FREE};
pub use user::{user_description, LocalUser, Principal, TokenPrincipal, UserField};

#[cfg(test)]
pub(crate) use resources::fixtures;
#[cfg(test)]
pub(crate) use user::test_user;
