//! Billing handlers.
//!
//! Operations on the caller's remote payments objects. Every handler
//! works on a resolved [`LocalUser`](crate::domain::billing::LocalUser)
//! and reaches customer-scoped objects only through [`ResourceGateway`].
//!
//! ## Commands
//! - Ensuring and syncing the remote customer
//! - Checkout, setup checkout and billing portal sessions
//! - Subscribing, changing and cancelling subscriptions
//! - Modifying and detaching payment methods
//! - Creating setup intents
//!
//! ## Queries
//! - Catalog (prices and products)
//! - Payment methods, subscriptions, invoices
//! - Subscription status

pub mod capabilities;
pub mod resource_types;

mod catalog;
mod checkout;
mod customer_sync;
mod event_emitter;
mod gateway;
mod invoices;
mod payment_methods;
mod setup_intents;
mod status;
mod subscriptions;
mod syncing_user_store;
mod user_resolver;

// Building blocks
pub use customer_sync::{CustomerSync, NewCustomerParams, NoExtraCustomerParams};
pub use event_emitter::EventEmitter;
pub use gateway::ResourceGateway;
pub use syncing_user_store::CustomerSyncingUserStore;
pub use user_resolver::UserResolver;

// Commands
pub use checkout::CheckoutHandler;
pub use setup_intents::SetupIntentsHandler;
pub use subscriptions::{SubscribeRequest, SubscriptionsHandler};

// Queries and mixed
pub use catalog::{Catalog, PriceEntry, ProductEntry};
pub use invoices::InvoicesHandler;
pub use payment_methods::{PaymentMethodEntry, PaymentMethodsHandler, DETACH_ALL};
pub use status::{subscription_cache_key, SubscriptionStatusEvaluator};
