//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the billing core and the outside world. Adapters implement these ports.
//!
//! - `PaymentsClient` - Remote payments provider (Stripe)
//! - `UserStore` - Host application user records
//! - `CacheStore` - Subscription check cache
//! - `EventPublisher` / `EventSubscriber` / `EventHandler` - In-process events
//! - `SessionValidator` - Bearer token validation

mod cache_store;
mod event_publisher;
mod event_subscriber;
mod payments_client;
mod session_validator;
mod user_store;

pub use cache_store::{CacheError, CacheStore};
pub use event_publisher::EventPublisher;
pub use event_subscriber::{EventBus, EventHandler, EventSubscriber};
pub use payments_client::{
    BillingDetailsUpdate, CheckoutMode, CreateBillingPortalParams, CreateCheckoutParams,
    CreateCustomerParams, CreateSetupIntentParams, CreateSubscriptionParams, CustomerUpdate,
    FormParams, InvoiceFilter, PaymentMethodUpdate, PaymentsClient, PriceFilter, ProductFilter,
    ProviderError, SubscriptionFilter, SubscriptionUpdate,
};
pub use session_validator::{AuthError, SessionValidator};
pub use user_store::{UserStore, UserStoreError};
