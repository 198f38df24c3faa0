//! EventSubscriber port - Interface for registering event listeners.

use async_trait::async_trait;
use std::sync::Arc;

use crate::domain::foundation::{DomainError, EventEnvelope};

/// Listener for billing events.
///
/// ```ignore
/// struct WelcomeMailer { /* ... */ }
///
/// #[async_trait]
/// impl EventHandler for WelcomeMailer {
///     async fn handle(&self, event: EventEnvelope) -> Result<(), DomainError> {
///         let event: BillingEvent = event.payload_as()?;
///         // send mail to event.actor.email
///         Ok(())
///     }
///
///     fn name(&self) -> &'static str {
///         "WelcomeMailer"
///     }
/// }
/// ```
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, event: EventEnvelope) -> Result<(), DomainError>;

    /// Handler name for logging.
    fn name(&self) -> &'static str;
}

/// Port for connecting listeners to event types.
pub trait EventSubscriber: Send + Sync {
    /// Connect `handler` to one event type.
    fn subscribe(&self, event_type: &str, handler: Arc<dyn EventHandler>);

    /// Connect the same handler to several event types.
    fn subscribe_all(&self, event_types: &[&str], handler: Arc<dyn EventHandler>);
}

/// Combined trait for event bus implementations.
pub trait EventBus: super::EventPublisher + EventSubscriber {}

impl<T: super::EventPublisher + EventSubscriber> EventBus for T {}
