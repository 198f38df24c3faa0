//! EventPublisher port - Interface for dispatching billing events.
//!
//! Dispatch is synchronous and in-process: `publish` returns after every
//! listener registered for the event type has run.

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, EventEnvelope};

/// Port for publishing domain events.
///
/// ```ignore
/// let envelope = event.envelope()?;
/// publisher.publish(envelope).await?;
/// ```
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Deliver one event to its listeners.
    ///
    /// Returns the joined listener failures, if any. Every listener is
    /// still invoked when an earlier one fails.
    async fn publish(&self, event: EventEnvelope) -> Result<(), DomainError>;
}
