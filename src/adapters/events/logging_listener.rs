//! Listener that writes every billing event to the tracing log.

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, EventEnvelope};
use crate::ports::EventHandler;

/// Every event name the billing core emits.
pub const BILLING_EVENT_TYPES: [&str; 10] = [
    "new_customer",
    "customer_modified",
    "checkout_created",
    "billing_portal_created",
    "setup_intent_created",
    "subscription_created",
    "subscription_modified",
    "subscription_cancelled",
    "payment_method_modified",
    "payment_method_detached",
];

/// Audit trail of billing events. Never fails.
#[derive(Debug, Default, Clone, Copy)]
pub struct EventLogger;

#[async_trait]
impl EventHandler for EventLogger {
    async fn handle(&self, event: EventEnvelope) -> Result<(), DomainError> {
        tracing::info!(
            event_id = %event.event_id,
            event_type = %event.event_type,
            resource_kind = %event.resource_kind,
            resource_id = %event.resource_id,
            user_id = event.metadata.user_id.as_deref().unwrap_or("-"),
            "Billing event"
        );
        Ok(())
    }

    fn name(&self) -> &'static str {
        "EventLogger"
    }
}
