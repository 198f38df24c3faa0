//! EventEmitter - Fires billing events through the configured dispatcher.

use std::sync::Arc;

use crate::domain::billing::{BillingEvent, BillingEventPayload, LocalUser};
use crate::ports::EventPublisher;

/// Sends one event per successful mutating operation.
///
/// Dispatch is synchronous. Listener failures are logged and never turned
/// into an error for the operation that raised the event.
#[derive(Clone)]
pub struct EventEmitter {
    publisher: Arc<dyn EventPublisher>,
}

impl EventEmitter {
    pub fn new(publisher: Arc<dyn EventPublisher>) -> Self {
        Self { publisher }
    }

    pub async fn emit(&self, actor: &LocalUser, payload: BillingEventPayload) {
        let event = BillingEvent::new(actor, payload);
        let envelope = match event.envelope() {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::error!(user_id = %actor.id, error = %e, "Failed to serialize billing event");
                return;
            }
        };

        let event_type = envelope.event_type.clone();
        let resource_id = envelope.resource_id.clone();
        if let Err(e) = self.publisher.publish(envelope).await {
            tracing::warn!(
                user_id = %actor.id,
                event_type = %event_type,
                resource_id = %resource_id,
                error = %e,
                "Billing event listener failed"
            );
        } else {
            tracing::debug!(user_id = %actor.id, event_type = %event_type, resource_id = %resource_id, "Billing event sent");
        }
    }
}
