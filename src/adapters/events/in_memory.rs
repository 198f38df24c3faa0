//! In-process event dispatcher.
//!
//! The billing gateway is handed one of these at startup. Delivery is
//! synchronous: `publish` awaits every listener for the event type in
//! registration order. A bus built with [`InMemoryEventBus::recording`]
//! also keeps every published envelope for inspection; the plain
//! [`InMemoryEventBus::new`] bus only dispatches.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use crate::domain::foundation::{DomainError, ErrorCode, EventEnvelope};
use crate::ports::{EventHandler, EventPublisher, EventSubscriber};

/// In-memory event bus.
///
/// ```ignore
/// let bus = Arc::new(InMemoryEventBus::new());
/// bus.subscribe("new_customer", Arc::new(WelcomeMailer::new()));
///
/// // In tests
/// let bus = Arc::new(InMemoryEventBus::recording());
/// assert_eq!(bus.events_of_type("new_customer").len(), 1);
/// ```
pub struct InMemoryEventBus {
    handlers: RwLock<HashMap<String, Vec<Arc<dyn EventHandler>>>>,
    record: bool,
    published: RwLock<Vec<EventEnvelope>>,
}

impl InMemoryEventBus {
    /// Dispatch-only bus. Nothing is retained after `publish` returns.
    pub fn new() -> Self {
        Self {
            handlers: RwLock::new(HashMap::new()),
            record: false,
            published: RwLock::new(Vec::new()),
        }
    }

    /// Bus that also keeps every published envelope.
    pub fn recording() -> Self {
        Self {
            record: true,
            ..Self::new()
        }
    }

    pub fn is_recording(&self) -> bool {
        self.record
    }

    // === Inspection ===

    /// Returns all published events.
    pub fn published_events(&self) -> Vec<EventEnvelope> {
        self.published
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Returns events of a specific type.
    pub fn events_of_type(&self, event_type: &str) -> Vec<EventEnvelope> {
        self.published_events()
            .into_iter()
            .filter(|e| e.event_type == event_type)
            .collect()
    }

    /// Returns events about one remote object.
    pub fn events_for_resource(&self, resource_id: &str) -> Vec<EventEnvelope> {
        self.published_events()
            .into_iter()
            .filter(|e| e.resource_id == resource_id)
            .collect()
    }

    /// Names of published events, in order.
    pub fn event_types(&self) -> Vec<String> {
        self.published
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|e| e.event_type.clone())
            .collect()
    }

    pub fn clear(&self) {
        self.published
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    pub fn event_count(&self) -> usize {
        self.published
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn has_event(&self, event_type: &str) -> bool {
        self.published
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .any(|e| e.event_type == event_type)
    }

    /// Number of listeners connected to `event_type`.
    pub fn listener_count(&self, event_type: &str) -> usize {
        self.handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(event_type)
            .map_or(0, Vec::len)
    }
}

impl Default for InMemoryEventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventPublisher for InMemoryEventBus {
    async fn publish(&self, event: EventEnvelope) -> Result<(), DomainError> {
        if self.record {
            self.published
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .push(event.clone());
        }

        // Clone handlers to release lock before await points
        let type_handlers: Vec<Arc<dyn EventHandler>> = {
            let handlers = self
                .handlers
                .read()
                .unwrap_or_else(PoisonError::into_inner);
            handlers
                .get(&event.event_type)
                .cloned()
                .unwrap_or_default()
        };

        let mut errors = Vec::new();
        for handler in type_handlers {
            if let Err(e) = handler.handle(event.clone()).await {
                errors.push(format!("{}: {}", handler.name(), e));
            }
        }

        if !errors.is_empty() {
            return Err(DomainError::new(
                ErrorCode::EventHandlerFailed,
                format!("Handler errors: {}", errors.join(", ")),
            )
            .with_detail("event_type", event.event_type));
        }

        Ok(())
    }
}

impl EventSubscriber for InMemoryEventBus {
    fn subscribe(&self, event_type: &str, handler: Arc<dyn EventHandler>) {
        let mut handlers = self
            .handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        handlers
            .entry(event_type.to_string())
            .or_default()
            .push(handler);
    }

    fn subscribe_all(&self, event_types: &[&str], handler: Arc<dyn EventHandler>) {
        let mut handlers = self
            .handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        for event_type in event_types {
            handlers
                .entry(event_type.to_string())
                .or_default()
                .push(Arc::clone(&handler));
        }
    }
}
