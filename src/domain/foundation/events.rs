//! Event infrastructure for in-process domain event dispatch.
//!
//! - `EventId` - Unique identifier for an emitted event
//! - `EventMetadata` - Audit and correlation context
//! - `EventEnvelope` - Transport wrapper handed to listeners
//! - `DomainEvent` - Trait implemented by typed events

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;
use uuid::Uuid;

use super::Timestamp;

/// Trait that typed domain events implement.
///
/// Listeners subscribe by `event_type`, so the name is part of the
/// public contract and must stay stable.
pub trait DomainEvent: Send + Sync {
    /// Routing name (e.g. "new_customer").
    fn event_type(&self) -> &'static str;

    /// Kind of remote object the event is about (e.g. "customer").
    fn resource_kind(&self) -> &'static str;

    /// Identifier of that object; aggregate events may join several ids.
    fn resource_id(&self) -> String;
}

/// Extension trait providing `to_envelope()` for serializable events.
pub trait SerializableDomainEvent: DomainEvent + Serialize {
    /// Serializes the event into an envelope for dispatch.
    fn to_envelope(&self) -> Result<EventEnvelope, serde_json::Error> {
        Ok(EventEnvelope::new(
            self.event_type(),
            self.resource_id(),
            self.resource_kind(),
            serde_json::to_value(self)?,
        ))
    }
}

impl<T: DomainEvent + Serialize> SerializableDomainEvent for T {}

/// Unique identifier for events.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(String);

impl EventId {
    /// Creates a new random EventId using UUID v4.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Audit and correlation context carried alongside the payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventMetadata {
    /// Local user whose action produced the event.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,

    /// Links events raised while serving the same request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
}

/// Transport envelope for domain events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub event_id: EventId,

    /// Routing name, e.g. "subscription_created".
    pub event_type: String,

    /// Provider id of the object concerned.
    pub resource_id: String,

    /// Kind of object, e.g. "subscription".
    pub resource_kind: String,

    pub occurred_at: Timestamp,

    /// Event-specific payload as JSON.
    pub payload: JsonValue,

    pub metadata: EventMetadata,
}

impl EventEnvelope {
    pub fn new(
        event_type: impl Into<String>,
        resource_id: impl Into<String>,
        resource_kind: impl Into<String>,
        payload: JsonValue,
    ) -> Self {
        Self {
            event_id: EventId::new(),
            event_type: event_type.into(),
            resource_id: resource_id.into(),
            resource_kind: resource_kind.into(),
            occurred_at: Timestamp::now(),
            payload,
            metadata: EventMetadata::default(),
        }
    }

    /// Add user ID for audit.
    pub fn with_user_id(mut self, id: impl Into<String>) -> Self {
        self.metadata.user_id = Some(id.into());
        self
    }

    /// Add correlation ID for request tracing.
    pub fn with_correlation_id(mut self, id: impl Into<String>) -> Self {
        self.metadata.correlation_id = Some(id.into());
        self
    }

    /// Deserialize the payload back into its typed form.
    pub fn payload_as<T: for<'de> Deserialize<'de>>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.payload.clone())
    }
}

#[cfg(test)]
impl EventEnvelope {
    /// Creates a test fixture EventEnvelope for use in tests.
    pub fn test_fixture(event_type: &str) -> Self {
        Self::new(
            event_type,
            "obj_123",
            "test_object",
            serde_json::json!({"test": "data"}),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Pinged {
        target: String,
    }

    impl DomainEvent for Pinged {
        fn event_type(&self) -> &'static str {
            "pinged"
        }

        fn resource_kind(&self) -> &'static str {
            "target"
        }

        fn resource_id(&self) -> String {
            self.target.clone()
        }
    }

    #[test]
    fn event_ids_are_unique() {
        assert_ne!(EventId::new(), EventId::new());
    }

    #[test]
    fn to_envelope_copies_routing_fields() {
        let event = Pinged {
            target: "t_1".to_string(),
        };
        let envelope = event.to_envelope().unwrap();

        assert_eq!(envelope.event_type, "pinged");
        assert_eq!(envelope.resource_id, "t_1");
        assert_eq!(envelope.resource_kind, "target");
        assert_eq!(envelope.payload, json!({"target": "t_1"}));
        assert_eq!(envelope.payload_as::<Pinged>().unwrap(), event);
    }

    #[test]
    fn metadata_builders_set_fields() {
        let envelope = EventEnvelope::test_fixture("pinged")
            .with_user_id("user-1")
            .with_correlation_id("req-9");

        assert_eq!(envelope.metadata.user_id.as_deref(), Some("user-1"));
        assert_eq!(envelope.metadata.correlation_id.as_deref(), Some("req-9"));
    }

    #[test]
    fn empty_metadata_is_omitted_from_json() {
        let envelope = EventEnvelope::test_fixture("pinged");
        let value = serde_json::to_value(&envelope.metadata).unwrap();
        assert_eq!(value, json!({}));
    }
}
