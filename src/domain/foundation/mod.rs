//! Foundation module - Shared domain primitives.
//!
//! Identifiers, timestamps, error types and event plumbing used by the
//! billing domain.

mod errors;
mod events;
mod ids;
mod timestamp;

pub use errors::{DomainError, ErrorCode, ValidationError};
pub use events::{
    DomainEvent, EventEnvelope, EventId, EventMetadata, SerializableDomainEvent,
};
pub use ids::{CustomerRef, UserId};
pub use timestamp::Timestamp;
