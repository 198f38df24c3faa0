//! Event bus adapters.
//!
//! - `InMemoryEventBus` - Synchronous, in-process dispatcher
//! - `EventLogger` - Listener that records events in the tracing log

mod in_memory;
mod logging_listener;

pub use in_memory::InMemoryEventBus;
pub use logging_listener::{EventLogger, BILLING_EVENT_TYPES};
