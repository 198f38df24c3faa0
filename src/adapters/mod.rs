//! Adapters - Implementations of port interfaces.
//!
//! - `auth` - Bearer token validators (JWT, mock)
//! - `cache` - Subscription check caches (in-memory, Redis)
//! - `events` - In-process event bus and the logging listener
//! - `http` - axum routes, middleware and DTOs
//! - `stripe` - Payments client (Stripe REST, mock)
//! - `users` - User stores (in-memory, PostgreSQL)

pub mod auth;
pub mod cache;
pub mod events;
pub mod http;
pub mod stripe;
pub mod users;

pub use events::{EventLogger, InMemoryEventBus};
