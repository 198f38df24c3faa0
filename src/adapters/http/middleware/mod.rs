//! HTTP middleware for axum.
//!
//! - `auth` - Bearer token middleware and the caller extractor

pub mod auth;

pub use auth::{auth_middleware, AuthState, CallerPrincipal};
