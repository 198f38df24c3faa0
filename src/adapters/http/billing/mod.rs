//! Billing HTTP adapter.
//!
//! Exposes the billing handlers as REST-ish endpoints under `/api/billing`.

mod dto;
mod error;
mod handlers;
mod routes;

pub use dto::ErrorResponse;
pub use error::BillingApiError;
pub use handlers::BillingAppState;
pub use routes::{billing_router, billing_routes};
