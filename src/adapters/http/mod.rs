//! HTTP adapters - REST API implementations.
//!
//! `api_router` assembles the full application: billing endpoints under
//! `/api/billing` behind the bearer token middleware, plus `/health`.

pub mod billing;
pub mod middleware;

pub use billing::{billing_router, BillingAppState};
pub use middleware::{auth_middleware, AuthState, CallerPrincipal};

use axum::{routing::get, Router};

/// Liveness check. Does not touch dependencies.
async fn health() -> &'static str {
    "ok"
}

/// Full router with auth applied to the API routes.
pub fn api_router(state: BillingAppState, validator: AuthState) -> Router {
    let api = Router::new()
        .nest("/api", billing_router())
        .layer(axum::middleware::from_fn_with_state(
            validator,
            auth_middleware,
        ))
        .with_state(state);

    Router::new().route("/health", get(health)).merge(api)
}
