//! Axum router configuration for billing endpoints.

use axum::{
    routing::{get, post},
    Router,
};

use super::handlers::{
    cancel_subscription, client_config, create_billing_portal, create_checkout,
    create_setup_checkout, create_setup_intent, create_subscription, detach_payment_method,
    get_invoice, get_payment_method, get_price, get_product, get_subscription, list_invoices,
    list_payment_methods, list_prices, list_products, list_subscriptions, modify_payment_method,
    modify_subscription, subscription_status, BillingAppState,
};

/// Create the billing API router.
///
/// # Routes
///
/// ## Sessions (require authentication)
/// - `POST /checkout/:price_id` - Subscription checkout, returns `sessionId`
/// - `POST /setup-checkout` - Payment method checkout, returns `sessionId`
/// - `POST /billing-portal` - Billing portal, returns `url`
/// - `POST /setup-intents` - Create a setup intent
///
/// ## Catalog (anonymous allowed)
/// - `GET /config` - Publishable key, returns `publicKey`
/// - `GET /prices`, `GET /prices/:id`
/// - `GET /products`, `GET /products/:id`
///
/// ## Customer resources (require authentication)
/// - `GET /payment-methods`
/// - `GET|PUT|DELETE /payment-methods/:id` (`DELETE /payment-methods/*` detaches all)
/// - `GET|POST /subscriptions`
/// - `GET /subscriptions/status`
/// - `GET|PUT|DELETE /subscriptions/:id`
/// - `GET /invoices`, `GET /invoices/:id`
pub fn billing_routes() -> Router<BillingAppState> {
    Router::new()
        // Sessions
        .route("/checkout/:price_id", post(create_checkout))
        .route("/setup-checkout", post(create_setup_checkout))
        .route("/billing-portal", post(create_billing_portal))
        .route("/setup-intents", post(create_setup_intent))
        // Catalog
        .route("/config", get(client_config))
        .route("/prices", get(list_prices))
        .route("/prices/:id", get(get_price))
        .route("/products", get(list_products))
        .route("/products/:id", get(get_product))
        // Payment methods
        .route("/payment-methods", get(list_payment_methods))
        .route(
            "/payment-methods/:id",
            get(get_payment_method)
                .put(modify_payment_method)
                .delete(detach_payment_method),
        )
        // Subscriptions
        .route(
            "/subscriptions",
            get(list_subscriptions).post(create_subscription),
        )
        .route("/subscriptions/status", get(subscription_status))
        .route(
            "/subscriptions/:id",
            get(get_subscription)
                .put(modify_subscription)
                .delete(cancel_subscription),
        )
        // Invoices
        .route("/invoices", get(list_invoices))
        .route("/invoices/:id", get(get_invoice))
}

/// Billing routes nested under `/billing`, ready to mount at `/api`.
pub fn billing_router() -> Router<BillingAppState> {
    Router::new().nest("/billing", billing_routes())
}
