//! Integration tests for the billing HTTP API.
//!
//! Requests go through the full router built by `api_router`: bearer token
//! middleware, principal extraction, handlers and error mapping. The
//! payments provider is `MockPaymentsClient`.

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

use billing_gate::adapters::auth::MockSessionValidator;
use billing_gate::adapters::events::InMemoryEventBus;
use billing_gate::adapters::http::{api_router, BillingAppState};
use billing_gate::adapters::stripe::MockPaymentsClient;
use billing_gate::adapters::users::InMemoryUserStore;
use billing_gate::config::BillingSettings;
use billing_gate::domain::billing::{
    Customer, InvoiceSettings, List, LocalUser, PaymentMethod, Price, Product, Recurring,
    Subscription, SubscriptionItem, SubscriptionState, UserField,
};
use billing_gate::domain::foundation::{CustomerRef, UserId};
use billing_gate::ports::UserStore;

// =============================================================================
// Test Infrastructure
// =============================================================================

const PRODUCT: &str = "prod_pro";
const ADA_TOKEN: &str = "token-ada";
const BOB_TOKEN: &str = "token-bob";

fn settings() -> BillingSettings {
    BillingSettings {
        checkout_success_url: "https://app.example.com/billing/success".to_string(),
        checkout_cancel_url: "https://app.example.com/billing/cancel".to_string(),
        billing_portal_return_url: Some("https://app.example.com/account".to_string()),
        public_key: Some("pk_test_browser".to_string()),
        default_subscription_product_id: PRODUCT.to_string(),
        ..Default::default()
    }
}

fn price(id: &str, product: &str, created: i64) -> Price {
    Price {
        id: id.to_string(),
        product: product.to_string(),
        active: true,
        currency: "usd".to_string(),
        unit_amount: Some(900),
        unit_amount_decimal: Some("900".to_string()),
        nickname: Some("Monthly".to_string()),
        recurring: Some(Recurring {
            interval: "month".to_string(),
            interval_count: 1,
            usage_type: None,
        }),
        price_type: "recurring".to_string(),
        metadata: Default::default(),
        created,
    }
}

fn card(id: &str, customer: &str, created: i64) -> PaymentMethod {
    PaymentMethod {
        id: id.to_string(),
        method_type: "card".to_string(),
        billing_details: json!({ "name": "Ada Lovelace" }),
        card: Some(json!({ "brand": "visa", "last4": "4242" })),
        customer: Some(customer.to_string()),
        created,
    }
}

/// Ada has customer `cus_ada` with two cards and one subscription.
/// Bob is signed in but has never bought anything.
struct TestApp {
    router: Router,
    state: BillingAppState,
    payments: Arc<MockPaymentsClient>,
    users: Arc<InMemoryUserStore>,
    bus: Arc<InMemoryEventBus>,
}

impl TestApp {
    async fn new() -> Self {
        let ada = LocalUser::new(UserId::new("ada").unwrap(), "ada@example.com", "Ada", "Lovelace")
            .with_customer_ref(CustomerRef::new("cus_ada").unwrap());
        let bob = LocalUser::new(UserId::new("bob").unwrap(), "bob@example.com", "Bob", "Byte");

        let payments = Arc::new(MockPaymentsClient::new());
        payments.add_customer(Customer {
            id: "cus_ada".to_string(),
            email: Some("ada@example.com".to_string()),
            description: Some("Ada Lovelace".to_string()),
            invoice_settings: InvoiceSettings {
                default_payment_method: Some("pm_new".to_string()),
            },
            metadata: Default::default(),
            created: 1_700_000_000,
        });
        payments.add_payment_method(card("pm_old", "cus_ada", 1_700_000_100));
        payments.add_payment_method(card("pm_new", "cus_ada", 1_700_000_200));
        payments.add_product(Product {
            id: PRODUCT.to_string(),
            name: "Pro".to_string(),
            active: true,
            images: Vec::new(),
            metadata: Default::default(),
            shippable: None,
            product_type: Some("service".to_string()),
            unit_label: None,
            url: None,
            created: 1_700_000_000,
        });
        payments.add_price(price("price_pro", PRODUCT, 1_700_000_000));
        payments.add_subscription(Subscription {
            id: "sub_ada".to_string(),
            customer: "cus_ada".to_string(),
            status: SubscriptionState::Active,
            cancel_at: None,
            current_period_end: Some(1_900_000_000),
            current_period_start: Some(1_700_000_000),
            days_until_due: None,
            default_payment_method: Some("pm_new".to_string()),
            latest_invoice: None,
            start_date: Some(1_700_000_000),
            trial_end: None,
            trial_start: None,
            items: List::new(vec![SubscriptionItem {
                id: "si_ada".to_string(),
                price: price("price_pro", PRODUCT, 1_700_000_000),
            }]),
            created: 1_700_000_000,
        });

        let users = Arc::new(InMemoryUserStore::with_users(vec![ada, bob]).await);
        let bus = Arc::new(InMemoryEventBus::recording());
        let validator = Arc::new(
            MockSessionValidator::new()
                .with_token(ADA_TOKEN, "ada")
                .with_token(BOB_TOKEN, "bob"),
        );

        // Same wiring as the binary
        let state = BillingAppState::new(
            payments.clone(),
            users.clone(),
            bus.clone(),
            Arc::new(settings()),
        )
        .with_customer_syncing_users();

        Self {
            router: api_router(state.clone(), validator),
            state,
            payments,
            users,
            bus,
        }
    }

    async fn send(&self, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&bytes).into_owned())
            })
        };
        (status, json)
    }
}

// =============================================================================
// Health and authentication
// =============================================================================

#[tokio::test]
async fn health_needs_no_token() {
    let app = TestApp::new().await;

    let (status, body) = app.send(Method::GET, "/health", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, Value::String("ok".to_string()));
}

#[tokio::test]
async fn saves_through_app_state_reach_the_remote_customer() {
    let app = TestApp::new().await;
    let mut ada = app.users.get_by_id(&UserId::new("ada").unwrap()).await.unwrap();
    ada.email = "ada@analytical.engine".to_string();

    app.state.users.save(&ada, Some(&[UserField::Email])).await.unwrap();

    assert_eq!(
        app.payments.customer("cus_ada").unwrap().email.as_deref(),
        Some("ada@analytical.engine")
    );
    assert_eq!(app.users.get_by_id(&ada.id).await.unwrap().email, "ada@analytical.engine");
    assert_eq!(app.bus.events_of_type("customer_modified").len(), 1);
}

#[tokio::test]
async fn customer_endpoints_reject_anonymous_callers() {
    let app = TestApp::new().await;

    for uri in [
        "/api/billing/payment-methods",
        "/api/billing/subscriptions",
        "/api/billing/invoices",
        "/api/billing/subscriptions/status",
    ] {
        let (status, body) = app.send(Method::GET, uri, None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{}", uri);
        assert_eq!(body["code"], "UNAUTHENTICATED");
    }
    assert_eq!(app.payments.total_calls(), 0);
}

#[tokio::test]
async fn unknown_token_is_rejected_by_middleware() {
    let app = TestApp::new().await;

    let (status, body) = app
        .send(Method::GET, "/api/billing/prices", Some("forged"), None)
        .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "AUTH_ERROR");
}

// =============================================================================
// Catalog
// =============================================================================

#[tokio::test]
async fn config_exposes_the_publishable_key_without_a_token() {
    let app = TestApp::new().await;

    let (status, body) = app.send(Method::GET, "/api/billing/config", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "publicKey": "pk_test_browser" }));
    assert_eq!(app.payments.total_calls(), 0);
}

#[tokio::test]
async fn anonymous_callers_can_browse_prices() {
    let app = TestApp::new().await;

    let (status, body) = app.send(Method::GET, "/api/billing/prices", None, None).await;

    assert_eq!(status, StatusCode::OK);
    let prices = body.as_array().unwrap();
    assert_eq!(prices.len(), 1);
    assert_eq!(prices[0]["id"], "price_pro");
    assert_eq!(prices[0]["subscription_info"]["subscribed"], false);
}

#[tokio::test]
async fn subscriber_sees_subscription_info_on_prices() {
    let app = TestApp::new().await;

    let (status, body) = app
        .send(Method::GET, "/api/billing/prices/price_pro", Some(ADA_TOKEN), None)
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["subscription_info"]["subscribed"], true);
    assert_eq!(body["product"], PRODUCT);
}

#[tokio::test]
async fn unknown_price_is_not_found() {
    let app = TestApp::new().await;

    let (status, body) = app
        .send(Method::GET, "/api/billing/prices/price_nope", None, None)
        .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");
}

// =============================================================================
// Payment methods
// =============================================================================

#[tokio::test]
async fn payment_methods_are_listed_newest_first_with_default_flag() {
    let app = TestApp::new().await;

    let (status, body) = app
        .send(Method::GET, "/api/billing/payment-methods", Some(ADA_TOKEN), None)
        .await;

    assert_eq!(status, StatusCode::OK);
    let methods = body.as_array().unwrap();
    assert_eq!(methods.len(), 2);
    assert_eq!(methods[0]["id"], "pm_new");
    assert_eq!(methods[0]["default"], true);
    assert_eq!(methods[1]["id"], "pm_old");
    assert_eq!(methods[1]["default"], false);
    assert!(methods[0].get("customer").is_none());
}

#[tokio::test]
async fn foreign_payment_method_is_not_found() {
    let app = TestApp::new().await;
    app.payments
        .add_payment_method(card("pm_carol", "cus_carol", 1_700_000_000));

    let (get_status, get_body) = app
        .send(Method::GET, "/api/billing/payment-methods/pm_carol", Some(ADA_TOKEN), None)
        .await;
    let (missing_status, missing_body) = app
        .send(Method::GET, "/api/billing/payment-methods/pm_ghost", Some(ADA_TOKEN), None)
        .await;

    assert_eq!(get_status, StatusCode::NOT_FOUND);
    assert_eq!(missing_status, StatusCode::NOT_FOUND);
    assert_eq!(get_body["detail"], "No such payment method: 'pm_carol'");
    assert_eq!(missing_body["detail"], "No such payment method: 'pm_ghost'");
    assert_eq!(get_body["code"], missing_body["code"]);
}

#[tokio::test]
async fn delete_star_detaches_all_methods() {
    let app = TestApp::new().await;

    let (status, _) = app
        .send(Method::DELETE, "/api/billing/payment-methods/*", Some(ADA_TOKEN), None)
        .await;

    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(app.payments.payment_method("pm_old").unwrap().customer.is_none());
    assert!(app.payments.payment_method("pm_new").unwrap().customer.is_none());
    assert!(app.bus.has_event("payment_method_detached"));
}

// =============================================================================
// Subscriptions
// =============================================================================

#[tokio::test]
async fn subscription_create_creates_customer_and_returns_201() {
    let app = TestApp::new().await;

    let (status, body) = app
        .send(
            Method::POST,
            "/api/billing/subscriptions",
            Some(BOB_TOKEN),
            Some(json!({ "price_id": "price_pro", "default_payment_method": "pm_bob" })),
        )
        .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["status"], "active");
    assert_eq!(body["default_payment_method"], "pm_bob");
    assert!(body.get("customer").is_none());

    let bob = app.users.get_by_id(&UserId::new("bob").unwrap()).await.unwrap();
    assert!(bob.customer_ref.is_some());
    assert_eq!(app.bus.events_of_type("new_customer").len(), 1);
    assert_eq!(app.bus.events_of_type("subscription_created").len(), 1);
}

#[tokio::test]
async fn set_as_default_without_method_is_bad_request() {
    let app = TestApp::new().await;

    let (status, body) = app
        .send(
            Method::POST,
            "/api/billing/subscriptions",
            Some(BOB_TOKEN),
            Some(json!({ "price_id": "price_pro", "set_as_default_payment_method": true })),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["detail"],
        "The default_payment_method field must be set if set_as_default_payment_method is True."
    );
    assert_eq!(app.payments.total_calls(), 0);
}

#[tokio::test]
async fn other_users_cannot_cancel_a_subscription() {
    let app = TestApp::new().await;
    app.payments.add_customer(Customer {
        id: "cus_bob".to_string(),
        email: Some("bob@example.com".to_string()),
        description: None,
        invoice_settings: InvoiceSettings::default(),
        metadata: Default::default(),
        created: 1_700_000_000,
    });
    let bob = app
        .users
        .get_by_id(&UserId::new("bob").unwrap())
        .await
        .unwrap()
        .with_customer_ref(CustomerRef::new("cus_bob").unwrap());
    app.users.save(&bob, None).await.unwrap();

    let (status, _) = app
        .send(Method::DELETE, "/api/billing/subscriptions/sub_ada", Some(BOB_TOKEN), None)
        .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(
        app.payments.subscription("sub_ada").unwrap().status,
        SubscriptionState::Active
    );
}

#[tokio::test]
async fn owner_cancels_subscription() {
    let app = TestApp::new().await;

    let (status, _) = app
        .send(Method::DELETE, "/api/billing/subscriptions/sub_ada", Some(ADA_TOKEN), None)
        .await;

    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(
        app.payments.subscription("sub_ada").unwrap().status,
        SubscriptionState::Canceled
    );
    assert!(app.bus.has_event("subscription_cancelled"));
}

#[tokio::test]
async fn status_reports_active_subscription() {
    let app = TestApp::new().await;

    let (status, body) = app
        .send(Method::GET, "/api/billing/subscriptions/status", Some(ADA_TOKEN), None)
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["subscribed"], true);
    assert_eq!(body["sub_id"], "sub_ada");
    assert_eq!(body["product_id"], PRODUCT);
    assert_eq!(body["evaluation"], false);
}

// =============================================================================
// Sessions
// =============================================================================

#[tokio::test]
async fn checkout_returns_session_id() {
    let app = TestApp::new().await;

    let (status, body) = app
        .send(Method::POST, "/api/billing/checkout/price_pro", Some(BOB_TOKEN), None)
        .await;

    assert_eq!(status, StatusCode::OK);
    assert!(body["sessionId"].as_str().unwrap().starts_with("cs_"));
    assert!(app.bus.has_event("new_customer"));
    assert!(app.bus.has_event("checkout_created"));
}

#[tokio::test]
async fn billing_portal_returns_url() {
    let app = TestApp::new().await;

    let (status, body) = app
        .send(Method::POST, "/api/billing/billing-portal", Some(ADA_TOKEN), None)
        .await;

    assert_eq!(status, StatusCode::OK);
    assert!(body["url"].as_str().unwrap().starts_with("https://"));
    assert!(app.bus.has_event("billing_portal_created"));
}
