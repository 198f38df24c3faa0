//! HTTP handlers for billing endpoints.
//!
//! These handlers connect Axum routes to the billing application handlers.
//! Each request resolves the caller first; everything else is delegated.

use std::sync::Arc;

use axum::extract::{Json, Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;

use crate::application::handlers::billing::resource_types::{InvoiceQuery, SubscriptionQuery};
use crate::application::handlers::billing::{
    Catalog, CheckoutHandler, CustomerSync, CustomerSyncingUserStore, EventEmitter,
    InvoicesHandler, NewCustomerParams, NoExtraCustomerParams, PaymentMethodsHandler,
    ResourceGateway, SetupIntentsHandler, SubscribeRequest, SubscriptionStatusEvaluator,
    SubscriptionsHandler, UserResolver,
};
use crate::config::BillingSettings;
use crate::domain::billing::LocalUser;
use crate::ports::{CacheStore, EventPublisher, PaymentsClient, UserStore};

use super::super::middleware::CallerPrincipal;
use super::dto::{
    newest_first, split_list, CheckoutResponse, ClientConfigResponse, CreateSubscriptionRequest,
    InvoiceView, InvoicesParams, ModifyPaymentMethodRequest, ModifySubscriptionRequest,
    PaymentMethodView, PaymentMethodsParams, PortalResponse, PriceView, PricesParams, ProductView,
    ProductsParams, SetupCheckoutRequest, SetupIntentView, StatusParams, SubscriptionView,
    SubscriptionsParams,
};
use super::error::BillingApiError;

// ════════════════════════════════════════════════════════════════════════════════
// Application State
// ════════════════════════════════════════════════════════════════════════════════

/// Shared application state containing all dependencies.
///
/// Cloned for each request. Handlers are built on demand from the
/// Arc-wrapped ports.
#[derive(Clone)]
pub struct BillingAppState {
    pub payments: Arc<dyn PaymentsClient>,
    pub users: Arc<dyn UserStore>,
    pub event_publisher: Arc<dyn EventPublisher>,
    pub cache: Option<Arc<dyn CacheStore>>,
    pub settings: Arc<BillingSettings>,
    pub new_customer_params: Arc<dyn NewCustomerParams>,
}

impl BillingAppState {
    pub fn new(
        payments: Arc<dyn PaymentsClient>,
        users: Arc<dyn UserStore>,
        event_publisher: Arc<dyn EventPublisher>,
        settings: Arc<BillingSettings>,
    ) -> Self {
        Self {
            payments,
            users,
            event_publisher,
            cache: None,
            settings,
            new_customer_params: Arc::new(NoExtraCustomerParams),
        }
    }

    pub fn with_cache(mut self, cache: Arc<dyn CacheStore>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_new_customer_params(mut self, params: Arc<dyn NewCustomerParams>) -> Self {
        self.new_customer_params = params;
        self
    }

    /// Wraps the user store so that saved detail changes reach the remote
    /// customer. Call after `with_new_customer_params`; the sync captures
    /// the parameters in place at this point.
    pub fn with_customer_syncing_users(mut self) -> Self {
        let sync = self.customer_sync();
        self.users = Arc::new(CustomerSyncingUserStore::new(self.users.clone(), sync));
        self
    }

    pub fn user_resolver(&self) -> UserResolver {
        UserResolver::new(self.users.clone())
    }

    pub fn customer_sync(&self) -> CustomerSync {
        CustomerSync::new(
            self.payments.clone(),
            self.users.clone(),
            EventEmitter::new(self.event_publisher.clone()),
            self.settings.keep_customer_details_updated,
        )
        .with_extra_params(self.new_customer_params.clone())
    }

    pub fn gateway(&self) -> ResourceGateway {
        ResourceGateway::new(
            self.customer_sync(),
            EventEmitter::new(self.event_publisher.clone()),
        )
    }

    pub fn catalog(&self) -> Catalog {
        Catalog::new(self.payments.clone(), self.gateway(), self.settings.clone())
    }

    pub fn checkout_handler(&self) -> CheckoutHandler {
        CheckoutHandler::new(
            self.payments.clone(),
            self.gateway(),
            self.catalog(),
            self.settings.clone(),
        )
    }

    pub fn payment_methods_handler(&self) -> PaymentMethodsHandler {
        PaymentMethodsHandler::new(self.payments.clone(), self.gateway(), self.settings.clone())
    }

    pub fn subscriptions_handler(&self) -> SubscriptionsHandler {
        SubscriptionsHandler::new(self.payments.clone(), self.gateway(), self.catalog())
    }

    pub fn invoices_handler(&self) -> InvoicesHandler {
        InvoicesHandler::new(self.payments.clone(), self.gateway())
    }

    pub fn setup_intents_handler(&self) -> SetupIntentsHandler {
        SetupIntentsHandler::new(self.payments.clone(), self.gateway(), self.settings.clone())
    }

    pub fn status_evaluator(&self) -> SubscriptionStatusEvaluator {
        let evaluator =
            SubscriptionStatusEvaluator::new(self.payments.clone(), self.settings.clone());
        match &self.cache {
            Some(cache) => evaluator.with_cache(cache.clone()),
            None => evaluator,
        }
    }

    async fn caller(&self, principal: &CallerPrincipal) -> Result<LocalUser, BillingApiError> {
        Ok(self.user_resolver().require(&principal.0).await?)
    }

    async fn optional_caller(
        &self,
        principal: &CallerPrincipal,
    ) -> Result<Option<LocalUser>, BillingApiError> {
        Ok(self.user_resolver().resolve(&principal.0).await?)
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Checkout, portal and setup intents
// ════════════════════════════════════════════════════════════════════════════════

/// POST /checkout/:price_id - Start a subscription checkout
pub async fn create_checkout(
    State(state): State<BillingAppState>,
    principal: CallerPrincipal,
    Path(price_id): Path<String>,
) -> Result<impl IntoResponse, BillingApiError> {
    let user = state.caller(&principal).await?;
    let session = state
        .checkout_handler()
        .create_subscription_checkout(&user, &price_id)
        .await?;
    Ok(Json(CheckoutResponse {
        session_id: session.id,
    }))
}

/// POST /setup-checkout - Start a checkout that collects a payment method
pub async fn create_setup_checkout(
    State(state): State<BillingAppState>,
    principal: CallerPrincipal,
    body: Option<Json<SetupCheckoutRequest>>,
) -> Result<impl IntoResponse, BillingApiError> {
    let user = state.caller(&principal).await?;
    let request = body.map(|Json(r)| r).unwrap_or_default();
    let session = state
        .checkout_handler()
        .create_setup_checkout(&user, request.subscription_id.as_deref())
        .await?;
    Ok(Json(CheckoutResponse {
        session_id: session.id,
    }))
}

/// POST /billing-portal - Open the self-service billing portal
pub async fn create_billing_portal(
    State(state): State<BillingAppState>,
    principal: CallerPrincipal,
) -> Result<impl IntoResponse, BillingApiError> {
    let user = state.caller(&principal).await?;
    let session = state.checkout_handler().create_billing_portal(&user).await?;
    Ok(Json(PortalResponse { url: session.url }))
}

/// POST /setup-intents - Create a setup intent
pub async fn create_setup_intent(
    State(state): State<BillingAppState>,
    principal: CallerPrincipal,
) -> Result<impl IntoResponse, BillingApiError> {
    let user = state.caller(&principal).await?;
    let (_, intent) = state.setup_intents_handler().create(&user).await?;
    Ok((StatusCode::CREATED, Json(SetupIntentView::from(intent))))
}

// ════════════════════════════════════════════════════════════════════════════════
// Catalog (anonymous callers allowed)
// ════════════════════════════════════════════════════════════════════════════════

/// GET /config - Publishable key for the browser payments library
pub async fn client_config(State(state): State<BillingAppState>) -> impl IntoResponse {
    Json(ClientConfigResponse {
        public_key: state.settings.public_key.clone(),
    })
}

/// GET /prices - List active recurring prices
pub async fn list_prices(
    State(state): State<BillingAppState>,
    principal: CallerPrincipal,
    Query(params): Query<PricesParams>,
) -> Result<impl IntoResponse, BillingApiError> {
    let user = state.optional_caller(&principal).await?;
    let prices = state
        .catalog()
        .get_prices(
            user.as_ref(),
            params.product.as_deref(),
            params.currency.as_deref(),
        )
        .await?;
    let prices = newest_first(prices, |p| (p.price.created, p.price.id.as_str()));
    Ok(Json(
        prices.into_iter().map(PriceView::from).collect::<Vec<_>>(),
    ))
}

/// GET /prices/:id - Retrieve one price
pub async fn get_price(
    State(state): State<BillingAppState>,
    principal: CallerPrincipal,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, BillingApiError> {
    let user = state.optional_caller(&principal).await?;
    let price = state.catalog().retrieve_price(user.as_ref(), &id).await?;
    Ok(Json(PriceView::from(price)))
}

/// GET /products - List products with their prices
pub async fn list_products(
    State(state): State<BillingAppState>,
    principal: CallerPrincipal,
    Query(params): Query<ProductsParams>,
) -> Result<impl IntoResponse, BillingApiError> {
    let user = state.optional_caller(&principal).await?;
    let ids = split_list(params.ids.as_deref());
    let products = state.catalog().get_products(user.as_ref(), &ids).await?;
    let products = newest_first(products, |p| (p.product.created, p.product.id.as_str()));
    Ok(Json(
        products.into_iter().map(ProductView::from).collect::<Vec<_>>(),
    ))
}

/// GET /products/:id - Retrieve one product
pub async fn get_product(
    State(state): State<BillingAppState>,
    principal: CallerPrincipal,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, BillingApiError> {
    let user = state.optional_caller(&principal).await?;
    let product = state.catalog().retrieve_product(user.as_ref(), &id).await?;
    Ok(Json(ProductView::from(product)))
}

// ════════════════════════════════════════════════════════════════════════════════
// Payment methods
// ════════════════════════════════════════════════════════════════════════════════

/// GET /payment-methods - List saved payment methods
pub async fn list_payment_methods(
    State(state): State<BillingAppState>,
    principal: CallerPrincipal,
    Query(params): Query<PaymentMethodsParams>,
) -> Result<impl IntoResponse, BillingApiError> {
    let user = state.caller(&principal).await?;
    let types = split_list(params.types.as_deref());
    let methods = state
        .payment_methods_handler()
        .list(&user, Some(types.as_slice()))
        .await?;
    let methods = newest_first(methods, |m| {
        (m.payment_method.created, m.payment_method.id.as_str())
    });
    Ok(Json(
        methods
            .into_iter()
            .map(PaymentMethodView::from)
            .collect::<Vec<_>>(),
    ))
}

/// GET /payment-methods/:id - Retrieve one payment method
pub async fn get_payment_method(
    State(state): State<BillingAppState>,
    principal: CallerPrincipal,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, BillingApiError> {
    let user = state.caller(&principal).await?;
    let method = state.payment_methods_handler().retrieve(&user, &id).await?;
    Ok(Json(PaymentMethodView::from(method)))
}

/// PUT /payment-methods/:id - Modify, optionally making it the default
pub async fn modify_payment_method(
    State(state): State<BillingAppState>,
    principal: CallerPrincipal,
    Path(id): Path<String>,
    Json(request): Json<ModifyPaymentMethodRequest>,
) -> Result<impl IntoResponse, BillingApiError> {
    let user = state.caller(&principal).await?;
    let method = state
        .payment_methods_handler()
        .modify(&user, &id, request.set_as_default, &request.changes())
        .await?;
    Ok(Json(PaymentMethodView::from(method)))
}

/// DELETE /payment-methods/:id - Detach one method, or all with `*`
pub async fn detach_payment_method(
    State(state): State<BillingAppState>,
    principal: CallerPrincipal,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, BillingApiError> {
    let user = state.caller(&principal).await?;
    state.payment_methods_handler().detach(&user, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ════════════════════════════════════════════════════════════════════════════════
// Subscriptions
// ════════════════════════════════════════════════════════════════════════════════

/// GET /subscriptions - List the caller's subscriptions
pub async fn list_subscriptions(
    State(state): State<BillingAppState>,
    principal: CallerPrincipal,
    Query(params): Query<SubscriptionsParams>,
) -> Result<impl IntoResponse, BillingApiError> {
    let user = state.caller(&principal).await?;
    let query = SubscriptionQuery {
        price: params.price,
        status: params.status,
    };
    let subscriptions = state.subscriptions_handler().list(&user, &query).await?;
    let subscriptions = newest_first(subscriptions, |s| (s.created, s.id.as_str()));
    Ok(Json(
        subscriptions
            .into_iter()
            .map(SubscriptionView::from)
            .collect::<Vec<_>>(),
    ))
}

/// POST /subscriptions - Subscribe to a price
pub async fn create_subscription(
    State(state): State<BillingAppState>,
    principal: CallerPrincipal,
    Json(request): Json<CreateSubscriptionRequest>,
) -> Result<impl IntoResponse, BillingApiError> {
    let user = state.caller(&principal).await?;
    let request = SubscribeRequest {
        price_id: request.price_id,
        default_payment_method: request.default_payment_method,
        set_as_default_payment_method: request.set_as_default_payment_method,
    };
    let (_, subscription) = state.subscriptions_handler().create(&user, &request).await?;
    Ok((StatusCode::CREATED, Json(SubscriptionView::from(subscription))))
}

/// GET /subscriptions/:id - Retrieve one subscription
pub async fn get_subscription(
    State(state): State<BillingAppState>,
    principal: CallerPrincipal,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, BillingApiError> {
    let user = state.caller(&principal).await?;
    let subscription = state.subscriptions_handler().retrieve(&user, &id).await?;
    Ok(Json(SubscriptionView::from(subscription)))
}

/// PUT /subscriptions/:id - Change plan or payment method
pub async fn modify_subscription(
    State(state): State<BillingAppState>,
    principal: CallerPrincipal,
    Path(id): Path<String>,
    Json(request): Json<ModifySubscriptionRequest>,
) -> Result<impl IntoResponse, BillingApiError> {
    let user = state.caller(&principal).await?;
    let subscription = state
        .subscriptions_handler()
        .modify(
            &user,
            &id,
            &request.changes(),
            request.set_as_default_payment_method,
        )
        .await?;
    Ok(Json(SubscriptionView::from(subscription)))
}

/// DELETE /subscriptions/:id - Cancel immediately
pub async fn cancel_subscription(
    State(state): State<BillingAppState>,
    principal: CallerPrincipal,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, BillingApiError> {
    let user = state.caller(&principal).await?;
    state.subscriptions_handler().cancel(&user, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /subscriptions/status - Subscription status for a product
pub async fn subscription_status(
    State(state): State<BillingAppState>,
    principal: CallerPrincipal,
    Query(params): Query<StatusParams>,
) -> Result<impl IntoResponse, BillingApiError> {
    let user = state.caller(&principal).await?;
    let status = state
        .status_evaluator()
        .evaluate(&user, params.product_id.as_deref())
        .await?;
    Ok(Json(status))
}

// ════════════════════════════════════════════════════════════════════════════════
// Invoices
// ════════════════════════════════════════════════════════════════════════════════

/// GET /invoices - List the caller's invoices
pub async fn list_invoices(
    State(state): State<BillingAppState>,
    principal: CallerPrincipal,
    Query(params): Query<InvoicesParams>,
) -> Result<impl IntoResponse, BillingApiError> {
    let user = state.caller(&principal).await?;
    let query = InvoiceQuery {
        subscription: params.subscription,
        status: params.status,
    };
    let invoices = state.invoices_handler().list(&user, &query).await?;
    let invoices = newest_first(invoices, |i| (i.created, i.id.as_str()));
    Ok(Json(
        invoices.into_iter().map(InvoiceView::from).collect::<Vec<_>>(),
    ))
}

/// GET /invoices/:id - Retrieve one invoice
pub async fn get_invoice(
    State(state): State<BillingAppState>,
    principal: CallerPrincipal,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, BillingApiError> {
    let user = state.caller(&principal).await?;
    let invoice = state.invoices_handler().retrieve(&user, &id).await?;
    Ok(Json(InvoiceView::from(invoice)))
}
