//! Billing Gate server.
//!
//! Wires configuration, the Stripe client, the user store, the
//! subscription cache and the event bus into the axum router.

use std::sync::Arc;

use axum::http::HeaderValue;
use sqlx::postgres::PgPoolOptions;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use billing_gate::adapters::auth::JwtSessionValidator;
use billing_gate::adapters::cache::{InMemoryCacheStore, RedisCacheStore};
use billing_gate::adapters::events::{EventLogger, InMemoryEventBus, BILLING_EVENT_TYPES};
use billing_gate::adapters::http::{api_router, AuthState, BillingAppState};
use billing_gate::adapters::stripe::{StripeClient, StripeConfig};
use billing_gate::adapters::users::{InMemoryUserStore, PostgresUserStore};
use billing_gate::config::{AppConfig, ServerConfig};
use billing_gate::ports::{CacheStore, EventSubscriber, UserStore};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

fn init_tracing(config: &AppConfig) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| config.server.log_level.clone().into());
    let json = config.is_production();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(json.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json).then(|| tracing_subscriber::fmt::layer()))
        .init();
}

async fn user_store(config: &AppConfig) -> Result<Arc<dyn UserStore>, BoxError> {
    let Some(database) = &config.database else {
        tracing::warn!("No database configured, users are kept in memory");
        return Ok(Arc::new(InMemoryUserStore::new()));
    };

    let pool = PgPoolOptions::new()
        .max_connections(database.max_connections)
        .acquire_timeout(database.acquire_timeout())
        .connect(&database.url)
        .await?;
    let store = PostgresUserStore::new(pool);
    if database.run_migrations {
        store.migrate().await?;
        tracing::info!("User store migrations applied");
    }
    Ok(Arc::new(store))
}

async fn cache_store(config: &AppConfig) -> Result<Arc<dyn CacheStore>, BoxError> {
    let name = config.billing.subscription_cache_name.clone();
    match &config.redis {
        Some(redis) => {
            let cache = RedisCacheStore::connect(&redis.url, name).await?;
            tracing::info!("Subscription cache connected to Redis");
            Ok(Arc::new(cache))
        }
        None => Ok(Arc::new(InMemoryCacheStore::new(name))),
    }
}

fn cors_layer(server: &ServerConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = server
        .allowed_origins()
        .into_iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %o, "Ignoring unusable CORS origin");
                None
            }
        })
        .collect();
    if origins.is_empty() {
        CorsLayer::new()
    } else {
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods(Any)
            .allow_headers(Any)
    }
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let config = AppConfig::load_validated()?;
    init_tracing(&config);

    let payments = Arc::new(StripeClient::new(StripeConfig::from_settings(&config.stripe))?);
    if config.stripe.is_test_mode() {
        tracing::info!("Stripe client running in test mode");
    }

    let users = user_store(&config).await?;
    let cache = cache_store(&config).await?;

    let bus = Arc::new(InMemoryEventBus::new());
    bus.subscribe_all(&BILLING_EVENT_TYPES, Arc::new(EventLogger));

    let validator: AuthState = Arc::new(JwtSessionValidator::from_config(&config.auth));
    let state = BillingAppState::new(payments, users, bus, Arc::new(config.billing.clone()))
        .with_cache(cache)
        .with_customer_syncing_users();
    if config.billing.keep_customer_details_updated {
        tracing::info!("User detail changes are mirrored to the remote customer");
    }

    let app = api_router(state, validator)
        .layer(TimeoutLayer::new(config.server.request_timeout()))
        .layer(cors_layer(&config.server))
        .layer(TraceLayer::new_for_http());

    let addr = config.server.socket_addr();
    tracing::info!("billing-gate listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}
