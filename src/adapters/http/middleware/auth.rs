//! Authentication middleware and extractors for axum.
//!
//! - `auth_middleware` - Validates Bearer tokens and injects the caller's
//!   `Principal` into request extensions
//! - `CallerPrincipal` - Extractor that reads it back, anonymous by default
//!
//! ```text
//! Request → auth_middleware → injects Principal::Token into extensions
//!                                      ↓
//!                      Handler → CallerPrincipal → UserResolver
//! ```
//!
//! The middleware only proves identity. Whether an anonymous caller may
//! use an endpoint is decided by the billing handlers, which answer 401
//! through the normal error mapping.
//!
//! # Example
//!
//! ```ignore
//! let validator: Arc<dyn SessionValidator> = Arc::new(MockSessionValidator::new());
//!
//! let app = Router::new()
//!     .route("/api/billing/prices", get(list_prices))
//!     .layer(middleware::from_fn_with_state(validator, auth_middleware));
//! ```

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};

use crate::domain::billing::Principal;
use crate::ports::{AuthError, SessionValidator};

use crate::adapters::http::billing::ErrorResponse;

/// Auth middleware state - wraps the session validator.
pub type AuthState = Arc<dyn SessionValidator>;

/// Authentication middleware that validates Bearer tokens.
///
/// A missing `Authorization` header passes through as anonymous. A token
/// that fails validation is answered with 401 straight away.
pub async fn auth_middleware(
    State(validator): State<AuthState>,
    mut request: Request,
    next: Next,
) -> Response {
    let token = request
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "));

    let Some(token) = token else {
        return next.run(request).await;
    };

    match validator.validate(token).await {
        Ok(principal) => {
            request
                .extensions_mut()
                .insert(Principal::Token(principal));
            next.run(request).await
        }
        Err(e) => {
            let (status, detail) = match &e {
                AuthError::TokenExpired => (StatusCode::UNAUTHORIZED, "Token expired"),
                AuthError::InvalidToken => (StatusCode::UNAUTHORIZED, "Invalid token"),
                AuthError::ServiceUnavailable(msg) => {
                    tracing::error!("Auth service unavailable: {}", msg);
                    (
                        StatusCode::SERVICE_UNAVAILABLE,
                        "Authentication service unavailable",
                    )
                }
            };
            (status, Json(ErrorResponse::new("AUTH_ERROR", detail))).into_response()
        }
    }
}

/// Extractor for whoever is calling; `Principal::Anonymous` without a token.
#[derive(Debug, Clone)]
pub struct CallerPrincipal(pub Principal);

impl<S> axum::extract::FromRequestParts<S> for CallerPrincipal
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    fn from_request_parts<'life0, 'life1, 'async_trait>(
        parts: &'life0 mut axum::http::request::Parts,
        _state: &'life1 S,
    ) -> std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self, Self::Rejection>> + Send + 'async_trait>,
    >
    where
        'life0: 'async_trait,
        'life1: 'async_trait,
        Self: 'async_trait,
    {
        Box::pin(async move {
            let principal = parts
                .extensions
                .get::<Principal>()
                .cloned()
                .unwrap_or_default();
            Ok(CallerPrincipal(principal))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::auth::MockSessionValidator;
    use axum::body::Body;
    use axum::extract::FromRequestParts;
    use axum::http::Request as HttpRequest;
    use axum::middleware;
    use axum::routing::get;
    use axum::Router;
    use tower::ServiceExt;

    async fn whoami(CallerPrincipal(principal): CallerPrincipal) -> String {
        match principal {
            Principal::Token(t) => t.user_id.to_string(),
            Principal::User(u) => u.id.to_string(),
            Principal::Anonymous => "anonymous".to_string(),
        }
    }

    fn app(validator: MockSessionValidator) -> Router {
        let validator: AuthState = Arc::new(validator);
        Router::new()
            .route("/whoami", get(whoami))
            .layer(middleware::from_fn_with_state(validator, auth_middleware))
    }

    async fn body_text(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Middleware
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn valid_token_injects_principal() {
        let response = app(MockSessionValidator::new().with_token("good", "user-123"))
            .oneshot(
                HttpRequest::builder()
                    .uri("/whoami")
                    .header("Authorization", "Bearer good")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "user-123");
    }

    #[tokio::test]
    async fn missing_header_is_anonymous() {
        let response = app(MockSessionValidator::new())
            .oneshot(HttpRequest::builder().uri("/whoami").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "anonymous");
    }

    #[tokio::test]
    async fn invalid_token_is_rejected() {
        let response = app(MockSessionValidator::new())
            .oneshot(
                HttpRequest::builder()
                    .uri("/whoami")
                    .header("Authorization", "Bearer forged")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(body_text(response).await.contains("Invalid token"));
    }

    #[tokio::test]
    async fn validator_outage_is_503() {
        let validator =
            MockSessionValidator::new().with_error(AuthError::service_unavailable("jwks down"));
        let response = app(validator)
            .oneshot(
                HttpRequest::builder()
                    .uri("/whoami")
                    .header("Authorization", "Bearer any")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Extractor
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn extractor_defaults_to_anonymous() {
        let request: HttpRequest<()> = HttpRequest::builder().uri("/test").body(()).unwrap();
        let (mut parts, _body) = request.into_parts();

        let CallerPrincipal(principal) = CallerPrincipal::from_request_parts(&mut parts, &())
            .await
            .unwrap();

        assert!(principal.is_anonymous());
    }

    #[test]
    fn bearer_token_extraction() {
        assert_eq!("Bearer tok".strip_prefix("Bearer "), Some("tok"));
        assert_eq!("Basic dXNlcjpwYXNz".strip_prefix("Bearer "), None);
    }
}
