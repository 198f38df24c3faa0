//! Billing errors as HTTP responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::domain::billing::{BillingError, ProviderErrorKind};

use super::dto::ErrorResponse;

/// API error type that converts billing errors to HTTP responses.
#[derive(Debug)]
pub struct BillingApiError(pub BillingError);

impl From<BillingError> for BillingApiError {
    fn from(err: BillingError) -> Self {
        Self(err)
    }
}

impl BillingApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            BillingError::Unauthenticated => StatusCode::UNAUTHORIZED,
            BillingError::WrongCustomer { .. } | BillingError::NotFound { .. } => {
                StatusCode::NOT_FOUND
            }
            BillingError::PermissionDenied(_) => StatusCode::FORBIDDEN,
            BillingError::Validation { .. } => StatusCode::BAD_REQUEST,
            BillingError::Provider {
                kind: ProviderErrorKind::Card,
                ..
            } => StatusCode::PAYMENT_REQUIRED,
            BillingError::Provider { .. }
            | BillingError::UserNotFound(_)
            | BillingError::Infrastructure(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for BillingApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(code = %self.0.code(), error = %self.0, "Billing request failed");
        }
        let body = ErrorResponse::new(self.0.code().to_string(), self.0.to_string());
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::billing::ResourceKind;
    use crate::domain::foundation::UserId;

    fn status_of(err: BillingError) -> StatusCode {
        BillingApiError(err).into_response().status()
    }

    #[test]
    fn maps_taxonomy_to_status_codes() {
        assert_eq!(status_of(BillingError::Unauthenticated), StatusCode::UNAUTHORIZED);
        assert_eq!(
            status_of(BillingError::not_found(ResourceKind::Invoice, "in_1")),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(BillingError::wrong_customer(ResourceKind::Invoice, "in_1")),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(BillingError::permission_denied("Cannot access product prod_x")),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            status_of(BillingError::validation("currency", "bad")),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(BillingError::provider(ProviderErrorKind::Card, "Your card was declined.", None)),
            StatusCode::PAYMENT_REQUIRED
        );
        assert_eq!(
            status_of(BillingError::provider(ProviderErrorKind::Api, "boom", None)),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            status_of(BillingError::UserNotFound(UserId::new("u1").unwrap())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn wrong_customer_body_matches_not_found() {
        async fn body(err: BillingError) -> serde_json::Value {
            let response = BillingApiError(err).into_response();
            let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
                .await
                .unwrap();
            serde_json::from_slice(&bytes).unwrap()
        }

        let wrong = body(BillingError::wrong_customer(ResourceKind::Subscription, "sub_1")).await;
        let missing = body(BillingError::not_found(ResourceKind::Subscription, "sub_1")).await;

        assert_eq!(wrong, missing);
        assert_eq!(wrong["code"], "NOT_FOUND");
        assert_eq!(wrong["detail"], "No such subscription: 'sub_1'");
    }
}
