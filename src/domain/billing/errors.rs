//! Billing error taxonomy.
//!
//! # HTTP Status Mapping
//!
//! | Error | HTTP Status |
//! |-------|-------------|
//! | Unauthenticated | 401 |
//! | WrongCustomer | 404 |
//! | NotFound | 404 |
//! | PermissionDenied | 403 |
//! | Validation | 400 |
//! | Provider (card) | 402 |
//! | Provider (other) | 500 |
//! | UserNotFound | 500 |
//! | Infrastructure | 500 |
//!
//! `WrongCustomer` and `NotFound` render the same text so callers cannot
//! tell other customers' object ids apart from missing ones.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::foundation::{DomainError, ErrorCode, UserId, ValidationError};

use super::ResourceKind;

/// Classification of a payments provider failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderErrorKind {
    /// Bad parameters, e.g. an unknown currency.
    InvalidRequest,
    /// The named object does not exist.
    ResourceMissing,
    /// The card was declined or could not be charged.
    Card,
    /// The API key was rejected.
    Authentication,
    RateLimit,
    /// Provider-side failure.
    Api,
    /// The request never got a response.
    Network,
    /// The response body could not be decoded.
    Decode,
}

/// Errors surfaced by billing operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BillingError {
    #[error("Authentication credentials were not provided.")]
    Unauthenticated,

    /// The object exists but belongs to another customer.
    #[error("No such {kind}: '{id}'")]
    WrongCustomer { kind: ResourceKind, id: String },

    #[error("No such {kind}: '{id}'")]
    NotFound { kind: ResourceKind, id: String },

    #[error("{0}")]
    PermissionDenied(String),

    /// Provider failure with the request id prefix already removed.
    #[error("{message}")]
    Provider {
        message: String,
        request_id: Option<String>,
        kind: ProviderErrorKind,
    },

    #[error("{message}")]
    Validation { field: String, message: String },

    #[error("User {0} not found")]
    UserNotFound(UserId),

    #[error("{0}")]
    Infrastructure(String),
}

impl BillingError {
    pub fn wrong_customer(kind: ResourceKind, id: impl Into<String>) -> Self {
        BillingError::WrongCustomer {
            kind,
            id: id.into(),
        }
    }

    pub fn not_found(kind: ResourceKind, id: impl Into<String>) -> Self {
        BillingError::NotFound {
            kind,
            id: id.into(),
        }
    }

    pub fn permission_denied(message: impl Into<String>) -> Self {
        BillingError::PermissionDenied(message.into())
    }

    /// Builds a provider error, splitting off any request id prefix.
    pub fn provider(kind: ProviderErrorKind, raw_message: &str, request_id: Option<String>) -> Self {
        let (prefix_id, message) = strip_request_id(raw_message);
        BillingError::Provider {
            message: message.to_string(),
            request_id: request_id.or_else(|| prefix_id.map(str::to_string)),
            kind,
        }
    }

    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        BillingError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn infrastructure(message: impl Into<String>) -> Self {
        BillingError::Infrastructure(message.into())
    }

    /// Whether this is the "no such object" shape, whatever the real cause.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            BillingError::WrongCustomer { .. } | BillingError::NotFound { .. }
        )
    }

    /// Returns the error code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            BillingError::Unauthenticated => ErrorCode::Unauthenticated,
            BillingError::WrongCustomer { .. } | BillingError::NotFound { .. } => {
                ErrorCode::NotFound
            }
            BillingError::PermissionDenied(_) => ErrorCode::PermissionDenied,
            BillingError::Provider {
                kind: ProviderErrorKind::Card,
                ..
            } => ErrorCode::CardDeclined,
            BillingError::Provider { .. } => ErrorCode::ProviderError,
            BillingError::Validation { .. } => ErrorCode::ValidationFailed,
            BillingError::UserNotFound(_) => ErrorCode::UserStoreError,
            BillingError::Infrastructure(_) => ErrorCode::InternalError,
        }
    }
}

impl From<ValidationError> for BillingError {
    fn from(err: ValidationError) -> Self {
        BillingError::Validation {
            field: err.field().to_string(),
            message: err.to_string(),
        }
    }
}

impl From<BillingError> for DomainError {
    fn from(err: BillingError) -> Self {
        DomainError::new(err.code(), err.to_string())
    }
}

/// Splits a leading `Request req_...: ` correlation prefix off a message.
///
/// Returns the request id (if any) and the remaining message.
pub fn strip_request_id(message: &str) -> (Option<&str>, &str) {
    let Some(rest) = message.strip_prefix("Request ") else {
        return (None, message);
    };
    let Some((id, tail)) = rest.split_once(": ") else {
        return (None, message);
    };
    if id.starts_with("req_") && !id.contains(char::is_whitespace) {
        (Some(id), tail)
    } else {
        (None, message)
    }
}
