//! Session validation port for bearer tokens.
//!
//! Validators turn a raw access token into a `TokenPrincipal`. The token
//! only proves who the caller is; the full user record is loaded later by
//! the user resolver.
//!
//! Implementations must validate signature and expiry, and issuer and
//! audience where configured.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::billing::TokenPrincipal;

/// Authentication failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// The token is missing, malformed, or has an invalid signature.
    #[error("Invalid or expired token")]
    InvalidToken,

    #[error("Token expired")]
    TokenExpired,

    /// The validator itself could not run (bad key, etc.).
    #[error("Auth service unavailable: {0}")]
    ServiceUnavailable(String),
}

impl AuthError {
    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::ServiceUnavailable(message.into())
    }

    /// Returns true if the caller should obtain a new token.
    pub fn requires_reauthentication(&self) -> bool {
        matches!(self, AuthError::InvalidToken | AuthError::TokenExpired)
    }
}

/// Validates access tokens and extracts the caller's id.
#[async_trait]
pub trait SessionValidator: Send + Sync {
    /// Validate a token (without the "Bearer " prefix).
    async fn validate(&self, token: &str) -> Result<TokenPrincipal, AuthError>;
}
