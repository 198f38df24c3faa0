//! Mock session validator for tests.
//!
//! # Example
//!
//! ```ignore
//! let validator = MockSessionValidator::new().with_token("valid-token", "user-123");
//! let principal = validator.validate("valid-token").await?;
//! assert_eq!(principal.user_id.as_str(), "user-123");
//! ```

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;

use crate::domain::billing::TokenPrincipal;
use crate::domain::foundation::UserId;
use crate::ports::{AuthError, SessionValidator};

/// Maps fixed tokens to user ids. Unknown tokens return `InvalidToken`.
#[derive(Debug, Default)]
pub struct MockSessionValidator {
    tokens: RwLock<HashMap<String, UserId>>,
    force_error: RwLock<Option<AuthError>>,
}

impl MockSessionValidator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `token` for `user_id`. Panics on an empty id.
    pub fn with_token(self, token: impl Into<String>, user_id: impl Into<String>) -> Self {
        self.add_token(token, user_id);
        self
    }

    /// Forces all validations to return `error`.
    pub fn with_error(self, error: AuthError) -> Self {
        *self
            .force_error
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(error);
        self
    }

    pub fn add_token(&self, token: impl Into<String>, user_id: impl Into<String>) {
        let user_id = UserId::new(user_id).unwrap_or_else(|e| panic!("mock user id: {}", e));
        self.tokens
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(token.into(), user_id);
    }

    pub fn remove_token(&self, token: &str) {
        self.tokens
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(token);
    }

    pub fn token_count(&self) -> usize {
        self.tokens
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[async_trait]
impl SessionValidator for MockSessionValidator {
    async fn validate(&self, token: &str) -> Result<TokenPrincipal, AuthError> {
        if let Some(error) = self
            .force_error
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
        {
            return Err(error);
        }

        self.tokens
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(token)
            .cloned()
            .map(|user_id| TokenPrincipal { user_id })
            .ok_or(AuthError::InvalidToken)
    }
}
