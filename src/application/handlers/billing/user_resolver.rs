//! UserResolver - Turns the caller's principal into a full local user.

use std::sync::Arc;

use crate::domain::billing::{BillingError, LocalUser, Principal};
use crate::ports::UserStore;

/// Normalizes a `Principal` into a `LocalUser`.
///
/// Token principals carry only an id and are loaded from the user store.
/// A token whose user has been deleted is a fatal `UserNotFound`.
#[derive(Clone)]
pub struct UserResolver {
    users: Arc<dyn UserStore>,
}

impl UserResolver {
    pub fn new(users: Arc<dyn UserStore>) -> Self {
        Self { users }
    }

    /// Returns `None` for anonymous callers.
    pub async fn resolve(&self, principal: &Principal) -> Result<Option<LocalUser>, BillingError> {
        match principal {
            Principal::Anonymous => Ok(None),
            Principal::User(user) => Ok(Some(user.clone())),
            Principal::Token(token) => {
                let user = self.users.get_by_id(&token.user_id).await?;
                Ok(Some(user))
            }
        }
    }

    /// Like `resolve`, but anonymous or deactivated callers are `Unauthenticated`.
    pub async fn require(&self, principal: &Principal) -> Result<LocalUser, BillingError> {
        match self.resolve(principal).await? {
            Some(user) if user.is_authenticated => Ok(user),
            _ => Err(BillingError::Unauthenticated),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::users::InMemoryUserStore;
    use crate::domain::billing::{test_user, TokenPrincipal};
    use crate::domain::foundation::UserId;

    async fn resolver_with(user: LocalUser) -> UserResolver {
        UserResolver::new(Arc::new(InMemoryUserStore::with_users([user]).await))
    }

    #[tokio::test]
    async fn anonymous_resolves_to_none() {
        let resolver = resolver_with(test_user("u1")).await;
        assert_eq!(resolver.resolve(&Principal::Anonymous).await.unwrap(), None);
    }

    #[tokio::test]
    async fn full_user_is_returned_unchanged() {
        let resolver = UserResolver::new(Arc::new(InMemoryUserStore::new()));
        let user = test_user("u1");

        let resolved = resolver.resolve(&Principal::User(user.clone())).await.unwrap();
        assert_eq!(resolved, Some(user));
    }

    #[tokio::test]
    async fn token_principal_is_loaded_by_id() {
        let user = test_user("u1");
        let resolver = resolver_with(user.clone()).await;

        let principal = Principal::Token(TokenPrincipal {
            user_id: user.id.clone(),
        });
        assert_eq!(resolver.require(&principal).await.unwrap(), user);
    }

    #[tokio::test]
    async fn token_for_deleted_user_is_fatal() {
        let resolver = resolver_with(test_user("u1")).await;
        let ghost = UserId::new("ghost").unwrap();

        let result = resolver
            .resolve(&Principal::Token(TokenPrincipal {
                user_id: ghost.clone(),
            }))
            .await;
        assert_eq!(result, Err(BillingError::UserNotFound(ghost)));
    }

    #[tokio::test]
    async fn require_rejects_anonymous_and_deactivated() {
        let mut inactive = test_user("u2");
        inactive.is_authenticated = false;
        let resolver = resolver_with(inactive.clone()).await;

        assert_eq!(
            resolver.require(&Principal::Anonymous).await,
            Err(BillingError::Unauthenticated)
        );
        assert_eq!(
            resolver.require(&Principal::User(inactive)).await,
            Err(BillingError::Unauthenticated)
        );
    }
}
