//! UserStore port - Access to host application user records.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::billing::{BillingError, LocalUser, UserField};
use crate::domain::foundation::UserId;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UserStoreError {
    #[error("User {0} not found")]
    NotFound(UserId),

    #[error("User {0} already exists")]
    AlreadyExists(UserId),

    #[error("User store unavailable: {0}")]
    Unavailable(String),

    /// The record was saved but the remote customer could not be updated.
    #[error("Customer sync failed: {0}")]
    SyncFailed(String),
}

impl UserStoreError {
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable(message.into())
    }
}

impl From<UserStoreError> for BillingError {
    fn from(err: UserStoreError) -> Self {
        match err {
            UserStoreError::NotFound(id) => BillingError::UserNotFound(id),
            other => BillingError::infrastructure(other.to_string()),
        }
    }
}

/// Persistence for local users.
///
/// `save` with `Some(fields)` writes only those columns; `None` writes the
/// whole record.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn get_by_id(&self, id: &UserId) -> Result<LocalUser, UserStoreError>;

    /// Store a newly created user.
    async fn insert(&self, user: &LocalUser) -> Result<(), UserStoreError>;

    async fn save(
        &self,
        user: &LocalUser,
        changed_fields: Option<&[UserField]>,
    ) -> Result<(), UserStoreError>;
}
