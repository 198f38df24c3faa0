//! CustomerSyncingUserStore - Runs customer sync after every user save.

use async_trait::async_trait;
use std::sync::Arc;

use crate::domain::billing::{LocalUser, UserField};
use crate::domain::foundation::UserId;
use crate::ports::{UserStore, UserStoreError};

use super::CustomerSync;

/// Decorates a `UserStore` so that saved changes reach the remote customer.
///
/// `insert` is a first save and never syncs. A failed sync is reported
/// after the local write has already happened.
pub struct CustomerSyncingUserStore {
    inner: Arc<dyn UserStore>,
    sync: CustomerSync,
}

impl CustomerSyncingUserStore {
    pub fn new(inner: Arc<dyn UserStore>, sync: CustomerSync) -> Self {
        Self { inner, sync }
    }
}

#[async_trait]
impl UserStore for CustomerSyncingUserStore {
    async fn get_by_id(&self, id: &UserId) -> Result<LocalUser, UserStoreError> {
        self.inner.get_by_id(id).await
    }

    async fn insert(&self, user: &LocalUser) -> Result<(), UserStoreError> {
        self.inner.insert(user).await
    }

    async fn save(
        &self,
        user: &LocalUser,
        changed_fields: Option<&[UserField]>,
    ) -> Result<(), UserStoreError> {
        self.inner.save(user, changed_fields).await?;
        self.sync
            .sync_on_change(user, changed_fields, false)
            .await
            .map_err(|e| {
                tracing::error!(user_id = %user.id, error = %e, "Customer sync after save failed");
                UserStoreError::SyncFailed(e.to_string())
            })
    }
}
