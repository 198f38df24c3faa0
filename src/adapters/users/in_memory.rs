//! In-memory user store for tests and local development.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::billing::{LocalUser, UserField};
use crate::domain::foundation::UserId;
use crate::ports::{UserStore, UserStoreError};

/// Users keyed by id. `save` with a field list copies only those fields.
#[derive(Debug, Clone, Default)]
pub struct InMemoryUserStore {
    users: Arc<RwLock<HashMap<UserId, LocalUser>>>,
    saves: Arc<RwLock<Vec<(UserId, Option<Vec<UserField>>)>>>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a store with `users`.
    pub async fn with_users(users: impl IntoIterator<Item = LocalUser>) -> Self {
        let store = Self::new();
        {
            let mut map = store.users.write().await;
            for user in users {
                map.insert(user.id.clone(), user);
            }
        }
        store
    }

    /// Every `save` call seen, with its field list.
    pub async fn saves(&self) -> Vec<(UserId, Option<Vec<UserField>>)> {
        self.saves.read().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.users.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

fn copy_field(target: &mut LocalUser, source: &LocalUser, field: UserField) {
    match field {
        UserField::Email => target.email = source.email.clone(),
        UserField::FirstName => target.first_name = source.first_name.clone(),
        UserField::LastName => target.last_name = source.last_name.clone(),
        UserField::CustomerRef => target.customer_ref = source.customer_ref.clone(),
        UserField::AllowedAccessUntil => target.allowed_access_until = source.allowed_access_until,
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn get_by_id(&self, id: &UserId) -> Result<LocalUser, UserStoreError> {
        self.users
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| UserStoreError::NotFound(id.clone()))
    }

    async fn insert(&self, user: &LocalUser) -> Result<(), UserStoreError> {
        let mut users = self.users.write().await;
        if users.contains_key(&user.id) {
            return Err(UserStoreError::AlreadyExists(user.id.clone()));
        }
        users.insert(user.id.clone(), user.clone());
        Ok(())
    }

    async fn save(
        &self,
        user: &LocalUser,
        changed_fields: Option<&[UserField]>,
    ) -> Result<(), UserStoreError> {
        self.saves
            .write()
            .await
            .push((user.id.clone(), changed_fields.map(<[UserField]>::to_vec)));

        let mut users = self.users.write().await;
        let stored = users
            .get_mut(&user.id)
            .ok_or_else(|| UserStoreError::NotFound(user.id.clone()))?;

        match changed_fields {
            None => *stored = user.clone(),
            Some(fields) => {
                for field in fields {
                    copy_field(stored, user, *field);
                }
            }
        }
        Ok(())
    }
}
