//! CustomerSync - Keeps a local user and its remote customer in step.
//!
//! `ensure_customer` creates the remote customer on first use and stores
//! its id on the user. `sync_on_change` mirrors email and description
//! changes onto an existing customer.

use std::sync::Arc;

use crate::domain::billing::{
    user_description, BillingError, BillingEventPayload, Customer, LocalUser, UserField,
};
use crate::domain::foundation::CustomerRef;
use crate::ports::{CreateCustomerParams, CustomerUpdate, PaymentsClient, UserStore};

use super::EventEmitter;

/// Extra parameters for new remote customers, derived from the user.
///
/// The default adds nothing. Host applications implement this to attach
/// their own metadata or a display name.
pub trait NewCustomerParams: Send + Sync {
    fn params_for(&self, _user: &LocalUser) -> CreateCustomerParams {
        CreateCustomerParams::default()
    }
}

/// Adds no parameters beyond the defaults.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoExtraCustomerParams;

impl NewCustomerParams for NoExtraCustomerParams {}

/// Lazily creates and updates remote customers.
#[derive(Clone)]
pub struct CustomerSync {
    payments: Arc<dyn PaymentsClient>,
    users: Arc<dyn UserStore>,
    events: EventEmitter,
    extra_params: Arc<dyn NewCustomerParams>,
    keep_details_updated: bool,
}

impl CustomerSync {
    pub fn new(
        payments: Arc<dyn PaymentsClient>,
        users: Arc<dyn UserStore>,
        events: EventEmitter,
        keep_details_updated: bool,
    ) -> Self {
        Self {
            payments,
            users,
            events,
            extra_params: Arc::new(NoExtraCustomerParams),
            keep_details_updated,
        }
    }

    pub fn with_extra_params(mut self, extra_params: Arc<dyn NewCustomerParams>) -> Self {
        self.extra_params = extra_params;
        self
    }

    fn base_params(user: &LocalUser) -> CreateCustomerParams {
        let mut params = CreateCustomerParams {
            email: Some(user.email.clone()).filter(|e| !e.is_empty()),
            description: Some(user_description(user)).filter(|d| !d.is_empty()),
            ..Default::default()
        };
        params
            .metadata
            .insert("user_id".to_string(), user.id.to_string());
        params
    }

    /// Returns `user` with a guaranteed `customer_ref`.
    ///
    /// At most one remote customer is created per user: a user that
    /// already has a reference is returned as is. Concurrent first calls
    /// for the same user may each create a customer; the last local write
    /// wins.
    pub async fn ensure_customer(
        &self,
        user: &LocalUser,
        overrides: CreateCustomerParams,
    ) -> Result<LocalUser, BillingError> {
        if !user.is_authenticated {
            return Err(BillingError::Unauthenticated);
        }
        if user.customer_ref.is_some() {
            return Ok(user.clone());
        }

        tracing::debug!(user_id = %user.id, "Creating remote customer");
        let params = Self::base_params(user)
            .merge(self.extra_params.params_for(user))
            .merge(overrides);
        let customer = self.payments.create_customer(&params).await.map_err(|e| {
            tracing::error!(user_id = %user.id, request_id = ?e.request_id, error = %e.message, "Customer creation failed");
            BillingError::from(e)
        })?;

        let mut user = user.clone();
        user.customer_ref = Some(CustomerRef::new(customer.id.clone())?);
        self.users
            .save(&user, Some(&[UserField::CustomerRef]))
            .await?;

        tracing::debug!(user_id = %user.id, customer_id = %customer.id, "Created remote customer");
        self.events
            .emit(&user, BillingEventPayload::NewCustomer { customer })
            .await;
        Ok(user)
    }

    /// Mirrors a saved user change onto the remote customer.
    ///
    /// Does nothing when the feature is off, for users saved for the first
    /// time, for users without a customer, or when `changed_fields` names
    /// none of the customer detail fields. Only fields that differ are sent.
    pub async fn sync_on_change(
        &self,
        user: &LocalUser,
        changed_fields: Option<&[UserField]>,
        created: bool,
    ) -> Result<(), BillingError> {
        if !self.keep_details_updated || created {
            return Ok(());
        }
        let Some(customer_ref) = user.customer_ref.as_ref() else {
            return Ok(());
        };
        if let Some(fields) = changed_fields {
            if !fields.is_empty() && !fields.iter().any(UserField::is_customer_detail) {
                return Ok(());
            }
        }

        let customer = self.payments.retrieve_customer(customer_ref).await?;
        let update = details_diff(&customer, user);
        if update.is_empty() {
            tracing::debug!(user_id = %user.id, "Remote customer already up to date");
            return Ok(());
        }

        tracing::debug!(user_id = %user.id, customer_id = %customer_ref, "Updating remote customer details");
        let customer = self.payments.modify_customer(customer_ref, &update).await?;
        self.events
            .emit(user, BillingEventPayload::CustomerModified { customer })
            .await;
        Ok(())
    }

    /// Applies `update` to the user's existing remote customer.
    pub async fn modify_customer(
        &self,
        user: &LocalUser,
        update: &CustomerUpdate,
    ) -> Result<Customer, BillingError> {
        let customer_ref = user
            .customer_ref
            .as_ref()
            .ok_or_else(|| BillingError::permission_denied("A customer is required"))?;

        tracing::debug!(user_id = %user.id, customer_id = %customer_ref, "Modifying remote customer");
        let customer = self.payments.modify_customer(customer_ref, update).await?;
        self.events
            .emit(
                user,
                BillingEventPayload::CustomerModified {
                    customer: customer.clone(),
                },
            )
            .await;
        Ok(customer)
    }

    /// Makes `payment_method_id` the customer's invoice default.
    pub async fn set_default_payment_method(
        &self,
        user: &LocalUser,
        payment_method_id: &str,
    ) -> Result<Customer, BillingError> {
        self.modify_customer(user, &CustomerUpdate::default_payment_method(payment_method_id))
            .await
    }

    /// Current remote customer for `user`, if any.
    pub async fn retrieve_customer(
        &self,
        user: &LocalUser,
    ) -> Result<Option<Customer>, BillingError> {
        match user.customer_ref.as_ref() {
            Some(customer_ref) => Ok(Some(self.payments.retrieve_customer(customer_ref).await?)),
            None => Ok(None),
        }
    }
}

/// Email and description changes between the remote customer and `user`.
fn details_diff(customer: &Customer, user: &LocalUser) -> CustomerUpdate {
    let mut update = CustomerUpdate::default();
    if customer.email.as_deref().unwrap_or_default() != user.email {
        update.email = Some(user.email.clone());
    }
    let description = user_description(user);
    if customer.description.as_deref().unwrap_or_default() != description {
        update.description = Some(description);
    }
    update
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::events::InMemoryEventBus;
    use crate::adapters::stripe::MockPaymentsClient;
    use crate::adapters::users::InMemoryUserStore;
    use crate::domain::billing::{test_user, InvoiceSettings};
    use crate::ports::ProviderError;
    use std::collections::HashMap;

    struct Fixture {
        payments: MockPaymentsClient,
        users: InMemoryUserStore,
        bus: Arc<InMemoryEventBus>,
        sync: CustomerSync,
    }

    async fn fixture(user: &LocalUser) -> Fixture {
        let payments = MockPaymentsClient::new();
        let users = InMemoryUserStore::with_users([user.clone()]).await;
        let bus = Arc::new(InMemoryEventBus::recording());
        let sync = CustomerSync::new(
            Arc::new(payments.clone()),
            Arc::new(users.clone()),
            EventEmitter::new(bus.clone()),
            true,
        );
        Fixture {
            payments,
            users,
            bus,
            sync,
        }
    }

    fn remote_customer(id: &str, email: &str, description: &str) -> Customer {
        Customer {
            id: id.into(),
            email: Some(email.into()),
            description: Some(description.into()),
            invoice_settings: InvoiceSettings::default(),
            metadata: HashMap::new(),
            created: 1,
        }
    }

    fn with_customer(user: LocalUser, id: &str) -> LocalUser {
        user.with_customer_ref(CustomerRef::new(id).unwrap())
    }

    // ════════════════════════════════════════════════════════════════════════════
    // ensure_customer
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn creates_customer_once() {
        let user = test_user("u1");
        let f = fixture(&user).await;

        let first = f.sync.ensure_customer(&user, Default::default()).await.unwrap();
        let second = f.sync.ensure_customer(&first, Default::default()).await.unwrap();

        assert_eq!(first.customer_ref, second.customer_ref);
        assert_eq!(f.payments.call_count("create_customer"), 1);
        assert_eq!(f.bus.events_of_type("new_customer").len(), 1);
    }

    #[tokio::test]
    async fn persists_only_the_customer_ref() {
        let user = test_user("u1");
        let f = fixture(&user).await;

        let updated = f.sync.ensure_customer(&user, Default::default()).await.unwrap();

        let stored = f.users.get_by_id(&user.id).await.unwrap();
        assert_eq!(stored.customer_ref, updated.customer_ref);
        assert_eq!(
            f.users.saves().await,
            vec![(user.id.clone(), Some(vec![UserField::CustomerRef]))]
        );
    }

    #[tokio::test]
    async fn new_customer_gets_description_and_user_metadata() {
        let user = test_user("u1");
        let f = fixture(&user).await;

        let updated = f.sync.ensure_customer(&user, Default::default()).await.unwrap();

        let customer = f
            .payments
            .customer(updated.customer_ref.unwrap().as_str())
            .unwrap();
        assert_eq!(customer.email.as_deref(), Some("u1@example.com"));
        assert_eq!(customer.description.as_deref(), Some("Ada Lovelace"));
        assert_eq!(customer.metadata.get("user_id").map(String::as_str), Some("u1"));
    }

    #[tokio::test]
    async fn extra_params_and_overrides_are_merged_in_order() {
        struct Tagged;
        impl NewCustomerParams for Tagged {
            fn params_for(&self, _: &LocalUser) -> CreateCustomerParams {
                let mut p = CreateCustomerParams {
                    description: Some("from hook".into()),
                    ..Default::default()
                };
                p.metadata.insert("plan".into(), "pro".into());
                p
            }
        }

        let user = test_user("u1");
        let f = fixture(&user).await;
        let sync = f.sync.clone().with_extra_params(Arc::new(Tagged));

        let overrides = CreateCustomerParams {
            email: Some("override@example.com".into()),
            ..Default::default()
        };
        let updated = sync.ensure_customer(&user, overrides).await.unwrap();

        let customer = f
            .payments
            .customer(updated.customer_ref.unwrap().as_str())
            .unwrap();
        assert_eq!(customer.description.as_deref(), Some("from hook"));
        assert_eq!(customer.email.as_deref(), Some("override@example.com"));
        assert_eq!(customer.metadata.get("plan").map(String::as_str), Some("pro"));
    }

    #[tokio::test]
    async fn unauthenticated_user_cannot_get_a_customer() {
        let mut user = test_user("u1");
        user.is_authenticated = false;
        let f = fixture(&user).await;

        assert_eq!(
            f.sync.ensure_customer(&user, Default::default()).await,
            Err(BillingError::Unauthenticated)
        );
        assert_eq!(f.payments.total_calls(), 0);
    }

    #[tokio::test]
    async fn provider_failure_leaves_user_unchanged_and_emits_nothing() {
        let user = test_user("u1");
        let f = fixture(&user).await;
        f.payments.set_method_error(
            "create_customer",
            ProviderError::network("connection reset"),
        );

        let result = f.sync.ensure_customer(&user, Default::default()).await;

        assert!(matches!(result, Err(BillingError::Provider { .. })));
        assert!(f.users.get_by_id(&user.id).await.unwrap().customer_ref.is_none());
        assert_eq!(f.bus.event_count(), 0);
    }

    // ════════════════════════════════════════════════════════════════════════════
    // sync_on_change
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn email_change_updates_only_email() {
        let mut user = with_customer(test_user("u1"), "cus_1");
        let f = fixture(&user).await;
        f.payments
            .add_customer(remote_customer("cus_1", "u1@example.com", "Ada Lovelace"));

        user.email = "b@x.com".into();
        f.sync
            .sync_on_change(&user, Some(&[UserField::Email]), false)
            .await
            .unwrap();

        let calls = f.payments.calls();
        let modify = calls.iter().find(|c| c.method == "modify_customer").unwrap();
        assert!(modify.args.iter().any(|a| a == "email"));
        assert!(!modify.args.iter().any(|a| a == "description"));
        assert_eq!(
            f.payments.customer("cus_1").unwrap().email.as_deref(),
            Some("b@x.com")
        );
        assert!(f.bus.has_event("customer_modified"));
    }

    #[tokio::test]
    async fn unrelated_fields_do_not_touch_remote() {
        let user = with_customer(test_user("u1"), "cus_1");
        let f = fixture(&user).await;

        f.sync
            .sync_on_change(&user, Some(&[UserField::AllowedAccessUntil]), false)
            .await
            .unwrap();

        assert_eq!(f.payments.total_calls(), 0);
    }

    #[tokio::test]
    async fn skipped_for_new_users_and_users_without_customer() {
        let user = test_user("u1");
        let f = fixture(&user).await;

        f.sync.sync_on_change(&user, None, false).await.unwrap();
        let with_ref = with_customer(user, "cus_1");
        f.sync.sync_on_change(&with_ref, None, true).await.unwrap();

        assert_eq!(f.payments.total_calls(), 0);
    }

    #[tokio::test]
    async fn skipped_when_feature_disabled() {
        let user = with_customer(test_user("u1"), "cus_1");
        let f = fixture(&user).await;
        let sync = CustomerSync::new(
            Arc::new(f.payments.clone()),
            Arc::new(f.users.clone()),
            EventEmitter::new(f.bus.clone()),
            false,
        );

        sync.sync_on_change(&user, None, false).await.unwrap();
        assert_eq!(f.payments.total_calls(), 0);
    }

    #[tokio::test]
    async fn no_write_when_nothing_differs() {
        let user = with_customer(test_user("u1"), "cus_1");
        let f = fixture(&user).await;
        f.payments
            .add_customer(remote_customer("cus_1", "u1@example.com", "Ada Lovelace"));

        f.sync.sync_on_change(&user, None, false).await.unwrap();

        assert!(f.payments.was_called("retrieve_customer"));
        assert!(!f.payments.was_called("modify_customer"));
        assert_eq!(f.bus.event_count(), 0);
    }

    // ════════════════════════════════════════════════════════════════════════════
    // modify_customer
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn modify_requires_a_customer() {
        let user = test_user("u1");
        let f = fixture(&user).await;

        let result = f
            .sync
            .modify_customer(&user, &CustomerUpdate::default_payment_method("pm_1"))
            .await;
        assert_eq!(
            result,
            Err(BillingError::permission_denied("A customer is required"))
        );
    }

    #[tokio::test]
    async fn set_default_payment_method_updates_invoice_settings() {
        let user = with_customer(test_user("u1"), "cus_1");
        let f = fixture(&user).await;
        f.payments
            .add_customer(remote_customer("cus_1", "u1@example.com", "Ada Lovelace"));

        let customer = f.sync.set_default_payment_method(&user, "pm_1").await.unwrap();

        assert_eq!(customer.default_payment_method(), Some("pm_1"));
        assert_eq!(f.bus.events_of_type("customer_modified").len(), 1);
    }
}
