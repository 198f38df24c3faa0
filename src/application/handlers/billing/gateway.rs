//! ResourceGateway - Ownership-checked access to remote resources.
//!
//! Every read, create, modify, delete and list of a customer-scoped
//! resource goes through here. Lists are filtered by the caller's
//! customer; single objects are only handed out, changed or deleted
//! after their customer is compared with the caller's.

use crate::domain::billing::{BillingError, LocalUser, OwnedByCustomer, ResourceKind};
use crate::ports::{CreateCustomerParams, ProviderError};

use super::capabilities::{Creatable, Deletable, Listable, Modifiable, Retrievable};
use super::{CustomerSync, EventEmitter};

/// Maps a failed lookup of `kind`/`id` into the billing taxonomy.
///
/// A missing object becomes `NotFound`; anything else keeps the provider
/// message with its request id split off.
pub(crate) fn lookup_error(kind: ResourceKind, id: &str, err: ProviderError) -> BillingError {
    if err.is_resource_missing() {
        return BillingError::not_found(kind, id);
    }
    provider_failure(err)
}

/// Logs a provider failure with its request id and converts it.
pub(crate) fn provider_failure(err: ProviderError) -> BillingError {
    tracing::error!(
        kind = ?err.kind,
        request_id = ?err.request_id,
        status = ?err.http_status,
        error = %err.message,
        "Payments provider call failed"
    );
    BillingError::from(err)
}

/// Generic drivers over the capability traits.
#[derive(Clone)]
pub struct ResourceGateway {
    customers: CustomerSync,
    events: EventEmitter,
}

impl ResourceGateway {
    pub fn new(customers: CustomerSync, events: EventEmitter) -> Self {
        Self { customers, events }
    }

    pub fn customers(&self) -> &CustomerSync {
        &self.customers
    }

    pub fn events(&self) -> &EventEmitter {
        &self.events
    }

    /// Returns `item` if `user` owns it, `WrongCustomer` otherwise.
    pub fn assert_owned<T: OwnedByCustomer>(
        &self,
        item: T,
        user: &LocalUser,
    ) -> Result<T, BillingError> {
        if let Err(e) = item.check_ownership(user) {
            tracing::warn!(
                user_id = %user.id,
                resource_id = %item.resource_id(),
                owner = ?item.owner_ref(),
                "Access to another customer's {} refused",
                T::KIND
            );
            return Err(e);
        }
        Ok(item)
    }

    /// Lists the caller's items. A user without a customer owns nothing and
    /// gets an empty list.
    pub async fn list_owned<R: Listable>(
        &self,
        resource: &R,
        user: &LocalUser,
        query: &R::Query,
    ) -> Result<Vec<R::Item>, BillingError> {
        let Some(customer) = user.customer_ref.as_ref() else {
            return Ok(Vec::new());
        };

        let items = resource
            .list(customer, query)
            .await
            .map_err(provider_failure)?;
        Ok(items
            .into_iter()
            .filter(|item| item.is_owned_by(user))
            .collect())
    }

    /// Retrieves one item and checks that the caller owns it.
    pub async fn retrieve_owned<R: Retrievable>(
        &self,
        resource: &R,
        user: &LocalUser,
        id: &str,
    ) -> Result<R::Item, BillingError> {
        let kind = resource.kind();
        if user.customer_ref.is_none() {
            tracing::debug!(user_id = %user.id, resource_id = %id, "No customer, nothing to retrieve");
            return Err(BillingError::not_found(kind, id));
        }

        let item = resource
            .retrieve(id)
            .await
            .map_err(|e| lookup_error(kind, id, e))?;
        self.assert_owned(item, user)
    }

    /// Creates an item for the caller, creating their customer first if
    /// needed. Returns the (possibly updated) user with the item.
    pub async fn create_for<R: Creatable>(
        &self,
        resource: &R,
        user: &LocalUser,
        params: &R::Params,
    ) -> Result<(LocalUser, R::Item), BillingError> {
        let user = self
            .customers
            .ensure_customer(user, CreateCustomerParams::default())
            .await?;
        let customer = user
            .customer_ref
            .as_ref()
            .ok_or_else(|| BillingError::infrastructure("Customer reference missing after creation"))?;

        let item = resource
            .create(customer, params)
            .await
            .map_err(provider_failure)?;
        tracing::debug!(user_id = %user.id, resource_id = %item.resource_id(), "Created {}", resource.kind());

        self.events.emit(&user, R::created_event(&item)).await;
        Ok((user, item))
    }

    /// Modifies an item the caller owns.
    pub async fn modify_owned<R: Modifiable>(
        &self,
        resource: &R,
        user: &LocalUser,
        id: &str,
        changes: &R::Changes,
    ) -> Result<R::Item, BillingError> {
        let current = self.retrieve_owned(resource, user, id).await?;

        let kind = resource.kind();
        let item = resource
            .modify(&current, changes)
            .await
            .map_err(|e| lookup_error(kind, id, e))?;
        tracing::debug!(user_id = %user.id, resource_id = %id, "Modified {}", kind);

        self.events.emit(user, R::modified_event(&item)).await;
        Ok(item)
    }

    /// Deletes an item the caller owns.
    pub async fn delete_owned<R: Deletable>(
        &self,
        resource: &R,
        user: &LocalUser,
        id: &str,
    ) -> Result<R::Item, BillingError> {
        self.retrieve_owned(resource, user, id).await?;

        let kind = resource.kind();
        let item = resource
            .delete(id)
            .await
            .map_err(|e| lookup_error(kind, id, e))?;
        tracing::debug!(user_id = %user.id, resource_id = %id, "Deleted {}", kind);

        self.events.emit(user, R::deleted_event(&item)).await;
        Ok(item)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::events::InMemoryEventBus;
    use crate::adapters::stripe::MockPaymentsClient;
    use crate::adapters::users::InMemoryUserStore;
    use crate::application::handlers::billing::resource_types::{
        Invoices, NewSubscription, PaymentMethods, SubscriptionQuery, Subscriptions,
    };
    use crate::domain::billing::fixtures::{card, customer, invoice, monthly_price};
    use crate::domain::billing::test_user;
    use crate::domain::foundation::CustomerRef;
    use crate::ports::PaymentMethodUpdate;
    use proptest::prelude::*;
    use std::sync::Arc;

    struct Fixture {
        payments: MockPaymentsClient,
        bus: Arc<InMemoryEventBus>,
        gateway: ResourceGateway,
    }

    async fn fixture(users: Vec<LocalUser>) -> Fixture {
        let payments = MockPaymentsClient::new();
        let bus = Arc::new(InMemoryEventBus::recording());
        let events = EventEmitter::new(bus.clone());
        let store = InMemoryUserStore::with_users(users).await;
        let customers =
            CustomerSync::new(Arc::new(payments.clone()), Arc::new(store), events.clone(), true);
        Fixture {
            payments,
            bus,
            gateway: ResourceGateway::new(customers, events),
        }
    }

    fn owner(id: &str, customer: &str) -> LocalUser {
        test_user(id).with_customer_ref(CustomerRef::new(customer).unwrap())
    }

    #[tokio::test]
    async fn list_without_customer_is_empty_and_makes_no_call() {
        let f = fixture(vec![]).await;
        let items = f
            .gateway
            .list_owned(
                &PaymentMethods::new(Arc::new(f.payments.clone())),
                &test_user("u1"),
                &"card".to_string(),
            )
            .await
            .unwrap();

        assert!(items.is_empty());
        assert_eq!(f.payments.total_calls(), 0);
    }

    #[tokio::test]
    async fn list_only_returns_callers_items() {
        let f = fixture(vec![]).await;
        f.payments.add_payment_method(card("pm_mine", "cus_a"));
        f.payments.add_payment_method(card("pm_theirs", "cus_b"));

        let items = f
            .gateway
            .list_owned(
                &PaymentMethods::new(Arc::new(f.payments.clone())),
                &owner("u1", "cus_a"),
                &"card".to_string(),
            )
            .await
            .unwrap();

        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id, "pm_mine");
    }

    #[tokio::test]
    async fn retrieve_of_other_customers_item_is_not_found_shaped() {
        let f = fixture(vec![]).await;
        f.payments.add_invoice(invoice("in_1", "cus_b"));

        let err = f
            .gateway
            .retrieve_owned(
                &Invoices::new(Arc::new(f.payments.clone())),
                &owner("u1", "cus_a"),
                "in_1",
            )
            .await
            .unwrap_err();

        assert_eq!(err, BillingError::wrong_customer(ResourceKind::Invoice, "in_1"));
        assert_eq!(err.to_string(), "No such invoice: 'in_1'");
    }

    #[tokio::test]
    async fn retrieve_of_missing_item_is_not_found() {
        let f = fixture(vec![]).await;
        let err = f
            .gateway
            .retrieve_owned(
                &Invoices::new(Arc::new(f.payments.clone())),
                &owner("u1", "cus_a"),
                "in_missing",
            )
            .await
            .unwrap_err();

        assert_eq!(err, BillingError::not_found(ResourceKind::Invoice, "in_missing"));
    }

    #[tokio::test]
    async fn modify_and_delete_of_foreign_items_never_reach_the_provider() {
        let f = fixture(vec![]).await;
        f.payments.add_payment_method(card("pm_theirs", "cus_b"));
        let methods = PaymentMethods::new(Arc::new(f.payments.clone()));
        let user = owner("u1", "cus_a");

        let modify = f
            .gateway
            .modify_owned(&methods, &user, "pm_theirs", &PaymentMethodUpdate::default())
            .await;
        let delete = f.gateway.delete_owned(&methods, &user, "pm_theirs").await;

        assert!(modify.unwrap_err().is_not_found());
        assert!(delete.unwrap_err().is_not_found());
        assert!(!f.payments.was_called("modify_payment_method"));
        assert!(!f.payments.was_called("detach_payment_method"));
        assert_eq!(f.bus.event_count(), 0);
    }

    #[tokio::test]
    async fn delete_of_own_item_emits_event() {
        let f = fixture(vec![]).await;
        f.payments.add_payment_method(card("pm_1", "cus_a"));

        let detached = f
            .gateway
            .delete_owned(
                &PaymentMethods::new(Arc::new(f.payments.clone())),
                &owner("u1", "cus_a"),
                "pm_1",
            )
            .await
            .unwrap();

        assert_eq!(detached.customer, None);
        assert_eq!(f.bus.events_of_type("payment_method_detached").len(), 1);
    }

    #[tokio::test]
    async fn customerless_user_cannot_modify() {
        let f = fixture(vec![]).await;
        f.payments.add_payment_method(card("pm_1", "cus_a"));

        let err = f
            .gateway
            .modify_owned(
                &PaymentMethods::new(Arc::new(f.payments.clone())),
                &test_user("u1"),
                "pm_1",
                &PaymentMethodUpdate::default(),
            )
            .await
            .unwrap_err();

        assert_eq!(err, BillingError::not_found(ResourceKind::PaymentMethod, "pm_1"));
        assert_eq!(f.payments.total_calls(), 0);
    }

    #[tokio::test]
    async fn create_ensures_customer_and_emits_both_events() {
        let user = test_user("u1");
        let f = fixture(vec![user.clone()]).await;
        f.payments.add_price(monthly_price("price_abc", "prod_default"));
        let subs = Subscriptions::new(Arc::new(f.payments.clone()));

        let (user, sub) = f
            .gateway
            .create_for(
                &subs,
                &user,
                &NewSubscription {
                    price_id: "price_abc".into(),
                    default_payment_method: None,
                },
            )
            .await
            .unwrap();

        assert_eq!(Some(sub.customer.as_str()), user.customer_ref.as_ref().map(|c| c.as_str()));
        assert_eq!(f.bus.event_types(), vec!["new_customer", "subscription_created"]);

        let listed = f
            .gateway
            .list_owned(&subs, &user, &SubscriptionQuery::default())
            .await
            .unwrap();
        assert_eq!(listed.len(), 1);
    }

    #[tokio::test]
    async fn provider_error_on_create_emits_nothing_for_the_resource() {
        let f = fixture(vec![]).await;
        f.payments.add_customer(customer("cus_a"));
        let subs = Subscriptions::new(Arc::new(f.payments.clone()));

        let err = f
            .gateway
            .create_for(
                &subs,
                &owner("u1", "cus_a"),
                &NewSubscription {
                    price_id: "price_unknown".into(),
                    default_payment_method: None,
                },
            )
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "No such price: 'price_unknown'");
        assert_eq!(f.bus.event_count(), 0);
    }

    proptest! {
        #[test]
        fn foreign_objects_are_never_returned(mine in "cus_[a-z]{1,6}", theirs in "cus_[a-z]{1,6}") {
            prop_assume!(mine != theirs);
            let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
            rt.block_on(async {
                let f = fixture(vec![]).await;
                f.payments.add_payment_method(card("pm_x", &theirs));
                let methods = PaymentMethods::new(Arc::new(f.payments.clone()));
                let user = owner("u1", &mine);

                let retrieved = f.gateway.retrieve_owned(&methods, &user, "pm_x").await;
                prop_assert!(retrieved.unwrap_err().is_not_found());
                let listed = f.gateway.list_owned(&methods, &user, &"card".to_string()).await.unwrap();
                prop_assert!(listed.is_empty());
                Ok(())
            })?;
        }
    }
}
