//! Capability traits for customer-scoped remote resources.
//!
//! Each resource type declares what it supports by implementing some of
//! `Listable`, `Retrievable`, `Creatable`, `Modifiable` and `Deletable`.
//! The generic drivers on `ResourceGateway` inject the caller's customer
//! and enforce ownership for whichever capabilities a type has.

use async_trait::async_trait;

use crate::domain::billing::{BillingEventPayload, OwnedByCustomer, ResourceKind};
use crate::domain::foundation::CustomerRef;
use crate::ports::ProviderError;

/// A remote resource type whose items belong to one customer.
pub trait RemoteResource: Send + Sync {
    type Item: OwnedByCustomer + Clone + Send + Sync + 'static;

    fn kind(&self) -> ResourceKind {
        <Self::Item as OwnedByCustomer>::KIND
    }
}

#[async_trait]
pub trait Listable: RemoteResource {
    /// Caller-supplied filters, passed through unexamined.
    type Query: Send + Sync;

    async fn list(
        &self,
        customer: &CustomerRef,
        query: &Self::Query,
    ) -> Result<Vec<Self::Item>, ProviderError>;
}

#[async_trait]
pub trait Retrievable: RemoteResource {
    async fn retrieve(&self, id: &str) -> Result<Self::Item, ProviderError>;
}

#[async_trait]
pub trait Creatable: RemoteResource {
    type Params: Send + Sync;

    async fn create(
        &self,
        customer: &CustomerRef,
        params: &Self::Params,
    ) -> Result<Self::Item, ProviderError>;

    fn created_event(item: &Self::Item) -> BillingEventPayload;
}

#[async_trait]
pub trait Modifiable: Retrievable {
    type Changes: Send + Sync;

    /// Applies `changes` to `current`, the item as fetched for the
    /// ownership check.
    async fn modify(
        &self,
        current: &Self::Item,
        changes: &Self::Changes,
    ) -> Result<Self::Item, ProviderError>;

    fn modified_event(item: &Self::Item) -> BillingEventPayload;
}

#[async_trait]
pub trait Deletable: Retrievable {
    async fn delete(&self, id: &str) -> Result<Self::Item, ProviderError>;

    fn deleted_event(item: &Self::Item) -> BillingEventPayload;
}
