//! InvoicesHandler - Read-only access to the caller's invoices.

use std::sync::Arc;

use crate::domain::billing::{BillingError, Invoice, LocalUser};
use crate::ports::PaymentsClient;

use super::resource_types::{InvoiceQuery, Invoices};
use super::ResourceGateway;

#[derive(Clone)]
pub struct InvoicesHandler {
    gateway: ResourceGateway,
    invoices: Invoices,
}

impl InvoicesHandler {
    pub fn new(payments: Arc<dyn PaymentsClient>, gateway: ResourceGateway) -> Self {
        Self {
            gateway,
            invoices: Invoices::new(payments),
        }
    }

    pub async fn list(&self, user: &LocalUser, query: &InvoiceQuery) -> Result<Vec<Invoice>, BillingError> {
        self.gateway.list_owned(&self.invoices, user, query).await
    }

    pub async fn retrieve(&self, user: &LocalUser, id: &str) -> Result<Invoice, BillingError> {
        self.gateway.retrieve_owned(&self.invoices, user, id).await
    }
}
