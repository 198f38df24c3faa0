//! SetupIntentsHandler - Off-session intents for saving payment methods.

use std::sync::Arc;

use crate::config::BillingSettings;
use crate::domain::billing::{BillingError, LocalUser, SetupIntent};
use crate::ports::PaymentsClient;

use super::resource_types::SetupIntents;
use super::ResourceGateway;

#[derive(Clone)]
pub struct SetupIntentsHandler {
    gateway: ResourceGateway,
    intents: SetupIntents,
    settings: Arc<BillingSettings>,
}

impl SetupIntentsHandler {
    pub fn new(
        payments: Arc<dyn PaymentsClient>,
        gateway: ResourceGateway,
        settings: Arc<BillingSettings>,
    ) -> Self {
        Self {
            gateway,
            intents: SetupIntents::new(payments),
            settings,
        }
    }

    /// Creates an unconfirmed intent for the configured method types.
    pub async fn create(&self, user: &LocalUser) -> Result<(LocalUser, SetupIntent), BillingError> {
        self.gateway
            .create_for(&self.intents, user, &self.settings.payment_method_types)
            .await
    }

    pub async fn retrieve(&self, user: &LocalUser, id: &str) -> Result<SetupIntent, BillingError> {
        self.gateway.retrieve_owned(&self.intents, user, id).await
    }
}
