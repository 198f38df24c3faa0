//! Billing domain events.
//!
//! One event per successful mutating operation, carrying the acting user
//! and the resulting remote object. Names are past tense and stable:
//! listeners subscribe by `event_type`.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{DomainEvent, EventEnvelope, SerializableDomainEvent};

use super::{
    BillingPortalSession, CheckoutSession, Customer, LocalUser, PaymentMethod, SetupIntent,
    Subscription,
};

/// What happened, with the remote object it happened to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum BillingEventPayload {
    /// A remote customer was created for a local user.
    NewCustomer { customer: Customer },

    CustomerModified { customer: Customer },

    CheckoutCreated { session: CheckoutSession },

    BillingPortalCreated { session: BillingPortalSession },

    SetupIntentCreated { setup_intent: SetupIntent },

    SubscriptionCreated { subscription: Subscription },

    SubscriptionModified { subscription: Subscription },

    SubscriptionCancelled { subscription: Subscription },

    PaymentMethodModified { payment_method: PaymentMethod },

    /// One or more methods detached in a single call.
    PaymentMethodDetached { payment_methods: Vec<PaymentMethod> },
}

/// Event raised by billing operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BillingEvent {
    pub actor: LocalUser,
    #[serde(flatten)]
    pub payload: BillingEventPayload,
}

impl BillingEvent {
    pub fn new(actor: &LocalUser, payload: BillingEventPayload) -> Self {
        Self {
            actor: actor.clone(),
            payload,
        }
    }

    /// Envelope for dispatch, tagged with the actor for audit.
    pub fn envelope(&self) -> Result<EventEnvelope, serde_json::Error> {
        Ok(self.to_envelope()?.with_user_id(self.actor.id.as_str()))
    }
}

impl DomainEvent for BillingEvent {
    fn event_type(&self) -> &'static str {
        match &self.payload {
            BillingEventPayload::NewCustomer { .. } => "new_customer",
            BillingEventPayload::CustomerModified { .. } => "customer_modified",
            BillingEventPayload::CheckoutCreated { .. } => "checkout_created",
            BillingEventPayload::BillingPortalCreated { .. } => "billing_portal_created",
            BillingEventPayload::SetupIntentCreated { .. } => "setup_intent_created",
            BillingEventPayload::SubscriptionCreated { .. } => "subscription_created",
            BillingEventPayload::SubscriptionModified { .. } => "subscription_modified",
            BillingEventPayload::SubscriptionCancelled { .. } => "subscription_cancelled",
            BillingEventPayload::PaymentMethodModified { .. } => "payment_method_modified",
            BillingEventPayload::PaymentMethodDetached { .. } => "payment_method_detached",
        }
    }

    fn resource_kind(&self) -> &'static str {
        match &self.payload {
            BillingEventPayload::NewCustomer { .. }
            | BillingEventPayload::CustomerModified { .. } => "customer",
            BillingEventPayload::CheckoutCreated { .. } => "checkout_session",
            BillingEventPayload::BillingPortalCreated { .. } => "billing_portal_session",
            BillingEventPayload::SetupIntentCreated { .. } => "setup_intent",
            BillingEventPayload::SubscriptionCreated { .. }
            | BillingEventPayload::SubscriptionModified { .. }
            | BillingEventPayload::SubscriptionCancelled { .. } => "subscription",
            BillingEventPayload::PaymentMethodModified { .. }
            | BillingEventPayload::PaymentMethodDetached { .. } => "payment_method",
        }
    }

    fn resource_id(&self) -> String {
        match &self.payload {
            BillingEventPayload::NewCustomer { customer }
            | BillingEventPayload::CustomerModified { customer } => customer.id.clone(),
            BillingEventPayload::CheckoutCreated { session } => session.id.clone(),
            BillingEventPayload::BillingPortalCreated { session } => session.id.clone(),
            BillingEventPayload::SetupIntentCreated { setup_intent } => setup_intent.id.clone(),
            BillingEventPayload::SubscriptionCreated { subscription }
            | BillingEventPayload::SubscriptionModified { subscription }
            | BillingEventPayload::SubscriptionCancelled { subscription } => {
                subscription.id.clone()
            }
            BillingEventPayload::PaymentMethodModified { payment_method } => {
                payment_method.id.clone()
            }
            BillingEventPayload::PaymentMethodDetached { payment_methods } => payment_methods
                .iter()
                .map(|pm| pm.id.as_str())
                .collect::<Vec<_>>()
                .join(","),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::billing::{test_user, InvoiceSettings};

    fn customer() -> Customer {
        Customer {
            id: "cus_1".to_string(),
            email: Some("a@x.com".to_string()),
            description: None,
            invoice_settings: InvoiceSettings::default(),
            metadata: Default::default(),
            created: 1,
        }
    }

    fn pm(id: &str) -> PaymentMethod {
        PaymentMethod {
            id: id.to_string(),
            method_type: "card".to_string(),
            billing_details: serde_json::Value::Null,
            card: None,
            customer: None,
            created: 1,
        }
    }

    #[test]
    fn envelope_carries_name_actor_and_payload() {
        let user = test_user("u1");
        let event = BillingEvent::new(&user, BillingEventPayload::NewCustomer { customer: customer() });
        let envelope = event.envelope().unwrap();

        assert_eq!(envelope.event_type, "new_customer");
        assert_eq!(envelope.resource_kind, "customer");
        assert_eq!(envelope.resource_id, "cus_1");
        assert_eq!(envelope.metadata.user_id.as_deref(), Some("u1"));
        assert_eq!(envelope.payload["event"], "new_customer");
        assert_eq!(envelope.payload["customer"]["id"], "cus_1");

        let back: BillingEvent = envelope.payload_as().unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn detached_event_joins_ids() {
        let event = BillingEvent::new(
            &test_user("u1"),
            BillingEventPayload::PaymentMethodDetached {
                payment_methods: vec![pm("pm_1"), pm("pm_2")],
            },
        );
        assert_eq!(event.event_type(), "payment_method_detached");
        assert_eq!(event.resource_id(), "pm_1,pm_2");
    }
}
