//! Ownership check for customer-scoped remote objects.
//!
//! Every object returned, modified or deleted on behalf of a user must
//! carry that user's customer reference. Objects implement
//! `OwnedByCustomer`; handlers call `check_ownership` before touching them.
//!
//! ```ignore
//! let pm = client.retrieve_payment_method(id).await?;
//! pm.check_ownership(&user)?;  // Err(WrongCustomer) if not theirs
//! ```

use super::{
    BillingError, CheckoutSession, Customer, Invoice, LocalUser, PaymentMethod, ResourceKind,
    SetupIntent, Subscription,
};

/// Remote object that belongs to exactly one customer.
pub trait OwnedByCustomer {
    const KIND: ResourceKind;

    /// Provider id of this object.
    fn resource_id(&self) -> &str;

    /// Customer the object belongs to, if attached.
    fn owner_ref(&self) -> Option<&str>;

    fn is_owned_by(&self, user: &LocalUser) -> bool {
        user.owns(self.owner_ref())
    }

    /// Fails with `WrongCustomer` unless `user` owns this object.
    fn check_ownership(&self, user: &LocalUser) -> Result<(), BillingError> {
        if self.is_owned_by(user) {
            Ok(())
        } else {
            Err(BillingError::wrong_customer(Self::KIND, self.resource_id()))
        }
    }
}

impl OwnedByCustomer for Customer {
    const KIND: ResourceKind = ResourceKind::Customer;

    fn resource_id(&self) -> &str {
        &self.id
    }

    fn owner_ref(&self) -> Option<&str> {
        Some(&self.id)
    }
}

impl OwnedByCustomer for PaymentMethod {
    const KIND: ResourceKind = ResourceKind::PaymentMethod;

    fn resource_id(&self) -> &str {
        &self.id
    }

    fn owner_ref(&self) -> Option<&str> {
        self.customer.as_deref()
    }
}

impl OwnedByCustomer for Subscription {
    const KIND: ResourceKind = ResourceKind::Subscription;

    fn resource_id(&self) -> &str {
        &self.id
    }

    fn owner_ref(&self) -> Option<&str> {
        Some(&self.customer)
    }
}

impl OwnedByCustomer for Invoice {
    const KIND: ResourceKind = ResourceKind::Invoice;

    fn resource_id(&self) -> &str {
        &self.id
    }

    fn owner_ref(&self) -> Option<&str> {
        self.customer.as_deref()
    }
}

impl OwnedByCustomer for SetupIntent {
    const KIND: ResourceKind = ResourceKind::SetupIntent;

    fn resource_id(&self) -> &str {
        &self.id
    }

    fn owner_ref(&self) -> Option<&str> {
        self.customer.as_deref()
    }
}

impl OwnedByCustomer for CheckoutSession {
    const KIND: ResourceKind = ResourceKind::CheckoutSession;

    fn resource_id(&self) -> &str {
        &self.id
    }

    fn owner_ref(&self) -> Option<&str> {
        self.customer.as_deref()
    }
}
