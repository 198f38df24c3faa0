//! Local user record and caller identity.
//!
//! The host application owns its users; this crate only reads the fields
//! it needs and writes `customer_ref` once, lazily.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{CustomerRef, Timestamp, UserId};

/// The subset of a host user record that billing cares about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalUser {
    pub id: UserId,
    pub email: String,
    pub first_name: String,
    pub last_name: String,

    /// False for deactivated accounts; such users cannot bill.
    pub is_authenticated: bool,

    /// Remote customer id; set at most once by customer synchronization.
    pub customer_ref: Option<CustomerRef>,

    /// Operator-granted free access, checked before any remote lookup.
    pub allowed_access_until: Option<Timestamp>,
}

impl LocalUser {
    /// Creates an authenticated user without a remote customer.
    pub fn new(
        id: UserId,
        email: impl Into<String>,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
    ) -> Self {
        Self {
            id,
            email: email.into(),
            first_name: first_name.into(),
            last_name: last_name.into(),
            is_authenticated: true,
            customer_ref: None,
            allowed_access_until: None,
        }
    }

    pub fn with_customer_ref(mut self, customer_ref: CustomerRef) -> Self {
        self.customer_ref = Some(customer_ref);
        self
    }

    pub fn with_allowed_access_until(mut self, until: Timestamp) -> Self {
        self.allowed_access_until = Some(until);
        self
    }

    /// Whether the manual access window is open at `now`.
    pub fn has_free_access_at(&self, now: &Timestamp) -> bool {
        self.allowed_access_until
            .map(|until| !until.is_before(now))
            .unwrap_or(false)
    }

    /// Whether `customer_ref` equals this user's customer.
    pub fn owns(&self, customer_ref: Option<&str>) -> bool {
        match (&self.customer_ref, customer_ref) {
            (Some(mine), Some(theirs)) => mine == theirs,
            _ => false,
        }
    }
}

/// Human readable customer description: first and last name.
pub fn user_description(user: &LocalUser) -> String {
    format!("{} {}", user.first_name, user.last_name)
        .trim()
        .to_string()
}

/// Fields of a user record that a save may touch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserField {
    Email,
    FirstName,
    LastName,
    CustomerRef,
    AllowedAccessUntil,
}

impl UserField {
    /// Fields mirrored onto the remote customer.
    pub const CUSTOMER_DETAILS: [UserField; 3] =
        [UserField::Email, UserField::FirstName, UserField::LastName];

    /// Database column name.
    pub fn column(&self) -> &'static str {
        match self {
            UserField::Email => "email",
            UserField::FirstName => "first_name",
            UserField::LastName => "last_name",
            UserField::CustomerRef => "customer_ref",
            UserField::AllowedAccessUntil => "allowed_access_until",
        }
    }

    pub fn is_customer_detail(&self) -> bool {
        Self::CUSTOMER_DETAILS.contains(self)
    }
}

/// Identity carried by a bearer token: only the user id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPrincipal {
    pub user_id: UserId,
}

/// Whoever is making the call.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Principal {
    #[default]
    Anonymous,
    User(LocalUser),
    Token(TokenPrincipal),
}

impl Principal {
    pub fn is_anonymous(&self) -> bool {
        matches!(self, Principal::Anonymous)
    }
}

impl From<LocalUser> for Principal {
    fn from(user: LocalUser) -> Self {
        Principal::User(user)
    }
}

impl From<TokenPrincipal> for Principal {
    fn from(token: TokenPrincipal) -> Self {
        Principal::Token(token)
    }
}

#[cfg(test)]
pub(crate) fn test_user(id: &str) -> LocalUser {
    LocalUser::new(
        UserId::new(id).unwrap(),
        format!("{}@example.com", id),
        "Ada",
        "Lovelace",
    )
}
