//! Billing Gate - Customer-scoped billing over the Stripe API
//!
//! Lets a web application model subscriptions, checkout sessions, payment
//! methods and invoices for its local users. A local user is joined to a
//! remote Stripe customer through a stored customer reference, created
//! lazily on first use. Every remote object is checked against the
//! caller's customer before it is returned, changed or deleted.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
