//! Stripe payments adapter.
//!
//! - `StripeClient` - `PaymentsClient` over the Stripe REST API
//! - `MockPaymentsClient` - in-memory stand-in with call tracking
//!
//! The secret key is held as `secrecy::SecretString` and only exposed
//! when a request is signed.

mod mock_payments_client;
mod stripe_client;

pub use mock_payments_client::{MethodCall, MockPaymentsClient};
pub use stripe_client::{StripeClient, StripeConfig};
