//! Authentication adapters implementing `SessionValidator`.
//!
//! - `jwt` - HS256 tokens signed by the host application
//! - `mock` - Fixed token table for tests

mod jwt;
mod mock;

pub use jwt::{AccessClaims, JwtSessionValidator};
pub use mock::MockSessionValidator;
