//! Domain layer.
//!
//! Pure types with no I/O. Everything that talks to the payments
//! provider, the user store or a cache goes through `crate::ports`.

pub mod billing;
pub mod foundation;
