//! User store adapters.

mod in_memory;
mod postgres;

pub use in_memory::InMemoryUserStore;
pub use postgres::PostgresUserStore;
