//! Database Backend Implementations
//!
//! Each backend implements the [`DriverFactory`](crate::driver::DriverFactory)
//! contract and registers itself under one or more provider names.

pub mod memory;
pub mod postgres;
pub mod sqlite;

pub use memory::{MemoryDatabase, MemoryDriverFactory};
pub use postgres::PostgresDriverFactory;
pub use sqlite::SqliteDriverFactory;

use crate::registry::DriverRegistry;

/// Register every bundled backend that talks to a real database
///
/// The in-memory backend is left out; register it explicitly where needed.
pub fn register_builtin(registry: &DriverRegistry) {
    postgres::register(registry);
    sqlite::register(registry);
}
