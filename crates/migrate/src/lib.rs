//! # sqltrail-migrate: versioned SQL schema migrations
//!
//! Applies and reverts hand-written `.sql` migration files against a
//! database, recording applied migration names in a tracking table.
//!
//! Backends plug in through the [`Driver`] contract and are looked up by
//! connection-string scheme in a [`DriverRegistry`]. PostgreSQL and SQLite
//! ship with the crate; an in-memory backend serves tests and embedding.
//!
//! ```no_run
//! use sqltrail_migrate::{run_migrations, MigrationConfig};
//!
//! # async fn example() -> sqltrail_migrate::MigrateResult<()> {
//! let config = MigrationConfig::new("sqlite://app.db", "migrations");
//! let result = run_migrations(&config).await?;
//! println!("applied {} migrations", result.applied_migrations.len());
//! # Ok(())
//! # }
//! ```

pub mod backends;
pub mod connection;
pub mod driver;
pub mod error;
pub mod migrations;
pub mod registry;

pub use connection::{build_url, ConnectionTarget};
pub use driver::{ConnectionParams, Driver, DriverFactory, TrackingTable};
pub use error::{MigrateError, MigrateResult, Phase, ScriptError};
pub use migrations::*;
pub use registry::DriverRegistry;
