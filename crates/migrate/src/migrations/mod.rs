//! Migration System
//!
//! File discovery, parsing, reconciliation and the run/undo/status
//! orchestration built on top of the driver contract.

pub mod definitions;
pub mod manager;
pub mod parser;
pub mod reconcile;
pub mod rollback;
pub mod runner;
pub mod scaffold;

pub use definitions::*;
pub use manager::MigrationManager;
pub use rollback::MigrationRollback;
pub use runner::MigrationRunner;
pub use scaffold::{new_migration, new_migration_at};

use std::sync::Arc;

use crate::error::MigrateResult;
use crate::registry::DriverRegistry;

/// Apply every pending migration using the built-in drivers
pub async fn run_migrations(config: &MigrationConfig) -> MigrateResult<MigrationRunResult> {
    MigrationRunner::new(Arc::new(DriverRegistry::with_builtin()), config.clone())
        .run_migrations()
        .await
}

/// Revert the last migration, or all of them when `all` is set
pub async fn revert_migration(all: bool, config: &MigrationConfig) -> MigrateResult<RollbackResult> {
    MigrationRunner::new(Arc::new(DriverRegistry::with_builtin()), config.clone())
        .rollback(RollbackScope::from(all))
        .await
}
