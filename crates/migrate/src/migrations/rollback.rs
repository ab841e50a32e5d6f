//! Migration Rollback - Handles rolling back applied migrations
//!
//! Reverts start at the most recently applied migration and walk backward,
//! running each revert script and then dropping its record.

use async_trait::async_trait;
use std::time::Instant;

use super::definitions::{RollbackResult, RollbackScope};
use super::runner::{release, MigrationRunner};
use crate::driver::Driver;
use crate::error::{MigrateError, MigrateResult, Phase};

/// Extension trait for MigrationRunner to add rollback functionality
#[async_trait]
pub trait MigrationRollback {
    /// Revert the last migration, or every applied one for [`RollbackScope::All`]
    async fn rollback(&self, scope: RollbackScope) -> MigrateResult<RollbackResult>;

    /// Revert the most recently applied migration
    async fn rollback_last(&self) -> MigrateResult<RollbackResult>;

    /// Revert all applied migrations, newest first
    async fn rollback_all(&self) -> MigrateResult<RollbackResult>;
}

#[async_trait]
impl MigrationRollback for MigrationRunner {
    async fn rollback(&self, scope: RollbackScope) -> MigrateResult<RollbackResult> {
        let start_time = Instant::now();

        let mut driver = self.connect().await?;
        let outcome = revert_applied(self, driver.as_mut(), scope).await;
        let rolled_back_migrations = release(driver, outcome).await?;

        if rolled_back_migrations.is_empty() {
            tracing::info!("No executed migrations found.");
        }

        Ok(RollbackResult {
            rolled_back_migrations,
            execution_time_ms: start_time.elapsed().as_millis(),
        })
    }

    async fn rollback_last(&self) -> MigrateResult<RollbackResult> {
        self.rollback(RollbackScope::Last).await
    }

    async fn rollback_all(&self) -> MigrateResult<RollbackResult> {
        self.rollback(RollbackScope::All).await
    }
}

async fn revert_applied(
    runner: &MigrationRunner,
    driver: &mut dyn Driver,
    scope: RollbackScope,
) -> MigrateResult<Vec<String>> {
    let mut applied = driver.applied_migrations().await?;
    applied.sort();

    let count = match scope {
        RollbackScope::Last => applied.len().min(1),
        RollbackScope::All => applied.len(),
    };

    let mut reverted = Vec::with_capacity(count);
    for name in applied.into_iter().rev().take(count) {
        revert_migration(runner, driver, &name)
            .await
            .map_err(|e| MigrateError::step(name.as_str(), Phase::Revert, e))?;
        reverted.push(name);
    }

    Ok(reverted)
}

async fn revert_migration(
    runner: &MigrationRunner,
    driver: &mut dyn Driver,
    name: &str,
) -> MigrateResult<()> {
    tracing::info!(migration = name, "reverting");
    let start_time = Instant::now();

    let script = runner.manager().read_migration(name)?;
    driver.run(&script.down).await?;
    driver.remove_applied(name).await?;

    tracing::info!(
        migration = name,
        elapsed_ms = start_time.elapsed().as_millis() as u64,
        "reverted"
    );
    Ok(())
}
