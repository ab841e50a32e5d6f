//! Migration Runner - Executes migrations against the database
//!
//! One invocation opens one driver session, works through the pending
//! migrations strictly in order and closes the session on every exit path.
//! A failing step stops the run; steps already completed stay applied.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use super::definitions::{MigrationConfig, MigrationRunResult, MigrationStatus};
use super::manager::MigrationManager;
use super::reconcile;
use crate::connection;
use crate::driver::Driver;
use crate::error::{MigrateError, MigrateResult, Phase};
use crate::registry::DriverRegistry;

/// Migration runner bound to one configuration
pub struct MigrationRunner {
    registry: Arc<DriverRegistry>,
    manager: MigrationManager,
    config: MigrationConfig,
}

impl MigrationRunner {
    /// Create a new migration runner
    pub fn new(registry: Arc<DriverRegistry>, config: MigrationConfig) -> Self {
        Self {
            registry,
            manager: MigrationManager::new(config.migrations_dir.clone()),
            config,
        }
    }

    /// Get the migration manager
    pub fn manager(&self) -> &MigrationManager {
        &self.manager
    }

    pub fn config(&self) -> &MigrationConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<DriverRegistry> {
        &self.registry
    }

    /// Open a driver session for the configured connection string
    pub async fn connect(&self) -> MigrateResult<Box<dyn Driver>> {
        connection::open(&self.registry, &self.config.url).await
    }

    /// Run all pending migrations
    pub async fn run_migrations(&self) -> MigrateResult<MigrationRunResult> {
        let start_time = Instant::now();

        let mut driver = self.connect().await?;
        let outcome = self.apply_pending(driver.as_mut()).await;
        let (applied_migrations, skipped_count) = release(driver, outcome).await?;

        if applied_migrations.is_empty() {
            tracing::info!("Database is already up to date");
        }

        Ok(MigrationRunResult {
            applied_migrations,
            skipped_count,
            execution_time_ms: start_time.elapsed().as_millis(),
        })
    }

    /// State of every known migration, without touching the database
    pub async fn status(&self) -> MigrateResult<Vec<MigrationStatus>> {
        let mut driver = self.connect().await?;
        let outcome = self.load_status(driver.as_mut()).await;
        release(driver, outcome).await
    }

    async fn apply_pending(&self, driver: &mut dyn Driver) -> MigrateResult<(Vec<String>, usize)> {
        let applied = driver.applied_migrations().await?;
        let available = self.manager.list_migrations()?;

        for name in reconcile::missing_local(&applied, &available) {
            tracing::warn!(migration = %name, "applied migration not found in migrations folder");
        }

        let applied: HashSet<String> = applied.into_iter().collect();
        let pending = reconcile::pending(&applied, &available);
        tracing::debug!(
            applied = applied.len(),
            pending = pending.len(),
            "reconciled migrations"
        );

        let mut applied_now = Vec::with_capacity(pending.len());
        for name in pending {
            self.apply_migration(driver, &name)
                .await
                .map_err(|e| MigrateError::step(name.as_str(), Phase::Apply, e))?;
            applied_now.push(name);
        }

        Ok((applied_now, applied.len()))
    }

    /// Run one apply script and record it
    async fn apply_migration(&self, driver: &mut dyn Driver, name: &str) -> MigrateResult<()> {
        tracing::info!(migration = name, "migrating");
        let start_time = Instant::now();

        let script = self.manager.read_migration(name)?;
        driver.run(&script.up).await?;
        driver.mark_applied(name).await?;

        tracing::info!(
            migration = name,
            elapsed_ms = start_time.elapsed().as_millis() as u64,
            "migrated"
        );
        Ok(())
    }

    async fn load_status(&self, driver: &mut dyn Driver) -> MigrateResult<Vec<MigrationStatus>> {
        let applied = driver.applied_migrations().await?;
        let available = self.manager.list_migrations()?;
        Ok(reconcile::status(&applied, &available))
    }
}

/// Close `driver` and return `outcome`
///
/// A step failure takes precedence over a close failure; the latter is
/// only logged in that case.
pub(crate) async fn release<T>(
    driver: Box<dyn Driver>,
    outcome: MigrateResult<T>,
) -> MigrateResult<T> {
    let provider = driver.provider().to_string();
    match (outcome, driver.close().await) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(e)) | (Err(e), Ok(())) => Err(e),
        (Err(e), Err(close_err)) => {
            tracing::warn!(provider = %provider, error = %close_err, "failed to close connection");
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::memory::{self, MemoryDatabase};
    use std::fs;
    use tempfile::TempDir;

    fn migration(up: &str, down: &str) -> String {
        format!("BEGIN -- UP\n{}\nEND -- UP\nBEGIN -- DOWN\n{}\nEND -- DOWN\n", up, down)
    }

    fn runner(database: &MemoryDatabase, dir: &TempDir) -> MigrationRunner {
        let registry = DriverRegistry::new();
        memory::register(&registry, database.clone());
        MigrationRunner::new(
            Arc::new(registry),
            MigrationConfig::new("memory://test", dir.path()),
        )
    }

    #[tokio::test]
    async fn test_run_migrations_passes_blank_apply_script_verbatim() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("20230101000000-a.sql"), migration("  ", "DROP a;")).unwrap();
        let database = MemoryDatabase::new();

        let result = runner(&database, &dir).run_migrations().await.unwrap();

        assert_eq!(result.applied_migrations, vec!["20230101000000-a.sql"]);
        assert_eq!(database.executed_scripts(), vec!["\n  \n"]);
        assert_eq!(database.applied(), vec!["20230101000000-a.sql"]);
    }

    #[tokio::test]
    async fn test_run_migrations_ignores_missing_local_files() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("20230102000000-b.sql"), migration("CREATE b;", "DROP b;")).unwrap();
        let database = MemoryDatabase::with_applied(["20230101000000-gone.sql"]);

        let result = runner(&database, &dir).run_migrations().await.unwrap();

        assert_eq!(result.applied_migrations, vec!["20230102000000-b.sql"]);
        assert_eq!(result.skipped_count, 1);
        assert_eq!(
            database.applied(),
            vec!["20230101000000-gone.sql", "20230102000000-b.sql"]
        );
    }

    #[tokio::test]
    async fn test_source_scan_failure_closes_connection() {
        let dir = TempDir::new().unwrap();
        let database = MemoryDatabase::new();
        let registry = DriverRegistry::new();
        memory::register(&registry, database.clone());
        let runner = MigrationRunner::new(
            Arc::new(registry),
            MigrationConfig::new("memory://test", dir.path().join("missing")),
        );

        let err = runner.run_migrations().await.unwrap_err();

        assert!(matches!(err, MigrateError::SourceScan { .. }));
        assert_eq!(database.total_sessions(), 1);
        assert_eq!(database.open_sessions(), 0);
    }

    #[tokio::test]
    async fn test_status_reports_every_state() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("20230101000000-a.sql"), migration("CREATE a;", "DROP a;")).unwrap();
        fs::write(dir.path().join("20230103000000-c.sql"), migration("CREATE c;", "DROP c;")).unwrap();
        let database =
            MemoryDatabase::with_applied(["20230101000000-a.sql", "20230102000000-b.sql"]);

        let status = runner(&database, &dir).status().await.unwrap();

        let states: Vec<_> = status.iter().map(|s| (s.name.as_str(), s.state)).collect();
        assert_eq!(
            states,
            vec![
                ("20230101000000-a.sql", crate::migrations::MigrationState::Applied),
                ("20230102000000-b.sql", crate::migrations::MigrationState::MissingLocal),
                ("20230103000000-c.sql", crate::migrations::MigrationState::Pending),
            ]
        );
        assert!(database.executed_scripts().is_empty());
        assert_eq!(database.open_sessions(), 0);
    }
}
