//! Migration Definitions - Core types shared by the migration system
//!
//! Defines the parsed script pair, the engine configuration and the reports
//! returned by `run`, `undo` and `status`.

use serde::Serialize;
use std::path::PathBuf;

/// Migration identifier: the file name, e.g. `20230101120000-add-users.sql`
///
/// The fixed-width timestamp prefix makes byte-wise order chronological.
pub type MigrationName = String;

/// Apply and revert halves of one migration file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationScript {
    /// Text between the `BEGIN -- UP` and `END -- UP` markers
    pub up: String,
    /// Text between the `BEGIN -- DOWN` and `END -- DOWN` markers
    pub down: String,
}

/// Configuration supplied by the invoking command
#[derive(Debug, Clone)]
pub struct MigrationConfig {
    /// Connection string; its scheme selects the driver
    pub url: String,
    /// Directory holding the `.sql` migration files
    pub migrations_dir: PathBuf,
}

impl MigrationConfig {
    pub fn new(url: impl Into<String>, migrations_dir: impl Into<PathBuf>) -> Self {
        Self {
            url: url.into(),
            migrations_dir: migrations_dir.into(),
        }
    }
}

/// Result of running migrations
#[derive(Debug, Clone, Default, Serialize)]
pub struct MigrationRunResult {
    /// Names of migrations applied by this run, in order
    pub applied_migrations: Vec<MigrationName>,
    /// Number of migrations found already applied
    pub skipped_count: usize,
    /// Total execution time in milliseconds
    pub execution_time_ms: u128,
}

impl MigrationRunResult {
    /// Whether the database was already up to date
    pub fn is_up_to_date(&self) -> bool {
        self.applied_migrations.is_empty()
    }
}

/// Result of rolling back migrations
#[derive(Debug, Clone, Default, Serialize)]
pub struct RollbackResult {
    /// Names of migrations reverted, most recent first
    pub rolled_back_migrations: Vec<MigrationName>,
    /// Total execution time in milliseconds
    pub execution_time_ms: u128,
}

/// How many applied migrations an undo reverts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RollbackScope {
    /// Only the most recently applied migration
    Last,
    /// Every applied migration, newest first
    All,
}

impl From<bool> for RollbackScope {
    /// `true` means revert everything
    fn from(all: bool) -> Self {
        if all {
            RollbackScope::All
        } else {
            RollbackScope::Last
        }
    }
}

/// Migration state as seen by `status`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MigrationState {
    /// Recorded in the tracking table and present on disk
    Applied,
    /// Present on disk, not recorded
    Pending,
    /// Recorded, but the file is gone
    MissingLocal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationStatus {
    pub name: MigrationName,
    pub state: MigrationState,
}
