//! Migration Manager - File system operations for migrations
//!
//! Lists candidate migration files and reads them on demand. Listing never
//! opens a file; contents are only read when a migration is about to run.

use std::fs;
use std::path::{Path, PathBuf};

use super::definitions::{MigrationName, MigrationScript};
use super::parser;
use crate::error::{MigrateError, MigrateResult};

/// Suffix a file needs to be considered a migration
pub const MIGRATION_EXTENSION: &str = ".sql";

/// Migration source bound to one directory
#[derive(Debug, Clone)]
pub struct MigrationManager {
    migrations_dir: PathBuf,
}

impl MigrationManager {
    pub fn new(migrations_dir: impl Into<PathBuf>) -> Self {
        Self {
            migrations_dir: migrations_dir.into(),
        }
    }

    pub fn migrations_dir(&self) -> &Path {
        &self.migrations_dir
    }

    /// Names of `*.sql` files directly inside the directory
    ///
    /// Order is whatever the filesystem yields; callers sort.
    pub fn list_migrations(&self) -> MigrateResult<Vec<MigrationName>> {
        let scan_error = |source| MigrateError::SourceScan {
            path: self.migrations_dir.clone(),
            source,
        };

        let mut names = Vec::new();
        for entry in fs::read_dir(&self.migrations_dir).map_err(scan_error)? {
            let entry = entry.map_err(scan_error)?;
            if !entry.path().is_file() {
                continue;
            }

            match entry.file_name().into_string() {
                Ok(name) if name.ends_with(MIGRATION_EXTENSION) => names.push(name),
                Ok(_) => {}
                Err(raw) => {
                    tracing::warn!(file = ?raw, "skipping migration file with a non UTF-8 name");
                }
            }
        }

        Ok(names)
    }

    /// Read and parse one migration file
    pub fn read_migration(&self, name: &str) -> MigrateResult<MigrationScript> {
        let contents = fs::read_to_string(self.migrations_dir.join(name)).map_err(|source| {
            MigrateError::MigrationRead {
                name: name.to_string(),
                source,
            }
        })?;

        parser::parse(&contents, name)
    }
}
