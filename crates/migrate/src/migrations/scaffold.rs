//! Migration file scaffolding

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::PathBuf;

use super::definitions::MigrationConfig;
use super::parser::{BEGIN_DOWN, BEGIN_UP, END_DOWN, END_UP};
use crate::error::{MigrateError, MigrateResult};

static NON_SLUG_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^a-z0-9]+").expect("valid slug pattern"));

/// Lowercase `name` and collapse everything but ASCII alphanumerics to `-`
pub fn slugify(name: &str) -> String {
    NON_SLUG_CHARS
        .replace_all(&name.to_lowercase(), "-")
        .trim_matches('-')
        .to_string()
}

/// `<YYYYMMDDHHMMSS>-<slug>.sql`
pub fn migration_file_name(slug: &str, created_at: DateTime<Utc>) -> String {
    format!("{}-{}.sql", created_at.format("%Y%m%d%H%M%S"), slug)
}

/// Body written into every new migration file
pub fn migration_template() -> String {
    format!(
        "-- Add altering commands between the UP markers.\n\
         --\n\
         -- Example:\n\
         -- CREATE TABLE users (\n\
         --   user_id INT,\n\
         --   last_name VARCHAR(255),\n\
         --   first_name VARCHAR(255),\n\
         --   created_at TIMESTAMPTZ\n\
         -- );\n\
         {}\n\
         \n\
         {}\n\
         \n\
         -- Add reverting commands between the DOWN markers.\n\
         --\n\
         -- Example:\n\
         -- DROP TABLE users;\n\
         {}\n\
         \n\
         {}\n",
        BEGIN_UP, END_UP, BEGIN_DOWN, END_DOWN
    )
}

/// Create a new, empty migration file and return its path
pub fn new_migration(name: &str, config: &MigrationConfig) -> MigrateResult<PathBuf> {
    new_migration_at(name, config, Utc::now())
}

/// Create a new migration file stamped with `created_at`
///
/// An existing file with the same name is never overwritten.
pub fn new_migration_at(
    name: &str,
    config: &MigrationConfig,
    created_at: DateTime<Utc>,
) -> MigrateResult<PathBuf> {
    let slug = slugify(name);
    if slug.is_empty() {
        return Err(MigrateError::Configuration(format!(
            "invalid migration name \"{}\"",
            name
        )));
    }

    fs::create_dir_all(&config.migrations_dir)?;
    let path = config
        .migrations_dir
        .join(migration_file_name(&slug, created_at));

    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&path)
        .map_err(|e| match e.kind() {
            ErrorKind::AlreadyExists => MigrateError::Configuration(format!(
                "migration file {} already exists",
                path.display()
            )),
            _ => MigrateError::Io(e),
        })?;
    file.write_all(migration_template().as_bytes())?;

    tracing::debug!(path = %path.display(), "created migration file");
    Ok(path)
}
