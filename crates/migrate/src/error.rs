//! Error types for the migration engine
//!
//! Every failure a command can hit is one variant of [`MigrateError`].
//! Backend failures keep the offending script and whatever position the
//! database reported, step failures keep the migration name and direction.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for migration operations
pub type MigrateResult<T> = Result<T, MigrateError>;

/// Direction of a single migration step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Running the apply script and recording the migration
    Apply,
    /// Running the revert script and removing the record
    Revert,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Apply => write!(f, "applying"),
            Phase::Revert => write!(f, "reverting"),
        }
    }
}

/// Error types for migration operations
#[derive(Debug, Error)]
pub enum MigrateError {
    /// No driver registered under the requested provider name
    #[error("database driver: unknown driver {provider}")]
    UnknownDriver { provider: String },

    /// The backend could not be reached
    #[error("failed to connect to {provider} database: {message}")]
    Connection { provider: String, message: String },

    /// The tracking table could not be verified or created
    #[error("failed to ensure migrations table \"{table}\": {message}")]
    SchemaSetup { table: String, message: String },

    /// The migrations directory could not be listed
    #[error("failed to scan migrations folder {}: {source}", path.display())]
    SourceScan {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A listed migration file could not be read
    #[error("failed to read migration file {name}: {source}")]
    MigrationRead {
        name: String,
        #[source]
        source: std::io::Error,
    },

    /// A migration file is missing one of its section markers
    #[error("could not find \"{marker}\" in migration file {name}")]
    MalformedMigration { name: String, marker: &'static str },

    /// A migration script was rejected by the backend
    #[error(transparent)]
    Execution(#[from] ScriptError),

    /// The tracking table could not be updated
    #[error("failed to update migration record {name}: {message}")]
    StateUpdate { name: String, message: String },

    /// One or more resources failed to close
    #[error("failed to close connection: {}", failures.join("; "))]
    Close { failures: Vec<String> },

    /// A migration step failed; wraps the underlying cause
    #[error("migration {name} failed while {phase}: {source}")]
    Step {
        name: String,
        phase: Phase,
        #[source]
        source: Box<MigrateError>,
    },

    /// Invalid connection string, tracking table name or migration name
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Filesystem error outside of scanning and reading migrations
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl MigrateError {
    /// Wrap an error with the migration and phase it happened in
    pub fn step(name: impl Into<String>, phase: Phase, source: MigrateError) -> Self {
        MigrateError::Step {
            name: name.into(),
            phase,
            source: Box::new(source),
        }
    }

    /// The innermost error, skipping `Step` wrappers
    pub fn root(&self) -> &MigrateError {
        match self {
            MigrateError::Step { source, .. } => source.root(),
            other => other,
        }
    }
}

/// A migration script failed against the backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptError {
    /// The script text as handed to the driver
    pub script: String,
    /// Line inside the script, when the backend reports a position
    pub line: Option<u32>,
    /// Native diagnostic message
    pub message: String,
    /// Extra diagnostic detail (hint, procedure name, error code)
    pub detail: Option<String>,
}

impl ScriptError {
    pub fn new(script: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            script: script.into(),
            line: None,
            message: message.into(),
            detail: None,
        }
    }

    pub fn with_line(mut self, line: u32) -> Self {
        self.line = Some(line);
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

impl fmt::Display for ScriptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(line) = self.line {
            write!(f, " in line {}", line)?;
        }
        write!(f, ": {}", self.script.trim())?;
        if let Some(detail) = &self.detail {
            write!(f, " (details: {})", detail)?;
        }
        Ok(())
    }
}

impl std::error::Error for ScriptError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_script_error_display() {
        let err = ScriptError::new("CREATE TABLE users (;\n", "syntax error at or near \";\"")
            .with_line(1)
            .with_detail("code 42601");

        assert_eq!(
            err.to_string(),
            "syntax error at or near \";\" in line 1: CREATE TABLE users (; (details: code 42601)"
        );

        let bare = ScriptError::new("DROP TABLE users;", "table does not exist");
        assert_eq!(bare.to_string(), "table does not exist: DROP TABLE users;");
    }

    #[test]
    fn test_step_error_names_migration_and_phase() {
        let err = MigrateError::step(
            "20230103000000-c.sql",
            Phase::Apply,
            ScriptError::new("BROKEN", "boom").into(),
        );

        let message = err.to_string();
        assert!(message.contains("20230103000000-c.sql"));
        assert!(message.contains("applying"));
        assert!(matches!(err.root(), MigrateError::Execution(_)));
    }

    #[test]
    fn test_close_error_aggregates_failures() {
        let err = MigrateError::Close {
            failures: vec!["conn: reset".to_string(), "pool: timeout".to_string()],
        };
        assert_eq!(err.to_string(), "failed to close connection: conn: reset; pool: timeout");
    }
}
