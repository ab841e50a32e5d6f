//! Driver Contract
//!
//! Every database backend implements [`DriverFactory`] (URL construction and
//! opening) and hands out [`Driver`] instances (one live session each). The
//! reconciliation and execution logic only ever talks to these two traits;
//! backend SQL dialects stay behind them.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;
use url::Url;

use crate::error::{MigrateError, MigrateResult};

/// Default name of the tracking table
pub const DEFAULT_MIGRATIONS_TABLE: &str = "schema_migrations";

/// Default name of the tracking table's name column
pub const DEFAULT_NAME_COLUMN: &str = "name";

/// Query parameter overriding the tracking table name
pub const MIGRATIONS_TABLE_PARAM: &str = "x-migrations-table";

/// Query parameter overriding the tracking column name
pub const NAME_COLUMN_PARAM: &str = "x-name-column";

static IDENTIFIER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]{0,62}$").expect("identifier pattern is valid")
});

/// Live session against one database
///
/// Obtained from [`DriverFactory::open`], which has already ensured the
/// tracking table exists. Instances are owned by exactly one command and
/// must be released with [`Driver::close`].
#[async_trait]
pub trait Driver: Send {
    /// Provider name this driver was opened for
    fn provider(&self) -> &str;

    /// Execute one script as a single unit
    async fn run(&mut self, script: &str) -> MigrateResult<()>;

    /// All recorded migration names, ascending
    async fn applied_migrations(&mut self) -> MigrateResult<Vec<String>>;

    /// Record a migration as applied
    async fn mark_applied(&mut self, name: &str) -> MigrateResult<()>;

    /// Delete a migration record; a missing record is not an error
    async fn remove_applied(&mut self, name: &str) -> MigrateResult<()>;

    /// Release the session and everything it holds
    async fn close(self: Box<Self>) -> MigrateResult<()>;
}

/// Backend entry point stored in the [`DriverRegistry`](crate::registry::DriverRegistry)
#[async_trait]
pub trait DriverFactory: Send + Sync {
    /// Build a connection URL from structured parameters, filling
    /// provider defaults for empty fields
    fn build_url(&self, params: &ConnectionParams) -> MigrateResult<Url>;

    /// Connect and ensure the tracking table exists
    ///
    /// `url` has already been stripped of engine-reserved parameters.
    async fn open(&self, url: &Url, tracking: &TrackingTable) -> MigrateResult<Box<dyn Driver>>;
}

/// Where applied migrations are recorded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackingTable {
    table: String,
    column: String,
}

impl TrackingTable {
    /// Create a tracking table description, validating both identifiers
    pub fn new(table: impl Into<String>, column: impl Into<String>) -> MigrateResult<Self> {
        let table = table.into();
        let column = column.into();

        for identifier in [&table, &column] {
            if !IDENTIFIER.is_match(identifier) {
                return Err(MigrateError::Configuration(format!(
                    "invalid tracking table identifier \"{}\"",
                    identifier
                )));
            }
        }

        Ok(Self { table, column })
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn column(&self) -> &str {
        &self.column
    }

    /// Whether this is the default `schema_migrations(name)` layout
    pub fn is_default(&self) -> bool {
        self.table == DEFAULT_MIGRATIONS_TABLE && self.column == DEFAULT_NAME_COLUMN
    }

    /// `SchemaSetup` error for this table
    ///
    /// Backends report every failure to verify or read the tracking table
    /// through this, whether it happens while opening or afterwards.
    pub fn setup_error(&self, message: impl fmt::Display) -> MigrateError {
        MigrateError::SchemaSetup {
            table: self.table.clone(),
            message: message.to_string(),
        }
    }

    /// `SchemaSetup` error for a configured column the table does not have
    pub fn missing_column(&self) -> MigrateError {
        self.setup_error(format!(
            "column \"{}\" does not exist; the table was created with a different name column",
            self.column
        ))
    }
}

impl Default for TrackingTable {
    fn default() -> Self {
        Self {
            table: DEFAULT_MIGRATIONS_TABLE.to_string(),
            column: DEFAULT_NAME_COLUMN.to_string(),
        }
    }
}

/// Structured connection fields, used to build a connection URL
#[derive(Debug, Clone, Default)]
pub struct ConnectionParams {
    pub user: String,
    pub password: String,
    pub database: String,
    pub host: String,
    pub port: Option<u16>,
    pub provider: String,
    pub migrations_table: Option<String>,
    pub name_column: Option<String>,
}

impl ConnectionParams {
    /// Tracking table requested by these parameters
    pub fn tracking(&self) -> MigrateResult<TrackingTable> {
        TrackingTable::new(
            self.migrations_table
                .as_deref()
                .filter(|t| !t.is_empty())
                .unwrap_or(DEFAULT_MIGRATIONS_TABLE),
            self.name_column
                .as_deref()
                .filter(|c| !c.is_empty())
                .unwrap_or(DEFAULT_NAME_COLUMN),
        )
    }

    /// Append tracking overrides to a built URL as reserved parameters
    ///
    /// Backends call this at the end of [`DriverFactory::build_url`].
    pub fn append_tracking(&self, url: &mut Url) -> MigrateResult<()> {
        let tracking = self.tracking()?;
        if tracking.is_default() {
            return Ok(());
        }

        let mut pairs = url.query_pairs_mut();
        if tracking.table() != DEFAULT_MIGRATIONS_TABLE {
            pairs.append_pair(MIGRATIONS_TABLE_PARAM, tracking.table());
        }
        if tracking.column() != DEFAULT_NAME_COLUMN {
            pairs.append_pair(NAME_COLUMN_PARAM, tracking.column());
        }
        Ok(())
    }
}

/// Value of a field, or the provider default when it is empty
pub(crate) fn or_default<'a>(value: &'a str, default: &'a str) -> &'a str {
    if value.is_empty() {
        default
    } else {
        value
    }
}

/// 1-based line of a 1-based character position inside `script`
pub(crate) fn line_of_position(script: &str, position: usize) -> u32 {
    let newlines = script
        .chars()
        .take(position.saturating_sub(1))
        .filter(|c| *c == '\n')
        .count();
    (newlines + 1) as u32
}
