//! SQLite Backend Implementation
//!
//! One sqlx `SqliteConnection` per session; the database file is created on
//! first use.

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection};
use sqlx::{ConnectOptions, Connection, Executor};
use std::str::FromStr;
use std::sync::Arc;
use url::Url;

use crate::driver::{or_default, ConnectionParams, Driver, DriverFactory, TrackingTable};
use crate::error::{MigrateError, MigrateResult, ScriptError};
use crate::registry::DriverRegistry;

pub const PROVIDER: &str = "sqlite";

const DEFAULT_DATABASE: &str = "sqltrail.db";

pub fn register(registry: &DriverRegistry) {
    registry.register(PROVIDER, Arc::new(SqliteDriverFactory::new()));
}

/// SQLite driver factory
#[derive(Debug, Default)]
pub struct SqliteDriverFactory;

impl SqliteDriverFactory {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl DriverFactory for SqliteDriverFactory {
    fn build_url(&self, params: &ConnectionParams) -> MigrateResult<Url> {
        let database = or_default(&params.database, DEFAULT_DATABASE);
        let mut url = Url::parse(&format!("{}://{}", PROVIDER, database)).map_err(|e| {
            MigrateError::Configuration(format!("invalid database path \"{}\": {}", database, e))
        })?;
        params.append_tracking(&mut url)?;
        Ok(url)
    }

    async fn open(&self, url: &Url, tracking: &TrackingTable) -> MigrateResult<Box<dyn Driver>> {
        let connection_error = |e: sqlx::Error| MigrateError::Connection {
            provider: PROVIDER.to_string(),
            message: e.to_string(),
        };

        let options = SqliteConnectOptions::from_str(url.as_str())
            .map_err(connection_error)?
            .create_if_missing(true)
            .disable_statement_logging();
        let conn = SqliteConnection::connect_with(&options)
            .await
            .map_err(connection_error)?;

        let mut driver = SqliteDriver {
            conn,
            tracking: tracking.clone(),
        };

        if let Err(e) = driver.ensure_migrations_table().await {
            if let Err(close_err) = driver.conn.close().await {
                tracing::warn!(error = %close_err, "failed to close connection after setup error");
            }
            return Err(e);
        }

        Ok(Box::new(driver))
    }
}

/// SQLite session
pub struct SqliteDriver {
    conn: SqliteConnection,
    tracking: TrackingTable,
}

impl SqliteDriver {
    /// `[table]` and `[column]`
    ///
    /// SQLite reads a double-quoted name that matches no column as a string
    /// literal; bracketed names never fall back.
    fn names(&self) -> (String, String) {
        (
            format!("[{}]", self.tracking.table()),
            format!("[{}]", self.tracking.column()),
        )
    }

    async fn ensure_migrations_table(&mut self) -> MigrateResult<()> {
        let (table, column) = self.names();
        let sql = format!(
            "CREATE TABLE IF NOT EXISTS {} ({} VARCHAR(255) NOT NULL PRIMARY KEY)",
            table, column
        );

        self.conn
            .execute(sql.as_str())
            .await
            .map_err(|e| self.tracking.setup_error(e))?;

        let found = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM pragma_table_info(?) WHERE name = ? COLLATE NOCASE",
        )
        .bind(self.tracking.table())
        .bind(self.tracking.column())
        .fetch_one(&mut self.conn)
        .await
        .map_err(|e| self.tracking.setup_error(e))?;
        if found == 0 {
            return Err(self.tracking.missing_column());
        }

        tracing::debug!(table = self.tracking.table(), "migrations table ready");
        Ok(())
    }
}

#[async_trait]
impl Driver for SqliteDriver {
    fn provider(&self) -> &str {
        PROVIDER
    }

    async fn run(&mut self, script: &str) -> MigrateResult<()> {
        match self.conn.execute(script).await {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db_err)) => {
                let mut error = ScriptError::new(script, db_err.message());
                if let Some(code) = db_err.code() {
                    error = error.with_detail(format!("code {}", code));
                }
                Err(error.into())
            }
            Err(e) => Err(ScriptError::new(script, "migration failed")
                .with_detail(e.to_string())
                .into()),
        }
    }

    async fn applied_migrations(&mut self) -> MigrateResult<Vec<String>> {
        let (table, column) = self.names();
        let sql = format!("SELECT {column} FROM {table} ORDER BY {column} ASC");

        sqlx::query_scalar::<_, String>(&sql)
            .fetch_all(&mut self.conn)
            .await
            .map_err(|e| {
                self.tracking
                    .setup_error(format!("failed to read applied migrations: {}", e))
            })
    }

    async fn mark_applied(&mut self, name: &str) -> MigrateResult<()> {
        let (table, column) = self.names();
        let sql = format!("INSERT INTO {} ({}) VALUES (?)", table, column);

        sqlx::query(&sql)
            .bind(name)
            .execute(&mut self.conn)
            .await
            .map_err(|e| MigrateError::StateUpdate {
                name: name.to_string(),
                message: e.to_string(),
            })?;
        Ok(())
    }

    async fn remove_applied(&mut self, name: &str) -> MigrateResult<()> {
        let (table, column) = self.names();
        let sql = format!("DELETE FROM {} WHERE {} = ?", table, column);

        sqlx::query(&sql)
            .bind(name)
            .execute(&mut self.conn)
            .await
            .map_err(|e| MigrateError::StateUpdate {
                name: name.to_string(),
                message: e.to_string(),
            })?;
        Ok(())
    }

    async fn close(self: Box<Self>) -> MigrateResult<()> {
        self.conn.close().await.map_err(|e| MigrateError::Close {
            failures: vec![format!("conn: {}", e)],
        })
    }
}
