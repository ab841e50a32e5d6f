//! PostgreSQL Backend Implementation
//!
//! Uses a single sqlx `PgConnection` per session. Migration scripts go
//! through the simple query protocol, so one script may hold several
//! statements.

use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgConnection, PgDatabaseError, PgErrorPosition};
use sqlx::{ConnectOptions, Connection, Executor};
use std::str::FromStr;
use std::sync::Arc;
use url::Url;

use crate::driver::{
    line_of_position, or_default, ConnectionParams, Driver, DriverFactory, TrackingTable,
};
use crate::error::{MigrateError, MigrateResult, ScriptError};
use crate::registry::DriverRegistry;

pub const PROVIDER: &str = "postgres";

const DEFAULT_HOST: &str = "localhost";
const DEFAULT_PORT: u16 = 5432;
const DEFAULT_USER: &str = "postgres";
const DEFAULT_DATABASE: &str = "postgres";

/// Register the PostgreSQL backend under `postgres` and `postgresql`
pub fn register(registry: &DriverRegistry) {
    let factory = Arc::new(PostgresDriverFactory::new());
    registry.register(PROVIDER, factory.clone());
    registry.register("postgresql", factory);
}

/// PostgreSQL driver factory
#[derive(Debug, Default)]
pub struct PostgresDriverFactory;

impl PostgresDriverFactory {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl DriverFactory for PostgresDriverFactory {
    fn build_url(&self, params: &ConnectionParams) -> MigrateResult<Url> {
        let host = or_default(&params.host, DEFAULT_HOST);
        let port = params.port.unwrap_or(DEFAULT_PORT);

        let mut url = Url::parse(&format!("{}://{}:{}", PROVIDER, host, port))
            .map_err(|e| MigrateError::Configuration(format!("invalid host \"{}\": {}", host, e)))?;
        url.set_username(or_default(&params.user, DEFAULT_USER))
            .map_err(|_| MigrateError::Configuration("invalid database user".to_string()))?;
        if !params.password.is_empty() {
            url.set_password(Some(&params.password))
                .map_err(|_| MigrateError::Configuration("invalid database password".to_string()))?;
        }
        url.set_path(or_default(&params.database, DEFAULT_DATABASE));

        params.append_tracking(&mut url)?;
        Ok(url)
    }

    async fn open(&self, url: &Url, tracking: &TrackingTable) -> MigrateResult<Box<dyn Driver>> {
        let connection_error = |e: sqlx::Error| MigrateError::Connection {
            provider: PROVIDER.to_string(),
            message: e.to_string(),
        };

        let options = PgConnectOptions::from_str(url.as_str())
            .map_err(connection_error)?
            .disable_statement_logging();
        let mut conn = PgConnection::connect_with(&options)
            .await
            .map_err(connection_error)?;

        // Silences "relation already exists, skipping" notices
        conn.execute("SET client_min_messages TO WARNING")
            .await
            .map_err(connection_error)?;

        let mut driver = PostgresDriver {
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

/// Whether the tracking table in the current schema has the name column
const COLUMN_EXISTS_SQL: &str = "SELECT EXISTS (\
    SELECT 1 FROM information_schema.columns \
    WHERE table_schema = current_schema() AND table_name = $1 AND column_name = $2)";

/// PostgreSQL session
pub struct PostgresDriver {
    conn: PgConnection,
    tracking: TrackingTable,
}

impl PostgresDriver {
    async fn ensure_migrations_table(&mut self) -> MigrateResult<()> {
        let sql = format!(
            "CREATE TABLE IF NOT EXISTS \"{}\" (\n    \
                \"{}\" VARCHAR(255) NOT NULL PRIMARY KEY\n\
            )",
            self.tracking.table(),
            self.tracking.column()
        );

        self.conn
            .execute(sql.as_str())
            .await
            .map_err(|e| self.tracking.setup_error(e))?;

        let found = sqlx::query_scalar::<_, bool>(COLUMN_EXISTS_SQL)
            .bind(self.tracking.table())
            .bind(self.tracking.column())
            .fetch_one(&mut self.conn)
            .await
            .map_err(|e| self.tracking.setup_error(e))?;
        if !found {
            return Err(self.tracking.missing_column());
        }

        tracing::debug!(table = self.tracking.table(), "migrations table ready");
        Ok(())
    }
}

#[async_trait]
impl Driver for PostgresDriver {
    fn provider(&self) -> &str {
        PROVIDER
    }

    async fn run(&mut self, script: &str) -> MigrateResult<()> {
        self.conn
            .execute(script)
            .await
            .map(|_| ())
            .map_err(|e| script_error(script, e))
    }

    async fn applied_migrations(&mut self) -> MigrateResult<Vec<String>> {
        let sql = format!(
            "SELECT \"{column}\" FROM \"{table}\" ORDER BY \"{column}\" COLLATE \"C\" ASC",
            table = self.tracking.table(),
            column = self.tracking.column()
        );

        sqlx::query_scalar::<_, String>(&sql)
            .fetch_all(&mut self.conn)
            .await
            .map_err(|e| {
                self.tracking
                    .setup_error(format!("failed to read applied migrations: {}", e))
            })
    }

    async fn mark_applied(&mut self, name: &str) -> MigrateResult<()> {
        let sql = format!(
            "INSERT INTO \"{}\" (\"{}\") VALUES ($1)",
            self.tracking.table(),
            self.tracking.column()
        );

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
        let sql = format!(
            "DELETE FROM \"{}\" WHERE \"{}\" = $1",
            self.tracking.table(),
            self.tracking.column()
        );

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

fn script_error(script: &str, err: sqlx::Error) -> MigrateError {
    let sqlx::Error::Database(db_err) = &err else {
        return ScriptError::new(script, "migration failed")
            .with_detail(err.to_string())
            .into();
    };

    let mut error = ScriptError::new(script, db_err.message());
    if let Some(pg_err) = db_err.try_downcast_ref::<PgDatabaseError>() {
        if let Some(PgErrorPosition::Original(position)) = pg_err.position() {
            error = error.with_line(line_of_position(script, position));
        }

        let mut detail = format!("code {}", pg_err.code());
        if let Some(extra) = pg_err.detail() {
            detail.push_str(&format!(", {}", extra));
        }
        if let Some(hint) = pg_err.hint() {
            detail.push_str(&format!(", hint: {}", hint));
        }
        error = error.with_detail(detail);
    }
    error.into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_url_defaults() {
        let url = PostgresDriverFactory::new()
            .build_url(&ConnectionParams::default())
            .unwrap();
        assert_eq!(url.as_str(), "postgres://postgres@localhost:5432/postgres");
    }

    #[test]
    fn test_build_url_from_params() {
        let params = ConnectionParams {
            user: "app".to_string(),
            password: "p@ss word".to_string(),
            database: "shop".to_string(),
            host: "db.internal".to_string(),
            port: Some(6543),
            provider: "postgres".to_string(),
            migrations_table: Some("versions".to_string()),
            name_column: None,
        };

        let url = PostgresDriverFactory::new().build_url(&params).unwrap();
        assert_eq!(url.username(), "app");
        assert_eq!(url.password(), Some("p%40ss%20word"));
        assert_eq!(url.host_str(), Some("db.internal"));
        assert_eq!(url.port(), Some(6543));
        assert_eq!(url.path(), "/shop");
        assert_eq!(url.query(), Some("x-migrations-table=versions"));
    }

    #[test]
    fn test_non_database_error_keeps_script() {
        let err = script_error("SELECT 1", sqlx::Error::PoolTimedOut);
        match err {
            MigrateError::Execution(script) => {
                assert_eq!(script.script, "SELECT 1");
                assert_eq!(script.line, None);
                assert!(script.detail.is_some());
            }
            other => panic!("unexpected error: {}", other),
        }
    }
}
