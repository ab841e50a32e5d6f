//! Connection Resolver
//!
//! Turns a connection string (or structured [`ConnectionParams`]) into an
//! open [`Driver`]. The URL scheme selects the provider in the registry.
//! Query parameters starting with `x-` belong to the engine: they configure
//! the tracking table and are removed before the URL reaches the native
//! driver, since most native drivers reject parameters they don't know.

use url::Url;

use crate::driver::{
    ConnectionParams, Driver, TrackingTable, DEFAULT_MIGRATIONS_TABLE, DEFAULT_NAME_COLUMN,
    MIGRATIONS_TABLE_PARAM, NAME_COLUMN_PARAM,
};
use crate::error::{MigrateError, MigrateResult};
use crate::registry::DriverRegistry;

/// Prefix shared by every engine-reserved query parameter
pub const RESERVED_PARAM_PREFIX: &str = "x-";

/// Provider used when structured parameters name none
pub const DEFAULT_PROVIDER: &str = "postgres";

/// A connection string split into its engine and native halves
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionTarget {
    /// Provider token taken from the URL scheme
    pub provider: String,
    /// URL handed to the native driver, reserved parameters removed
    pub url: Url,
    /// Tracking table configured through reserved parameters
    pub tracking: TrackingTable,
}

impl ConnectionTarget {
    /// Parse a connection string and split off reserved parameters
    pub fn parse(raw: &str) -> MigrateResult<Self> {
        let mut url = Url::parse(raw).map_err(|e| {
            MigrateError::Configuration(format!("invalid connection url: {}", e))
        })?;

        let provider = url.scheme().to_string();

        let mut table = DEFAULT_MIGRATIONS_TABLE.to_string();
        let mut column = DEFAULT_NAME_COLUMN.to_string();
        let mut native = Vec::new();
        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                MIGRATIONS_TABLE_PARAM => table = value.into_owned(),
                NAME_COLUMN_PARAM => column = value.into_owned(),
                k if k.starts_with(RESERVED_PARAM_PREFIX) => {
                    tracing::debug!(param = k, "ignoring unknown reserved parameter");
                }
                _ => native.push((key.into_owned(), value.into_owned())),
            }
        }

        if url.query().is_some() {
            if native.is_empty() {
                url.set_query(None);
            } else {
                url.query_pairs_mut().clear().extend_pairs(native.iter());
            }
        }

        Ok(Self {
            provider,
            url,
            tracking: TrackingTable::new(table, column)?,
        })
    }
}

/// Open a driver for a connection string
pub async fn open(registry: &DriverRegistry, raw: &str) -> MigrateResult<Box<dyn Driver>> {
    let target = ConnectionTarget::parse(raw)?;
    let factory = registry.get(&target.provider)?;

    tracing::debug!(
        provider = %target.provider,
        table = target.tracking.table(),
        "opening database connection"
    );
    factory.open(&target.url, &target.tracking).await
}

/// Build a connection URL from structured parameters
pub fn build_url(registry: &DriverRegistry, params: &ConnectionParams) -> MigrateResult<Url> {
    registry.get(provider_of(params))?.build_url(params)
}

/// Open a driver from structured parameters
pub async fn open_with_params(
    registry: &DriverRegistry,
    params: &ConnectionParams,
) -> MigrateResult<Box<dyn Driver>> {
    let url = build_url(registry, params)?;
    open(registry, url.as_str()).await
}

fn provider_of(params: &ConnectionParams) -> &str {
    if params.provider.is_empty() {
        DEFAULT_PROVIDER
    } else {
        &params.provider
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::memory::{MemoryDatabase, MemoryDriverFactory};
    use std::sync::Arc;

    #[test]
    fn test_parse_strips_reserved_params() {
        let target = ConnectionTarget::parse(
            "postgres://app:secret@db:5432/shop?sslmode=disable&x-migrations-table=versions&x-name-column=version",
        )
        .unwrap();

        assert_eq!(target.provider, "postgres");
        assert_eq!(target.url.as_str(), "postgres://app:secret@db:5432/shop?sslmode=disable");
        assert_eq!(target.tracking.table(), "versions");
        assert_eq!(target.tracking.column(), "version");
    }

    #[test]
    fn test_parse_drops_query_when_only_reserved() {
        let target =
            ConnectionTarget::parse("postgres://localhost/shop?x-migrations-table=versions&x-lock=1")
                .unwrap();

        assert_eq!(target.url.as_str(), "postgres://localhost/shop");
        assert_eq!(target.url.query(), None);
        assert_eq!(target.tracking.table(), "versions");
        assert_eq!(target.tracking.column(), "name");
    }

    #[test]
    fn test_parse_keeps_url_without_query_untouched() {
        let target = ConnectionTarget::parse("sqlite:///var/lib/app.db").unwrap();
        assert_eq!(target.provider, "sqlite");
        assert_eq!(target.url.as_str(), "sqlite:///var/lib/app.db");
        assert!(target.tracking.is_default());
    }

    #[test]
    fn test_parse_rejects_invalid_input() {
        assert!(matches!(
            ConnectionTarget::parse("not a url"),
            Err(MigrateError::Configuration(_))
        ));
        assert!(matches!(
            ConnectionTarget::parse("postgres://localhost/db?x-migrations-table=bad;name"),
            Err(MigrateError::Configuration(_))
        ));
    }

    #[tokio::test]
    async fn test_open_unknown_provider() {
        let registry = DriverRegistry::new();
        let err = open(&registry, "oracle://localhost/db").await.err().unwrap();
        assert!(matches!(err, MigrateError::UnknownDriver { ref provider } if provider == "oracle"));
    }

    #[tokio::test]
    async fn test_open_passes_tracking_to_backend() {
        let database = MemoryDatabase::new();
        let registry = DriverRegistry::new();
        registry.register("memory", Arc::new(MemoryDriverFactory::new(database.clone())));

        let driver = open(&registry, "memory://local?x-migrations-table=versions")
            .await
            .unwrap();
        driver.close().await.unwrap();

        assert_eq!(database.tracking().unwrap().table(), "versions");
        assert_eq!(database.last_url().unwrap().as_str(), "memory://local");
    }

    #[tokio::test]
    async fn test_open_with_params_builds_backend_url() {
        let database = MemoryDatabase::new();
        let registry = DriverRegistry::new();
        registry.register("memory", Arc::new(MemoryDriverFactory::new(database.clone())));

        let params = ConnectionParams {
            provider: "memory".to_string(),
            database: "shop".to_string(),
            name_column: Some("version".to_string()),
            ..Default::default()
        };
        let driver = open_with_params(&registry, &params).await.unwrap();
        driver.close().await.unwrap();

        assert_eq!(database.last_url().unwrap().as_str(), "memory://shop");
        assert_eq!(database.tracking().unwrap().column(), "version");
    }

    #[test]
    fn test_build_url_defaults_to_postgres() {
        let registry = DriverRegistry::with_builtin();
        let url = build_url(&registry, &ConnectionParams::default()).unwrap();
        assert_eq!(url.scheme(), "postgres");

        let params = ConnectionParams {
            provider: "mssql".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            build_url(&registry, &params),
            Err(MigrateError::UnknownDriver { .. })
        ));
    }
}
