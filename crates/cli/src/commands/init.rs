//! `sqltrail init`: write the project configuration and migrations folder

use anyhow::{bail, Context};
use sqltrail_migrate::{build_url, ConnectionParams, DriverRegistry};
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::ProjectConfig;

/// Flags accepted by `init`
#[derive(Debug, Clone)]
pub struct InitOptions {
    pub params: ConnectionParams,
    pub migrations_path: PathBuf,
    pub force: bool,
}

/// Create the configuration file at `config_path` and the migrations folder
/// next to it
pub fn init(options: &InitOptions, config_path: &Path) -> anyhow::Result<ProjectConfig> {
    if config_path.exists() && !options.force {
        bail!(
            "the file \"{}\" already exists, use --force to overwrite it",
            config_path.display()
        );
    }

    let registry = DriverRegistry::with_builtin();
    let url = build_url(&registry, &options.params).context("failed to make connection url")?;

    let config = ProjectConfig {
        url: url.to_string(),
        migrations_path: options.migrations_path.clone(),
    };
    config.save(config_path)?;

    let base = config_path.parent().unwrap_or_else(|| Path::new("."));
    let migrations_dir = base.join(&config.migrations_path);
    fs::create_dir_all(&migrations_dir).with_context(|| {
        format!("failed to create directory \"{}\"", migrations_dir.display())
    })?;
    fs::write(migrations_dir.join(".gitkeep"), b"")
        .with_context(|| format!("failed to create .gitkeep in \"{}\"", migrations_dir.display()))?;

    tracing::info!(
        config = %config_path.display(),
        migrations = %migrations_dir.display(),
        "project initialized"
    );
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CONFIG_FILE_NAME;
    use tempfile::TempDir;

    fn options(force: bool) -> InitOptions {
        InitOptions {
            params: ConnectionParams {
                user: "app".to_string(),
                password: "secret".to_string(),
                database: "shop".to_string(),
                host: "db".to_string(),
                port: Some(6543),
                provider: "postgres".to_string(),
                ..Default::default()
            },
            migrations_path: PathBuf::from("db/migrations"),
            force,
        }
    }

    #[test]
    fn test_init_writes_config_and_folder() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join(CONFIG_FILE_NAME);

        let config = init(&options(false), &config_path).unwrap();

        assert_eq!(config.url, "postgres://app:secret@db:6543/shop");
        assert_eq!(ProjectConfig::from_file(&config_path).unwrap(), config);
        assert!(temp_dir.path().join("db/migrations/.gitkeep").is_file());
    }

    #[test]
    fn test_init_refuses_to_overwrite_without_force() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join(CONFIG_FILE_NAME);
        fs::write(&config_path, "url: sqlite://keep.db\n").unwrap();

        assert!(init(&options(false), &config_path).is_err());
        assert_eq!(
            ProjectConfig::from_file(&config_path).unwrap().url,
            "sqlite://keep.db"
        );

        init(&options(true), &config_path).unwrap();
        assert_eq!(
            ProjectConfig::from_file(&config_path).unwrap().url,
            "postgres://app:secret@db:6543/shop"
        );
    }

    #[test]
    fn test_init_rejects_unknown_provider() {
        let temp_dir = TempDir::new().unwrap();
        let mut opts = options(false);
        opts.params.provider = "sqlserver".to_string();

        assert!(init(&opts, &temp_dir.path().join(CONFIG_FILE_NAME)).is_err());
        assert!(!temp_dir.path().join(CONFIG_FILE_NAME).exists());
    }
}
