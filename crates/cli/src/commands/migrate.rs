//! Migration commands: `create`, `run`, `undo`, `down` and `status`

use anyhow::Context;
use sqltrail_migrate::{
    new_migration, DriverRegistry, MigrationConfig, MigrationRollback, MigrationRunner,
    MigrationState, MigrationStatus, RollbackScope,
};
use std::path::PathBuf;
use std::sync::Arc;

fn runner(config: &MigrationConfig) -> MigrationRunner {
    MigrationRunner::new(Arc::new(DriverRegistry::with_builtin()), config.clone())
}

pub fn create(name: &str, config: &MigrationConfig) -> anyhow::Result<PathBuf> {
    let path = new_migration(name, config).context("failed to create migration")?;
    println!("New migration was created at \"{}\".", path.display());
    Ok(path)
}

pub async fn run(config: &MigrationConfig) -> anyhow::Result<()> {
    let result = runner(config)
        .run_migrations()
        .await
        .context("failed to run migrations")?;

    if result.is_up_to_date() {
        println!("Database is already up to date.");
    } else {
        println!(
            "Applied {} migration(s) in {}ms:",
            result.applied_migrations.len(),
            result.execution_time_ms
        );
        for name in &result.applied_migrations {
            println!("  {}", name);
        }
    }
    Ok(())
}

pub async fn undo(all: bool, config: &MigrationConfig) -> anyhow::Result<()> {
    let result = runner(config)
        .rollback(RollbackScope::from(all))
        .await
        .context("failed to revert migrations")?;

    if result.rolled_back_migrations.is_empty() {
        println!("No executed migrations found.");
    } else {
        println!(
            "Reverted {} migration(s) in {}ms:",
            result.rolled_back_migrations.len(),
            result.execution_time_ms
        );
        for name in &result.rolled_back_migrations {
            println!("  {}", name);
        }
    }
    Ok(())
}

pub async fn status(json: bool, config: &MigrationConfig) -> anyhow::Result<()> {
    let status = runner(config)
        .status()
        .await
        .context("failed to read migration status")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        print!("{}", render_status(&status));
    }
    Ok(())
}

fn render_status(status: &[MigrationStatus]) -> String {
    if status.is_empty() {
        return "No migrations found\n".to_string();
    }

    let mut out = String::from("Migration Status:\n================\n");
    for migration in status {
        let marker = match migration.state {
            MigrationState::Applied => "applied",
            MigrationState::Pending => "pending",
            MigrationState::MissingLocal => "missing",
        };
        out.push_str(&format!("  [{:<7}] {}\n", marker, migration.name));
    }

    let pending = status
        .iter()
        .filter(|m| m.state == MigrationState::Pending)
        .count();
    out.push_str(&format!("\n{} pending migration(s)\n", pending));
    out
}
