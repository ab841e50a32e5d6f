mod commands;
mod config;
mod logging;

use clap::{Args, Parser, Subcommand};
use sqltrail_migrate::{ConnectionParams, MigrationConfig};
use std::env;
use std::path::PathBuf;

use commands::init::InitOptions;
use commands::{init, migrate};
use config::CONFIG_FILE_NAME;
use logging::LoggingConfig;

#[derive(Parser)]
#[command(name = "sqltrail")]
#[command(version, about = "A CLI for managing database migrations")]
struct Cli {
    /// Config file (default is .sqltrail.yml in the working directory or its parent)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, short, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a project: write the config file and the migrations folder
    Init(InitArgs),

    /// Create a new migration file
    Create {
        /// Migration name
        #[arg(required_unless_present = "name_flag", conflicts_with = "name_flag")]
        name: Option<String>,

        /// Migration name
        #[arg(long = "name", short = 'n', value_name = "NAME")]
        name_flag: Option<String>,
    },

    /// Run pending migrations
    Run,

    /// Revert the most recent migration, or all of them with --all
    Undo {
        /// Revert every executed migration
        #[arg(long, short)]
        all: bool,
    },

    /// Revert the most recent migration
    Down,

    /// Show migration status
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args)]
struct InitArgs {
    /// Database username
    #[arg(long, short)]
    username: Option<String>,

    /// Database password
    #[arg(long, short, default_value = "password")]
    password: String,

    /// Database name
    #[arg(long, short)]
    database: Option<String>,

    /// Database connection hostname
    #[arg(long, default_value = "localhost")]
    host: String,

    /// Database connection port
    #[arg(long)]
    port: Option<u16>,

    /// Database provider
    #[arg(long, default_value = "postgres")]
    provider: String,

    /// Path to the migrations folder
    #[arg(long, default_value = "migrations")]
    migrations_path: PathBuf,

    /// Overwrite an existing config file
    #[arg(long, short)]
    force: bool,
}

impl From<InitArgs> for InitOptions {
    fn from(args: InitArgs) -> Self {
        InitOptions {
            params: ConnectionParams {
                user: args.username.unwrap_or_default(),
                password: args.password,
                database: args.database.unwrap_or_default(),
                host: args.host,
                port: args.port,
                provider: args.provider,
                ..Default::default()
            },
            migrations_path: args.migrations_path,
            force: args.force,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let logging = if cli.verbose {
        LoggingConfig::verbose()
    } else {
        LoggingConfig::default()
    };
    logging::init_logging(&logging.with_json(cli.log_json))?;

    let cwd = env::current_dir()?;
    let migration_config = || -> anyhow::Result<MigrationConfig> {
        let loaded = config::load(cli.config.as_deref(), &cwd)?;
        if let Some(source) = loaded.display_source(&cwd) {
            tracing::info!("Loaded configuration file \"{}\"", source);
        }
        Ok(loaded.config.migration_config())
    };

    match cli.command {
        Commands::Init(args) => {
            let config_path = match &cli.config {
                Some(path) => cwd.join(path),
                None => cwd.join(CONFIG_FILE_NAME),
            };
            init::init(&args.into(), &config_path)?;
            println!("Created configuration file \"{}\".", config_path.display());
        }
        Commands::Create { name, name_flag } => {
            let name = name.or(name_flag).unwrap_or_default();
            migrate::create(&name, &migration_config()?)?;
        }
        Commands::Run => {
            migrate::run(&migration_config()?).await?;
        }
        Commands::Undo { all } => {
            migrate::undo(all, &migration_config()?).await?;
        }
        Commands::Down => {
            migrate::undo(false, &migration_config()?).await?;
        }
        Commands::Status { json } => {
            migrate::status(json, &migration_config()?).await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_create_accepts_positional_or_flag() {
        let cli = Cli::try_parse_from(["sqltrail", "create", "add users"]).unwrap();
        assert!(matches!(cli.command, Commands::Create { name: Some(ref n), .. } if n == "add users"));

        let cli = Cli::try_parse_from(["sqltrail", "create", "--name", "add-users"]).unwrap();
        assert!(matches!(cli.command, Commands::Create { name_flag: Some(ref n), .. } if n == "add-users"));

        assert!(Cli::try_parse_from(["sqltrail", "create"]).is_err());
    }

    #[test]
    fn test_undo_all_flag() {
        let cli = Cli::try_parse_from(["sqltrail", "undo", "-a"]).unwrap();
        assert!(matches!(cli.command, Commands::Undo { all: true }));

        let cli = Cli::try_parse_from(["sqltrail", "--config", "ci.yml", "undo"]).unwrap();
        assert!(matches!(cli.command, Commands::Undo { all: false }));
        assert_eq!(cli.config, Some(PathBuf::from("ci.yml")));
    }

    #[test]
    fn test_down_and_status_json() {
        let cli = Cli::try_parse_from(["sqltrail", "down"]).unwrap();
        assert!(matches!(cli.command, Commands::Down));

        let cli = Cli::try_parse_from(["sqltrail", "status", "--json"]).unwrap();
        assert!(matches!(cli.command, Commands::Status { json: true }));

        let cli = Cli::try_parse_from(["sqltrail", "-v", "status"]).unwrap();
        assert!(matches!(cli.command, Commands::Status { json: false }));
        assert!(cli.verbose);

        assert!(Cli::try_parse_from(["sqltrail", "down", "--all"]).is_err());
    }

    #[test]
    fn test_init_defaults() {
        let cli = Cli::try_parse_from(["sqltrail", "init", "-d", "shop"]).unwrap();
        let Commands::Init(args) = cli.command else {
            panic!("expected init");
        };
        let options = InitOptions::from(args);

        assert_eq!(options.params.database, "shop");
        assert_eq!(options.params.password, "password");
        assert_eq!(options.params.host, "localhost");
        assert_eq!(options.params.provider, "postgres");
        assert_eq!(options.migrations_path, PathBuf::from("migrations"));
        assert!(!options.force);
    }
}
