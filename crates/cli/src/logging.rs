//! Console logging setup
//!
//! Progress and diagnostics go through `tracing` to stderr so that command
//! output on stdout (e.g. `status --json`) stays machine readable.

use std::io;
use tracing_subscriber::{fmt::Layer, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Logging configuration for the CLI
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Filter used when `RUST_LOG` is not set
    pub env_filter: String,
    /// Emit JSON lines instead of plain text
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            env_filter: "sqltrail=info,sqltrail_migrate=info".to_string(),
            json_format: false,
        }
    }
}

impl LoggingConfig {
    pub fn verbose() -> Self {
        Self {
            env_filter: "sqltrail=debug,sqltrail_migrate=debug".to_string(),
            ..Self::default()
        }
    }

    pub fn with_json(mut self, json_format: bool) -> Self {
        self.json_format = json_format;
        self
    }
}

/// Install the global subscriber
pub fn init_logging(config: &LoggingConfig) -> anyhow::Result<()> {
    let filter =
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&config.env_filter))?;

    if config.json_format {
        tracing_subscriber::registry()
            .with(filter)
            .with(Layer::new().with_writer(io::stderr).json())
            .try_init()?;
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(Layer::new().with_writer(io::stderr).without_time().with_target(false))
            .try_init()?;
    }

    Ok(())
}
