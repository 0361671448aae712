//! Varuna entry point.
//!
//! Initialization order: tracing first so configuration failures are
//! visible, then the config file, then the selected subcommand. All
//! initialization uses `Result` with context; any failure halts startup
//! with a clear message.

#![forbid(unsafe_code)]
#![forbid(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![forbid(clippy::panic)]

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use varuna::cli::{Cli, Commands};
use varuna::commands;
use varuna::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let config = Config::load(&cli.config)
        .with_context(|| format!("configuration load failed for '{}'", cli.config.display()))?;

    match cli.command {
        Commands::Run => commands::run(&config).await,
        Commands::Sync { namespace } => commands::sync(&config, namespace.as_deref()).await,
        Commands::Plan { namespace } => commands::plan(&config, namespace.as_deref()).await,
        Commands::Validate => commands::validate(&config).await,
        Commands::History {
            namespace,
            revision,
            limit,
        } => commands::history(&config, namespace.as_deref(), revision.as_deref(), limit).await,
    }
}

/// Initialize tracing with `RUST_LOG` support, defaulting to info.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
