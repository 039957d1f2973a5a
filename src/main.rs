mod cli;
mod config;
mod error;
mod events;
mod exporter;
mod format;
mod idle;
mod monitor;
mod notifier;
mod usage;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use cli::commands::{self, Context};
use cli::{Cli, Commands};

const LOG_ENV: &str = "OCSTATS_LOG";

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.debug);

    if let Commands::Config { path } = cli.command {
        return commands::config::run(&cli, path);
    }

    let ctx = Context::load(&cli)?;
    match cli.command {
        Commands::Exporter => commands::exporter::run(ctx).await,
        Commands::Watch { desktop } => commands::watch::run(ctx, desktop).await,
        Commands::Status { json } => commands::status::run(ctx, json),
        Commands::Breakdown { window } => commands::breakdown::run(ctx, window.into()),
        Commands::Config { .. } => Ok(()),
    }
}

/// Logs go to stderr so stdout stays clean for status output.
/// `OCSTATS_LOG` takes precedence over `--debug`.
fn setup_logging(debug: bool) {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| {
        if debug {
            EnvFilter::new("ocstats=debug")
        } else {
            EnvFilter::new("ocstats=info")
        }
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();
}
