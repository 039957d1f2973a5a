use anyhow::{Context as _, Result};

use super::Context;
use crate::config::config_path;
use crate::cli::Cli;

/// Print the effective configuration, or where it is stored
pub fn run(cli: &Cli, path_only: bool) -> Result<()> {
    if path_only {
        let path = match &cli.config {
            Some(path) => path.clone(),
            None => config_path()?,
        };
        println!("{}", path.display());
        return Ok(());
    }

    let ctx = Context::load(cli)?;
    let rendered = toml::to_string_pretty(&ctx.config).context("Failed to render config")?;
    print!("{}", rendered);
    println!("# exporter stats: {}", ctx.stats_path.display());
    println!("# watcher statistics: {}", ctx.mirror_path.display());
    Ok(())
}
