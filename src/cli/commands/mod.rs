pub mod breakdown;
pub mod config;
pub mod exporter;
pub mod status;
pub mod watch;

use anyhow::Result;
use std::path::PathBuf;

use crate::cli::Cli;
use crate::config::{expand_path, load_config_from, Config};

/// Configuration plus the two statistics paths, after CLI overrides
pub struct Context {
    pub config: Config,
    pub stats_path: PathBuf,
    pub mirror_path: PathBuf,
}

impl Context {
    pub fn load(cli: &Cli) -> Result<Self> {
        let config = load_config_from(cli.config.as_deref())?;
        let stats_path = match &cli.stats_file {
            Some(path) => expand_path(&path.to_string_lossy()),
            None => config.stats_path()?,
        };
        let mirror_path = match &cli.mirror_file {
            Some(path) => expand_path(&path.to_string_lossy()),
            None => config.mirror_path()?,
        };
        Ok(Self {
            config,
            stats_path,
            mirror_path,
        })
    }
}
