pub mod commands;

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::monitor::Window;

#[derive(Parser)]
#[command(name = "ocstats")]
#[command(author, version, about = "OpenCode token and cost statistics", long_about = None)]
pub struct Cli {
    /// Configuration file (defaults to the per-user config directory)
    #[arg(long, global = true, env = "OCSTATS_CONFIG")]
    pub config: Option<PathBuf>,

    /// Exporter statistics file
    #[arg(long, global = true)]
    pub stats_file: Option<PathBuf>,

    /// Watcher statistics file
    #[arg(long, global = true)]
    pub mirror_file: Option<PathBuf>,

    /// Verbose logging
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Record usage from OpenCode events read on stdin (one JSON object per line)
    Exporter,

    /// Follow the statistics and raise idle and budget alerts
    Watch {
        /// Also send alerts through notify-send
        #[arg(long)]
        desktop: bool,
    },

    /// Print session, daily and total usage once
    Status {
        /// Print the watcher's statistics document as JSON
        #[arg(long)]
        json: bool,
    },

    /// Per-model usage for one window
    Breakdown {
        #[arg(value_enum, default_value = "session")]
        window: WindowArg,
    },

    /// Show the effective configuration
    Config {
        /// Only print where the configuration file lives
        #[arg(long)]
        path: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
pub enum WindowArg {
    Session,
    Daily,
    Total,
}

impl From<WindowArg> for Window {
    fn from(arg: WindowArg) -> Self {
        match arg {
            WindowArg::Session => Window::Session,
            WindowArg::Daily => Window::Daily,
            WindowArg::Total => Window::Total,
        }
    }
}
