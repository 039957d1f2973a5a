use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::idle::{DEFAULT_IDLE_THRESHOLD_MINUTES, DEFAULT_POLL_INTERVAL_SECONDS};
use crate::usage::StatsStore;

pub const APP_NAME: &str = "ocstats";
const CONFIG_NAME: &str = "config";

/// User settings, stored as TOML by confy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Minutes of inactivity before a session counts as idle (1-120)
    pub idle_threshold_minutes: i64,
    /// Seconds between statistics checks (10-600)
    pub poll_interval_seconds: i64,
    /// Watch the stats file for instant updates
    pub file_monitor_enabled: bool,
    /// Trust the exporter's idle flag instead of waiting for the threshold
    pub realtime_idle_enabled: bool,
    /// Daily budget in dollars, 0 = unlimited
    pub daily_budget: f64,
    /// Monthly budget in dollars, 0 = unlimited
    pub monthly_budget: f64,
    /// Percent of a budget that triggers a warning (50-100)
    pub budget_alert_threshold: i64,
    pub show_cost_in_panel: bool,
    /// Also send alerts through `notify-send`
    pub desktop_notifications: bool,
    /// Override for the exporter's stats file
    pub stats_file: Option<String>,
    /// Override for the watcher's own statistics file
    pub mirror_file: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            idle_threshold_minutes: DEFAULT_IDLE_THRESHOLD_MINUTES,
            poll_interval_seconds: DEFAULT_POLL_INTERVAL_SECONDS,
            file_monitor_enabled: true,
            realtime_idle_enabled: true,
            daily_budget: 0.0,
            monthly_budget: 0.0,
            budget_alert_threshold: 80,
            show_cost_in_panel: true,
            desktop_notifications: false,
            stats_file: None,
            mirror_file: None,
        }
    }
}

impl Config {
    /// Clamp out-of-range values, returning one message per correction
    pub fn validate(&mut self) -> Vec<String> {
        let mut fixes = Vec::new();

        let idle = self.idle_threshold_minutes.clamp(1, 120);
        if idle != self.idle_threshold_minutes {
            fixes.push(format!(
                "idle_threshold_minutes {} out of range 1-120, using {}",
                self.idle_threshold_minutes, idle
            ));
            self.idle_threshold_minutes = idle;
        }

        let poll = self.poll_interval_seconds.clamp(10, 600);
        if poll != self.poll_interval_seconds {
            fixes.push(format!(
                "poll_interval_seconds {} out of range 10-600, using {}",
                self.poll_interval_seconds, poll
            ));
            self.poll_interval_seconds = poll;
        }

        let threshold = self.budget_alert_threshold.clamp(50, 100);
        if threshold != self.budget_alert_threshold {
            fixes.push(format!(
                "budget_alert_threshold {} out of range 50-100, using {}",
                self.budget_alert_threshold, threshold
            ));
            self.budget_alert_threshold = threshold;
        }

        for (name, budget) in [
            ("daily_budget", &mut self.daily_budget),
            ("monthly_budget", &mut self.monthly_budget),
        ] {
            if !budget.is_finite() || *budget < 0.0 {
                fixes.push(format!("{} {} is invalid, using 0 (unlimited)", name, budget));
                *budget = 0.0;
            }
        }

        fixes
    }

    pub fn poll_interval(&self) -> Duration {
        // validate() keeps the value positive
        Duration::from_secs(self.poll_interval_seconds.unsigned_abs())
    }

    /// Exporter stats file: configured override or `<data-local>/opencode/stats.json`
    pub fn stats_path(&self) -> Result<PathBuf> {
        match &self.stats_file {
            Some(raw) => Ok(expand_path(raw)),
            None => StatsStore::default_path().context("Failed to get local data directory"),
        }
    }

    /// Watcher statistics file: configured override or `<data-local>/ocstats/statistics.json`
    pub fn mirror_path(&self) -> Result<PathBuf> {
        match &self.mirror_file {
            Some(raw) => Ok(expand_path(raw)),
            None => dirs::data_local_dir()
                .map(|d| d.join(APP_NAME).join("statistics.json"))
                .context("Failed to get local data directory"),
        }
    }
}

/// Expand a leading `~` in a configured path
pub fn expand_path(raw: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(raw).into_owned())
}

/// Load the configuration from `path`, or the default location. A missing
/// file is created with defaults.
pub fn load_config_from(path: Option<&Path>) -> Result<Config> {
    let mut config: Config = match path {
        Some(path) => confy::load_path(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => confy::load(APP_NAME, CONFIG_NAME).context("Failed to load config")?,
    };

    for fix in config.validate() {
        tracing::warn!("Config: {}", fix);
    }
    Ok(config)
}

/// Where the default configuration file lives
pub fn config_path() -> Result<PathBuf> {
    confy::get_configuration_file_path(APP_NAME, CONFIG_NAME)
        .context("Failed to resolve config path")
}
