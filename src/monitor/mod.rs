//! Reader side: mirrors the exporter's statistics into the watcher's own
//! file and turns them into status lines and alerts.

pub mod budget;
pub mod mirror;

use chrono::{DateTime, Local, TimeZone};
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::format::{format_cost, format_tokens, format_usage};
use crate::idle::{IdleStart, IdleSubject, IdleTracker, IdleTransition};
use crate::notifier::Notifier;
use crate::usage::store::{read_json, write_json_atomic};
use crate::usage::{ModelUsage, StatisticsDocument};

pub use budget::{BudgetAlert, BudgetTracker};
pub use mirror::{MirrorDocument, Window};

const IDLE_TITLE: &str = "OpenCode Session Idle";

/// Result of reading the exporter's file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    Updated,
    /// No stats file yet; the previous copy is kept
    Missing,
    /// Unreadable or torn file; the previous copy is kept
    Unreadable,
}

pub struct Monitor<N: Notifier> {
    config: Config,
    stats_path: PathBuf,
    mirror_path: PathBuf,
    mirror: MirrorDocument,
    idle: IdleTracker,
    budget: BudgetTracker,
    /// Idle start reported by the exporter, when it says the session is idle
    writer_idle_since: Option<i64>,
    /// Exporter's total cost at the previous refresh, for monthly spend
    last_total_cost: Option<f64>,
    notifier: N,
}

impl<N: Notifier> Monitor<N> {
    /// Create a monitor, starting from the last mirror written to disk
    pub fn new(
        config: Config,
        stats_path: PathBuf,
        mirror_path: PathBuf,
        notifier: N,
        now: &DateTime<Local>,
    ) -> Self {
        let mirror = load_mirror(&mirror_path, now);
        let idle = IdleTracker::from_minutes(config.idle_threshold_minutes)
            .with_idle_start(IdleStart::LastActivity);
        let budget = BudgetTracker::new(
            config.daily_budget,
            config.monthly_budget,
            config.budget_alert_threshold,
        );

        Self {
            config,
            stats_path,
            mirror_path,
            mirror,
            idle,
            budget,
            writer_idle_since: None,
            last_total_cost: None,
            notifier,
        }
    }

    pub fn statistics(&self) -> &MirrorDocument {
        &self.mirror
    }

    pub fn notifier(&self) -> &N {
        &self.notifier
    }

    pub fn stats_path(&self) -> &Path {
        &self.stats_path
    }

    /// Pull the exporter's document into the mirror and persist the mirror.
    /// Failures keep the last good copy.
    pub fn refresh(&mut self, now: &DateTime<Local>) -> RefreshOutcome {
        if self.mirror.roll_daily(now) {
            tracing::info!(date = %self.mirror.daily.date, "Daily statistics reset for a new day");
        }
        if self.mirror.roll_month(now) {
            tracing::info!(month = %self.mirror.monthly.month, "Monthly spend reset");
        }

        let outcome = match read_json::<StatisticsDocument>(&self.stats_path) {
            Ok(writer) => {
                self.apply(&writer);
                RefreshOutcome::Updated
            }
            Err(e) if e.is_missing() => {
                tracing::debug!("OpenCode stats not available: {}", e);
                RefreshOutcome::Missing
            }
            Err(e) => {
                tracing::warn!("Keeping previous statistics: {}", e);
                RefreshOutcome::Unreadable
            }
        };

        self.persist();
        outcome
    }

    fn apply(&mut self, writer: &StatisticsDocument) {
        self.mirror.apply_writer(writer);

        self.writer_idle_since = writer
            .session
            .is_idle
            .then(|| writer.session.idle_since.unwrap_or(writer.session.last_activity));

        let total_cost = writer.total.usage.total_cost;
        if let Some(previous) = self.last_total_cost {
            if total_cost > previous {
                self.mirror.monthly.cost += total_cost - previous;
            }
        }
        self.last_total_cost = Some(total_cost);
    }

    /// Run idle detection; notifies once per Active -> Idle edge
    pub fn check_idle(&mut self, now: &DateTime<Local>) -> Option<IdleTransition> {
        let transition = match self.writer_idle_since {
            Some(since) if self.config.realtime_idle_enabled => {
                self.idle.signal_idle(&mut self.mirror.session, since, now)
            }
            _ => self.idle.poll(&mut self.mirror.session, now),
        };

        match transition {
            Some(IdleTransition::BecameIdle { idle_minutes, .. }) => {
                let body = if idle_minutes > 0 {
                    format!(
                        "Your OpenCode session has been idle for {} minutes",
                        idle_minutes
                    )
                } else {
                    "Your OpenCode session is now idle".to_string()
                };
                self.notifier.notify(IDLE_TITLE, &body);
                self.persist();
            }
            Some(IdleTransition::BecameActive) => {
                tracing::debug!("Session is active again");
                self.persist();
            }
            None => {}
        }
        transition
    }

    /// Compare spend against the configured budgets
    pub fn check_budget(&mut self) -> Vec<BudgetAlert> {
        let alerts = self.budget.evaluate(
            &self.mirror.daily.date,
            self.mirror.daily.usage.cost,
            &self.mirror.monthly.month,
            self.mirror.monthly.cost,
        );
        for alert in &alerts {
            self.notifier.notify(&alert.title(), &alert.message());
        }
        alerts
    }

    /// One full cycle: refresh, idle check, budget check
    pub fn tick(&mut self, now: &DateTime<Local>) -> RefreshOutcome {
        let outcome = self.refresh(now);
        self.check_idle(now);
        self.check_budget();
        outcome
    }

    /// Compact status for a panel: session tokens, optional cost, idle marker
    pub fn panel_text(&self) -> String {
        let session = &self.mirror.session;
        let mut text = format_usage(
            session.usage.tokens,
            session.usage.cost,
            self.config.show_cost_in_panel,
        );
        if session.is_idle() {
            text.push_str(" (idle)");
        }
        text
    }

    /// One line per window, plus the idle start when the session is idle
    pub fn status_lines(&self) -> Vec<String> {
        let mut lines = vec![
            format!("Session: {}", window_usage(&self.mirror, Window::Session)),
            format!("Today: {}", window_usage(&self.mirror, Window::Daily)),
            format!("Total: {}", window_usage(&self.mirror, Window::Total)),
        ];
        let idle_since = self.mirror.session.idle_since().or(self.writer_idle_since);
        if let Some(since) = idle_since {
            if let Some(at) = Local.timestamp_millis_opt(since).single() {
                lines.push(format!("Idle since {}", at.format("%H:%M")));
            }
        }
        lines
    }

    /// Per-model listing for one window, `model: <tokens> tokens<cost>`
    pub fn breakdown_lines(&self, window: Window) -> Vec<String> {
        self.breakdown(window)
            .iter()
            .map(|m| format!("{}: {} tokens{}", m.model, format_tokens(m.tokens), format_cost(m.cost)))
            .collect()
    }

    pub fn breakdown(&self, window: Window) -> Vec<ModelUsage> {
        self.mirror.window(window).breakdown()
    }

    fn persist(&self) {
        if let Err(e) = write_json_atomic(&self.mirror_path, &self.mirror) {
            tracing::error!("Failed to save data: {}", e);
        }
    }
}

fn window_usage(mirror: &MirrorDocument, window: Window) -> String {
    let bucket = mirror.window(window);
    format_usage(bucket.tokens, bucket.cost, true)
}

fn load_mirror(path: &Path, now: &DateTime<Local>) -> MirrorDocument {
    match read_json::<MirrorDocument>(path) {
        Ok(mirror) => mirror,
        Err(e) if e.is_missing() => MirrorDocument::new(now),
        Err(e) => {
            tracing::warn!("Failed to load data: {}", e);
            MirrorDocument::new(now)
        }
    }
}
