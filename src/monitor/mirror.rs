use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::idle::IdleSubject;
use crate::usage::{
    date_string, millis, model_breakdown, month_string, ModelUsage, StatisticsDocument,
    UsageBucket,
};

/// Counters as the watcher stores them, with short field names
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MirrorBucket {
    pub tokens: u64,
    pub models: HashMap<String, u64>,
    pub cost: f64,
    pub cost_models: HashMap<String, f64>,
}

impl MirrorBucket {
    fn copy_from(&mut self, usage: &UsageBucket) {
        self.tokens = usage.total_tokens;
        self.models = usage.tokens_by_model.clone();
        self.cost = usage.total_cost;
        self.cost_models = usage.costs_by_model.clone();
    }

    pub fn breakdown(&self) -> Vec<ModelUsage> {
        model_breakdown(&self.models, &self.cost_models)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MirrorSession {
    #[serde(flatten)]
    pub usage: MirrorBucket,
    pub last_activity: Option<i64>,
    pub start_time: i64,
    pub is_idle: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub idle_since: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MirrorDaily {
    #[serde(flatten)]
    pub usage: MirrorBucket,
    pub date: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MirrorTotal {
    #[serde(flatten)]
    pub usage: MirrorBucket,
    pub install_date: i64,
}

/// Spend observed during one calendar month
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonthlySpend {
    pub cost: f64,
    /// `YYYY-MM`
    pub month: String,
}

/// One of the three usage windows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Window {
    Session,
    Daily,
    Total,
}

impl Window {
    pub fn name(&self) -> &'static str {
        match self {
            Window::Session => "session",
            Window::Daily => "daily",
            Window::Total => "total",
        }
    }
}

/// The watcher's own statistics file, `statistics.json`.
///
/// Derived from the exporter's document; the watcher never writes to the
/// exporter's file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MirrorDocument {
    pub session: MirrorSession,
    pub daily: MirrorDaily,
    pub total: MirrorTotal,
    pub monthly: MonthlySpend,
}

impl MirrorDocument {
    pub fn new(now: &DateTime<Local>) -> Self {
        Self {
            session: MirrorSession {
                start_time: millis(now),
                ..Default::default()
            },
            daily: MirrorDaily {
                usage: MirrorBucket::default(),
                date: date_string(now),
            },
            total: MirrorTotal {
                usage: MirrorBucket::default(),
                install_date: millis(now),
            },
            monthly: MonthlySpend {
                cost: 0.0,
                month: month_string(now),
            },
        }
    }

    pub fn window(&self, window: Window) -> &MirrorBucket {
        match window {
            Window::Session => &self.session.usage,
            Window::Daily => &self.daily.usage,
            Window::Total => &self.total.usage,
        }
    }

    /// Clear the daily window when the date changed. True on rollover.
    pub fn roll_daily(&mut self, now: &DateTime<Local>) -> bool {
        let today = date_string(now);
        if self.daily.date == today {
            return false;
        }
        self.daily = MirrorDaily {
            usage: MirrorBucket::default(),
            date: today,
        };
        true
    }

    /// Clear the monthly spend when the month changed. True on rollover.
    pub fn roll_month(&mut self, now: &DateTime<Local>) -> bool {
        let month = month_string(now);
        if self.monthly.month == month {
            return false;
        }
        self.monthly = MonthlySpend { cost: 0.0, month };
        true
    }

    /// Copy the exporter's counters in. The idle flag is not copied: the
    /// watcher tracks its own edges.
    pub fn apply_writer(&mut self, writer: &StatisticsDocument) {
        self.session.usage.copy_from(&writer.session.usage);
        if writer.session.last_activity > 0 {
            self.session.last_activity = Some(writer.session.last_activity);
        }
        if writer.session.start_time > 0 {
            self.session.start_time = writer.session.start_time;
        }

        // A stale daily window in the writer is not today's spend
        if writer.daily.date == self.daily.date {
            self.daily.usage.copy_from(&writer.daily.usage);
        }

        self.total.usage.copy_from(&writer.total.usage);
        if writer.total.install_date > 0 {
            self.total.install_date = writer.total.install_date;
        }
    }
}

impl IdleSubject for MirrorSession {
    fn session_tokens(&self) -> u64 {
        self.usage.tokens
    }

    fn last_activity(&self) -> Option<i64> {
        self.last_activity
    }

    fn is_idle(&self) -> bool {
        self.is_idle
    }

    fn idle_since(&self) -> Option<i64> {
        self.idle_since
    }

    fn set_idle(&mut self, since: i64) {
        self.is_idle = true;
        self.idle_since = Some(since);
    }

    fn clear_idle(&mut self) {
        self.is_idle = false;
        self.idle_since = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::usage::{record_usage, TokenUsage};
    use chrono::TimeZone;

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    fn writer_with_usage(now: &DateTime<Local>) -> StatisticsDocument {
        let mut writer = StatisticsDocument::new(now);
        let usage = TokenUsage {
            input: 10_000,
            ..Default::default()
        };
        record_usage(&mut writer, "gpt-4", &usage, 0.3, now);
        let usage = TokenUsage {
            input: 5_234,
            ..Default::default()
        };
        record_usage(&mut writer, "claude-3-sonnet", &usage, 0.15, now);
        writer
    }

    #[test]
    fn test_new_mirror_is_zeroed_with_null_activity() {
        let now = at(2025, 1, 15, 10);
        let mirror = MirrorDocument::new(&now);
        assert_eq!(mirror.session.usage, MirrorBucket::default());
        assert_eq!(mirror.session.last_activity, None);
        assert_eq!(mirror.daily.date, "2025-01-15");
        assert_eq!(mirror.monthly.month, "2025-01");

        let json = serde_json::to_value(&mirror).unwrap();
        assert!(json["session"]["lastActivity"].is_null());
        assert!(json["daily"].get("costModels").is_some());
        assert!(json["daily"].get("tokens").is_some());
    }

    #[test]
    fn test_apply_writer_copies_with_short_names() {
        let now = at(2025, 1, 15, 10);
        let writer = writer_with_usage(&now);
        let mut mirror = MirrorDocument::new(&now);

        mirror.apply_writer(&writer);

        assert_eq!(mirror.session.usage.tokens, 15_234);
        assert_eq!(mirror.session.usage.models["gpt-4"], 10_000);
        assert_eq!(mirror.session.usage.models["claude-3-sonnet"], 5_234);
        assert!((mirror.session.usage.cost - 0.45).abs() < 1e-9);
        assert_eq!(mirror.session.last_activity, Some(millis(&now)));
        assert_eq!(mirror.daily.usage.tokens, 15_234);
        assert_eq!(mirror.total.usage.tokens, 15_234);
    }

    #[test]
    fn test_apply_writer_ignores_stale_daily() {
        let yesterday = at(2025, 1, 14, 22);
        let writer = writer_with_usage(&yesterday);
        let mut mirror = MirrorDocument::new(&at(2025, 1, 15, 8));

        mirror.apply_writer(&writer);
        assert_eq!(mirror.daily.usage.tokens, 0);
        assert_eq!(mirror.total.usage.tokens, 15_234);
    }

    #[test]
    fn test_apply_writer_does_not_copy_idle_flag() {
        let now = at(2025, 1, 15, 10);
        let mut writer = writer_with_usage(&now);
        writer.session.is_idle = true;
        writer.session.idle_since = Some(millis(&now));
        let mut mirror = MirrorDocument::new(&now);

        mirror.apply_writer(&writer);
        assert!(!mirror.session.is_idle);
    }

    #[test]
    fn test_roll_daily_and_month() {
        let mut mirror = MirrorDocument::new(&at(2025, 1, 31, 10));
        mirror.daily.usage.tokens = 5000;
        mirror.daily.usage.cost = 2.5;
        mirror.monthly.cost = 40.0;

        assert!(!mirror.roll_daily(&at(2025, 1, 31, 23)));
        assert_eq!(mirror.daily.usage.tokens, 5000);

        let next = at(2025, 2, 1, 0);
        assert!(mirror.roll_daily(&next));
        assert!(mirror.roll_month(&next));
        assert_eq!(mirror.daily.usage, MirrorBucket::default());
        assert_eq!(mirror.daily.date, "2025-02-01");
        assert_eq!(mirror.monthly.cost, 0.0);
        assert_eq!(mirror.monthly.month, "2025-02");
    }

    #[test]
    fn test_window_breakdown() {
        let now = at(2025, 1, 15, 10);
        let mut mirror = MirrorDocument::new(&now);
        mirror.apply_writer(&writer_with_usage(&now));

        let models = mirror.window(Window::Total).breakdown();
        assert_eq!(models[0].model, "gpt-4");
        assert_eq!(models[1].tokens, 5_234);
        assert!(mirror.window(Window::Session).models.contains_key("gpt-4"));
    }
}
