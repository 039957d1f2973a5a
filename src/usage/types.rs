use chrono::{DateTime, Local};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;

/// Format a local timestamp as the `YYYY-MM-DD` key of the daily window
pub fn date_string(now: &DateTime<Local>) -> String {
    now.format("%Y-%m-%d").to_string()
}

/// Format a local timestamp as the `YYYY-MM` key of the monthly window
pub fn month_string(now: &DateTime<Local>) -> String {
    now.format("%Y-%m").to_string()
}

/// Unix milliseconds, the timestamp unit used in every statistics file
pub fn millis(now: &DateTime<Local>) -> i64 {
    now.timestamp_millis()
}

/// A token count as some other writer may have stored it
#[derive(Deserialize)]
#[serde(untagged)]
enum Count {
    Whole(u64),
    Real(f64),
}

impl Count {
    /// Fractions are truncated; negative or non-finite values become 0
    fn value(self) -> u64 {
        match self {
            Count::Whole(n) => n,
            Count::Real(x) if x.is_finite() && x > 0.0 => x as u64,
            Count::Real(_) => 0,
        }
    }
}

fn lenient_count<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    Count::deserialize(deserializer).map(Count::value)
}

fn lenient_counts<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<HashMap<String, u64>, D::Error> {
    let counts = HashMap::<String, Count>::deserialize(deserializer)?;
    Ok(counts.into_iter().map(|(model, n)| (model, n.value())).collect())
}

/// Token and cost counters shared by every usage window.
///
/// After any update `total_tokens` equals the sum of `tokens_by_model` and
/// `total_cost` the sum of `costs_by_model`. Documents read from disk are
/// accepted as they are.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UsageBucket {
    #[serde(deserialize_with = "lenient_count")]
    pub total_tokens: u64,
    #[serde(deserialize_with = "lenient_counts")]
    pub tokens_by_model: HashMap<String, u64>,
    pub total_cost: f64,
    pub costs_by_model: HashMap<String, f64>,
}

impl UsageBucket {
    /// Fold one usage event into the bucket
    pub fn add(&mut self, model_id: &str, tokens: u64, cost: f64) {
        self.total_tokens = self.total_tokens.saturating_add(tokens);
        let model_tokens = self.tokens_by_model.entry(model_id.to_string()).or_insert(0);
        *model_tokens = model_tokens.saturating_add(tokens);

        self.total_cost += cost;
        *self.costs_by_model.entry(model_id.to_string()).or_insert(0.0) += cost;
    }

    pub fn is_empty(&self) -> bool {
        self.total_tokens == 0 && self.tokens_by_model.is_empty()
    }
}

/// Counters for the running OpenCode session
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionBucket {
    #[serde(flatten)]
    pub usage: UsageBucket,
    /// Unix millis of the last recorded message
    pub last_activity: i64,
    /// Unix millis when the session was started
    pub start_time: i64,
    pub is_idle: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub idle_since: Option<i64>,
}

impl SessionBucket {
    pub fn started_at(now: &DateTime<Local>) -> Self {
        let now = millis(now);
        Self {
            usage: UsageBucket::default(),
            last_activity: now,
            start_time: now,
            is_idle: false,
            idle_since: None,
        }
    }
}

/// Counters for the current local calendar day
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DailyBucket {
    #[serde(flatten)]
    pub usage: UsageBucket,
    /// `YYYY-MM-DD`
    pub date: String,
}

impl DailyBucket {
    pub fn for_date(date: String) -> Self {
        Self {
            usage: UsageBucket::default(),
            date,
        }
    }
}

/// Counters accumulated since the statistics file was created
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TotalBucket {
    #[serde(flatten)]
    pub usage: UsageBucket,
    pub install_date: i64,
}

/// The writer-owned statistics document persisted as `stats.json`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatisticsDocument {
    pub session: SessionBucket,
    pub daily: DailyBucket,
    pub total: TotalBucket,
}

impl StatisticsDocument {
    /// A fresh document with zeroed counters stamped with `now`
    pub fn new(now: &DateTime<Local>) -> Self {
        Self {
            session: SessionBucket::started_at(now),
            daily: DailyBucket::for_date(date_string(now)),
            total: TotalBucket {
                usage: UsageBucket::default(),
                install_date: millis(now),
            },
        }
    }

    /// Start a new session window; daily and total are left alone
    pub fn reset_session(&mut self, now: &DateTime<Local>) {
        self.session = SessionBucket::started_at(now);
    }

    /// Replace the daily window when its date is not today's.
    /// Returns true when a rollover happened.
    pub fn roll_daily(&mut self, now: &DateTime<Local>) -> bool {
        let today = date_string(now);
        if self.daily.date == today {
            return false;
        }
        self.daily = DailyBucket::for_date(today);
        true
    }
}

/// Per-model usage entry for breakdown listings
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelUsage {
    pub model: String,
    pub tokens: u64,
    pub cost: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    #[test]
    fn test_date_string_pads_month_and_day() {
        assert_eq!(date_string(&at(2025, 1, 5, 10, 0)), "2025-01-05");
        assert_eq!(date_string(&at(2025, 12, 31, 23, 59)), "2025-12-31");
        assert_eq!(month_string(&at(2025, 6, 1, 0, 0)), "2025-06");
    }

    #[test]
    fn test_new_document_is_zeroed() {
        let now = at(2025, 1, 15, 10, 0);
        let doc = StatisticsDocument::new(&now);

        assert_eq!(doc.session.usage, UsageBucket::default());
        assert_eq!(doc.daily.usage, UsageBucket::default());
        assert_eq!(doc.total.usage, UsageBucket::default());
        assert_eq!(doc.daily.date, "2025-01-15");
        assert_eq!(doc.session.start_time, millis(&now));
        assert_eq!(doc.total.install_date, millis(&now));
        assert!(!doc.session.is_idle);
        assert_eq!(doc.session.idle_since, None);
    }

    #[test]
    fn test_roll_daily_only_on_date_change() {
        let mut doc = StatisticsDocument::new(&at(2025, 1, 14, 9, 0));
        doc.daily.usage.add("gpt-4", 3000, 1.5);
        doc.daily.usage.add("claude-3", 2000, 1.0);
        let before = doc.daily.clone();

        assert!(!doc.roll_daily(&at(2025, 1, 14, 23, 59)));
        assert_eq!(doc.daily, before);

        assert!(doc.roll_daily(&at(2025, 1, 15, 0, 1)));
        assert_eq!(doc.daily.usage.total_tokens, 0);
        assert_eq!(doc.daily.usage.total_cost, 0.0);
        assert!(doc.daily.usage.tokens_by_model.is_empty());
        assert_eq!(doc.daily.date, "2025-01-15");
    }

    #[test]
    fn test_roll_daily_across_year() {
        let mut doc = StatisticsDocument::new(&at(2024, 12, 31, 22, 0));
        assert!(doc.roll_daily(&at(2025, 1, 1, 0, 0)));
        assert_eq!(doc.daily.date, "2025-01-01");
    }

    #[test]
    fn test_serializes_camel_case_and_omits_idle_since() {
        let doc = StatisticsDocument::new(&at(2025, 1, 15, 10, 0));
        let json = serde_json::to_value(&doc).unwrap();

        let session = &json["session"];
        assert!(session.get("totalTokens").is_some());
        assert!(session.get("tokensByModel").is_some());
        assert!(session.get("costsByModel").is_some());
        assert!(session.get("lastActivity").is_some());
        assert!(session.get("idleSince").is_none());
        assert_eq!(json["daily"]["date"], "2025-01-15");
        assert!(json["total"].get("installDate").is_some());
    }

    #[test]
    fn test_missing_fields_default_to_zero() {
        let json = r#"{ "daily": { "date": "2025-01-14", "totalTokens": 5 }, "total": {} }"#;
        let doc: StatisticsDocument = serde_json::from_str(json).unwrap();

        assert_eq!(doc.daily.usage.total_tokens, 5);
        assert!(doc.daily.usage.tokens_by_model.is_empty());
        assert_eq!(doc.daily.usage.total_cost, 0.0);
        assert_eq!(doc.session.usage.total_tokens, 0);
        assert_eq!(doc.total.install_date, 0);
    }

    #[test]
    fn test_accepts_counts_written_as_floats() {
        let json = r#"{
            "session": { "totalTokens": 150.0, "tokensByModel": { "gpt-4": 150.0, "odd": -2 } },
            "total": { "totalTokens": 3000.9, "tokensByModel": { "gpt-4": 3000 }, "installDate": 1 }
        }"#;
        let doc: StatisticsDocument = serde_json::from_str(json).unwrap();

        assert_eq!(doc.session.usage.total_tokens, 150);
        assert_eq!(doc.session.usage.tokens_by_model["gpt-4"], 150);
        assert_eq!(doc.session.usage.tokens_by_model["odd"], 0);
        assert_eq!(doc.total.usage.total_tokens, 3000);
        assert_eq!(doc.total.usage.tokens_by_model["gpt-4"], 3000);
        assert_eq!(doc.total.install_date, 1);
    }

    #[test]
    fn test_reads_integer_costs() {
        let json = r#"{ "total": { "totalCost": 3, "costsByModel": { "gpt-4": 3 } } }"#;
        let doc: StatisticsDocument = serde_json::from_str(json).unwrap();
        assert_eq!(doc.total.usage.total_cost, 3.0);
        assert_eq!(doc.total.usage.costs_by_model["gpt-4"], 3.0);
    }
}
