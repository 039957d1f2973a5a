use chrono::{DateTime, Local};

use crate::events::{parse_event, HostEvent};
use crate::idle::{IdleTracker, IdleTransition};
use crate::usage::{record_usage, StatisticsDocument, StatsStore};

/// Writer side: owns the statistics document for one OpenCode session and
/// persists it after every change.
pub struct Exporter {
    store: StatsStore,
    doc: StatisticsDocument,
    idle: IdleTracker,
}

impl Exporter {
    /// Begin a session: load, reset the session window, persist
    pub fn start(store: StatsStore, idle: IdleTracker, now: &DateTime<Local>) -> Self {
        let doc = store.start_session(now);
        tracing::info!(
            path = %store.path().display(),
            total_tokens = doc.total.usage.total_tokens,
            "Session started"
        );
        Self { store, doc, idle }
    }

    pub fn document(&self) -> &StatisticsDocument {
        &self.doc
    }

    /// Handle one raw line from the host; bad lines are logged and dropped
    pub fn handle_line(&mut self, line: &str, now: &DateTime<Local>) {
        let line = line.trim();
        if line.is_empty() {
            return;
        }
        match parse_event(line) {
            Ok(event) => self.handle_event(event, now),
            Err(e) => tracing::warn!("Error processing event: {}", e),
        }
    }

    pub fn handle_event(&mut self, event: HostEvent, now: &DateTime<Local>) {
        match event {
            HostEvent::Usage(message) => {
                let recorded = record_usage(
                    &mut self.doc,
                    &message.model_id,
                    &message.tokens,
                    message.cost,
                    now,
                );
                if recorded.ended_idle {
                    tracing::info!("Session is active again");
                }
                self.persist();
                tracing::debug!(
                    model = %message.model_id,
                    tokens = recorded.tokens,
                    cost = recorded.cost,
                    "Tracked tokens and cost for model"
                );
            }
            HostEvent::SessionIdle => {
                tracing::debug!("Received session.idle event");
                let idle_start = now.timestamp_millis();
                if let Some(transition) = self.idle.signal_idle(&mut self.doc.session, idle_start, now) {
                    self.on_transition(transition, "real-time event");
                }
            }
            HostEvent::Skipped(reason) => {
                tracing::trace!(?reason, "Event skipped");
            }
        }
    }

    /// Fallback idle check and date rollover, run on the poll interval
    pub fn poll(&mut self, now: &DateTime<Local>) {
        if self.doc.roll_daily(now) {
            tracing::info!(date = %self.doc.daily.date, "Daily statistics reset for a new day");
            self.persist();
        }
        if let Some(transition) = self.idle.poll(&mut self.doc.session, now) {
            self.on_transition(transition, "fallback detection");
        }
    }

    /// Final write before the process exits
    pub fn shutdown(&mut self) {
        self.persist();
        tracing::info!(
            session_tokens = self.doc.session.usage.total_tokens,
            "Exporter stopped"
        );
    }

    fn on_transition(&mut self, transition: IdleTransition, source: &str) {
        self.persist();
        match transition {
            IdleTransition::BecameIdle { idle_minutes, .. } => {
                tracing::info!(idle_minutes, source, "Session became idle");
            }
            IdleTransition::BecameActive => tracing::info!("Session is active again"),
        }
    }

    fn persist(&self) {
        if let Err(e) = self.store.save(&self.doc) {
            tracing::error!("Error saving stats: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::idle::DEFAULT_IDLE_THRESHOLD_MINUTES;
    use chrono::{Duration, TimeZone};
    use tempfile::TempDir;

    const GPT4_EVENT: &str = r#"{"type":"message.updated","properties":{"info":{"role":"assistant","modelID":"gpt-4","time":{"completed":1},"tokens":{"input":100,"output":50,"reasoning":0,"cache":{"read":0,"write":0}},"cost":0.01}}}"#;

    fn start() -> DateTime<Local> {
        Local.with_ymd_and_hms(2025, 1, 15, 10, 0, 0).unwrap()
    }

    fn exporter_in(dir: &TempDir, now: &DateTime<Local>) -> Exporter {
        let store = StatsStore::new(dir.path().join("stats.json"));
        Exporter::start(
            store,
            IdleTracker::from_minutes(DEFAULT_IDLE_THRESHOLD_MINUTES),
            now,
        )
    }

    fn saved(dir: &TempDir) -> StatisticsDocument {
        StatsStore::new(dir.path().join("stats.json"))
            .try_load()
            .unwrap()
    }

    #[test]
    fn test_start_writes_initial_document() {
        let dir = TempDir::new().unwrap();
        let now = start();
        let exporter = exporter_in(&dir, &now);
        assert_eq!(saved(&dir), *exporter.document());
    }

    #[test]
    fn test_usage_idle_and_resume_scenario() {
        let dir = TempDir::new().unwrap();
        let now = start();
        let mut exporter = exporter_in(&dir, &now);

        exporter.handle_line(GPT4_EVENT, &now);
        assert_eq!(exporter.document().session.usage.total_tokens, 150);
        assert!(!exporter.document().session.is_idle);
        assert_eq!(saved(&dir).session.usage.total_tokens, 150);

        let idle_at = now + Duration::minutes(16);
        exporter.poll(&idle_at);
        assert!(exporter.document().session.is_idle);
        assert!(saved(&dir).session.is_idle);

        exporter.handle_line(GPT4_EVENT, &(idle_at + Duration::seconds(5)));
        let doc = saved(&dir);
        assert!(!doc.session.is_idle);
        assert_eq!(doc.session.idle_since, None);
        assert_eq!(doc.session.usage.total_tokens, 300);
    }

    #[test]
    fn test_session_idle_event_marks_idle_immediately() {
        let dir = TempDir::new().unwrap();
        let now = start();
        let mut exporter = exporter_in(&dir, &now);

        exporter.handle_line(r#"{"type":"session.idle"}"#, &now);
        assert!(!exporter.document().session.is_idle);

        exporter.handle_line(GPT4_EVENT, &now);
        let signal_at = now + Duration::seconds(30);
        exporter.handle_line(r#"{"type":"session.idle"}"#, &signal_at);

        let doc = saved(&dir);
        assert!(doc.session.is_idle);
        assert_eq!(doc.session.idle_since, Some(signal_at.timestamp_millis()));

        // The fallback poll must not move idleSince
        exporter.poll(&(now + Duration::minutes(20)));
        assert_eq!(
            exporter.document().session.idle_since,
            Some(signal_at.timestamp_millis())
        );
    }

    #[test]
    fn test_bad_lines_are_ignored() {
        let dir = TempDir::new().unwrap();
        let now = start();
        let mut exporter = exporter_in(&dir, &now);

        exporter.handle_line("", &now);
        exporter.handle_line("garbage", &now);
        exporter.handle_line(r#"{"type":"message.updated"}"#, &now);
        exporter.handle_line(GPT4_EVENT, &now);

        assert_eq!(exporter.document().total.usage.total_tokens, 150);
    }

    #[test]
    fn test_poll_rolls_daily_after_midnight() {
        let dir = TempDir::new().unwrap();
        let evening = Local.with_ymd_and_hms(2025, 1, 14, 23, 30, 0).unwrap();
        let mut exporter = exporter_in(&dir, &evening);
        exporter.handle_line(GPT4_EVENT, &evening);

        let after_midnight = Local.with_ymd_and_hms(2025, 1, 15, 0, 1, 0).unwrap();
        exporter.poll(&after_midnight);

        let doc = saved(&dir);
        assert_eq!(doc.daily.date, "2025-01-15");
        assert_eq!(doc.daily.usage.total_tokens, 0);
        assert_eq!(doc.total.usage.total_tokens, 150);
    }

    #[test]
    fn test_restart_keeps_daily_and_total() {
        let dir = TempDir::new().unwrap();
        let now = start();
        let mut exporter = exporter_in(&dir, &now);
        exporter.handle_line(GPT4_EVENT, &now);
        exporter.shutdown();

        let restarted = exporter_in(&dir, &(now + Duration::hours(1)));
        let doc = restarted.document();
        assert_eq!(doc.session.usage.total_tokens, 0);
        assert_eq!(doc.daily.usage.total_tokens, 150);
        assert_eq!(doc.total.usage.total_tokens, 150);
    }
}
