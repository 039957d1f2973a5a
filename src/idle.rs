//! Active/idle state machine shared by the exporter and the watcher.
//!
//! Both trigger paths, the periodic poll and an external "session idle"
//! signal, go through the same transition so a session is reported idle
//! once per Active -> Idle edge.

use chrono::{DateTime, Local};
use std::time::Duration;

use crate::usage::{millis, SessionBucket};

const MINUTE_MS: i64 = 60 * 1000;

/// Default inactivity before a session counts as idle
pub const DEFAULT_IDLE_THRESHOLD_MINUTES: i64 = 15;

/// Default interval of the fallback idle poll
pub const DEFAULT_POLL_INTERVAL_SECONDS: i64 = 60;

/// Session state the idle tracker reads and flips
pub trait IdleSubject {
    /// Tokens used so far; a session that never used any never goes idle
    fn session_tokens(&self) -> u64;
    /// Unix millis of the last activity, if any was seen
    fn last_activity(&self) -> Option<i64>;
    fn is_idle(&self) -> bool;
    fn idle_since(&self) -> Option<i64>;
    fn set_idle(&mut self, since: i64);
    fn clear_idle(&mut self);
}

/// An edge of the active/idle state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdleTransition {
    BecameIdle {
        /// Unix millis the idle period started
        idle_since: i64,
        /// Whole minutes idle at the moment of the transition
        idle_minutes: i64,
    },
    BecameActive,
}

/// Whole minutes between `since` and `now`, both Unix millis
pub fn idle_minutes(since: i64, now: i64) -> i64 {
    now.saturating_sub(since).max(0) / MINUTE_MS
}

/// Which instant a polled idle period is stamped with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IdleStart {
    /// The poll that noticed the idle state
    #[default]
    Detection,
    /// The last recorded activity
    LastActivity,
}

#[derive(Debug, Clone, Copy)]
pub struct IdleTracker {
    threshold_ms: i64,
    idle_start: IdleStart,
}

impl Default for IdleTracker {
    fn default() -> Self {
        Self::from_minutes(DEFAULT_IDLE_THRESHOLD_MINUTES)
    }
}

impl IdleTracker {
    pub fn new(threshold: Duration) -> Self {
        Self {
            threshold_ms: i64::try_from(threshold.as_millis()).unwrap_or(i64::MAX),
            idle_start: IdleStart::default(),
        }
    }

    /// Negative minutes count as zero
    pub fn from_minutes(minutes: i64) -> Self {
        Self {
            threshold_ms: minutes.max(0).saturating_mul(MINUTE_MS),
            idle_start: IdleStart::default(),
        }
    }

    pub fn with_idle_start(mut self, idle_start: IdleStart) -> Self {
        self.idle_start = idle_start;
        self
    }

    pub fn threshold_ms(&self) -> i64 {
        self.threshold_ms
    }

    /// Re-evaluate the session against the threshold.
    ///
    /// Goes idle once `now - last_activity` reaches the threshold and the
    /// session has used tokens; goes active again when the elapsed time is
    /// back under the threshold, which means new activity was recorded.
    pub fn poll<S: IdleSubject>(
        &self,
        subject: &mut S,
        now: &DateTime<Local>,
    ) -> Option<IdleTransition> {
        let last_activity = subject.last_activity()?;
        let now = millis(now);
        let elapsed = now.saturating_sub(last_activity);

        if elapsed >= self.threshold_ms && subject.session_tokens() > 0 {
            let since = match self.idle_start {
                IdleStart::Detection => now,
                IdleStart::LastActivity => last_activity,
            };
            self.enter_idle(subject, since, now)
        } else if subject.is_idle() && elapsed < self.threshold_ms {
            subject.clear_idle();
            Some(IdleTransition::BecameActive)
        } else {
            None
        }
    }

    /// Mark the session idle right away on an external signal.
    /// `idle_start` is when the host says the idle period began.
    pub fn signal_idle<S: IdleSubject>(
        &self,
        subject: &mut S,
        idle_start: i64,
        now: &DateTime<Local>,
    ) -> Option<IdleTransition> {
        self.enter_idle(subject, idle_start, millis(now))
    }

    fn enter_idle<S: IdleSubject>(
        &self,
        subject: &mut S,
        idle_start: i64,
        now: i64,
    ) -> Option<IdleTransition> {
        if subject.is_idle() || subject.session_tokens() == 0 {
            return None;
        }
        subject.set_idle(idle_start);
        Some(IdleTransition::BecameIdle {
            idle_since: idle_start,
            idle_minutes: idle_minutes(idle_start, now),
        })
    }
}

impl IdleSubject for SessionBucket {
    fn session_tokens(&self) -> u64 {
        self.usage.total_tokens
    }

    fn last_activity(&self) -> Option<i64> {
        Some(self.last_activity)
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
