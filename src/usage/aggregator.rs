use chrono::{DateTime, Local};
use std::collections::HashMap;

use super::types::*;

/// Normalized token counts for a single completed message
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TokenUsage {
    pub input: u64,
    pub output: u64,
    pub reasoning: u64,
    pub cache_read: u64,
    pub cache_write: u64,
}

impl TokenUsage {
    /// Sum of every token kind, the delta folded into each window
    pub fn total(&self) -> u64 {
        self.input
            .saturating_add(self.output)
            .saturating_add(self.reasoning)
            .saturating_add(self.cache_read)
            .saturating_add(self.cache_write)
    }
}

/// What a call to [`record_usage`] changed
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RecordedUsage {
    pub tokens: u64,
    pub cost: f64,
    /// The session was idle and this event made it active again
    pub ended_idle: bool,
    /// The daily window was rolled over before folding
    pub rolled_daily: bool,
}

/// Fold one usage event into the session, daily and total windows.
///
/// Every call counts: two identical events are two events. The caller
/// persists the document afterwards.
pub fn record_usage(
    doc: &mut StatisticsDocument,
    model_id: &str,
    tokens: &TokenUsage,
    cost: f64,
    now: &DateTime<Local>,
) -> RecordedUsage {
    let delta = tokens.total();
    let cost = if cost.is_finite() && cost > 0.0 {
        cost
    } else {
        0.0
    };

    doc.session.usage.add(model_id, delta, cost);
    doc.session.last_activity = millis(now);
    let ended_idle = doc.session.is_idle;
    if ended_idle {
        doc.session.is_idle = false;
        doc.session.idle_since = None;
    }

    // A long-lived exporter may cross midnight between loads
    let rolled_daily = doc.roll_daily(now);
    doc.daily.usage.add(model_id, delta, cost);

    doc.total.usage.add(model_id, delta, cost);

    RecordedUsage {
        tokens: delta,
        cost,
        ended_idle,
        rolled_daily,
    }
}

/// Join per-model token and cost maps into a list sorted by tokens, largest first
pub fn model_breakdown(
    tokens_by_model: &HashMap<String, u64>,
    costs_by_model: &HashMap<String, f64>,
) -> Vec<ModelUsage> {
    let mut models: Vec<ModelUsage> = tokens_by_model
        .iter()
        .map(|(model, tokens)| ModelUsage {
            model: model.clone(),
            tokens: *tokens,
            cost: costs_by_model.get(model).copied().unwrap_or(0.0),
        })
        .collect();

    // Models that only ever reported cost still belong in the listing
    for (model, cost) in costs_by_model {
        if !tokens_by_model.contains_key(model) {
            models.push(ModelUsage {
                model: model.clone(),
                tokens: 0,
                cost: *cost,
            });
        }
    }

    models.sort_by(|a, b| b.tokens.cmp(&a.tokens).then_with(|| a.model.cmp(&b.model)));
    models
}
