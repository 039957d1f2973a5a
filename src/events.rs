//! Host events consumed by the exporter, one JSON object per line.
//!
//! Every field is optional on the wire; [`parse_event`] is the single place
//! where missing values become zeros.

use serde::Deserialize;

use crate::usage::TokenUsage;

/// Model id recorded when a message does not name one
pub const UNKNOWN_MODEL: &str = "unknown";

#[derive(Debug, Deserialize)]
struct RawEvent {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    properties: Option<RawProperties>,
}

#[derive(Debug, Default, Deserialize)]
struct RawProperties {
    #[serde(default)]
    info: Option<RawMessage>,
}

#[derive(Debug, Default, Deserialize)]
struct RawMessage {
    #[serde(default)]
    role: Option<String>,
    #[serde(rename = "modelID", default)]
    model_id: Option<String>,
    #[serde(default)]
    time: Option<RawMessageTime>,
    #[serde(default)]
    tokens: Option<RawTokens>,
    #[serde(default)]
    cost: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct RawMessageTime {
    #[serde(default)]
    completed: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct RawTokens {
    #[serde(default)]
    input: Option<u64>,
    #[serde(default)]
    output: Option<u64>,
    #[serde(default)]
    reasoning: Option<u64>,
    #[serde(default)]
    cache: Option<RawCache>,
}

#[derive(Debug, Default, Deserialize)]
struct RawCache {
    #[serde(default)]
    read: Option<u64>,
    #[serde(default)]
    write: Option<u64>,
}

/// A completed assistant message with normalized usage
#[derive(Debug, Clone, PartialEq)]
pub struct CompletedMessage {
    pub model_id: String,
    pub tokens: TokenUsage,
    pub cost: f64,
}

/// Why an event did not produce usage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NoMessage,
    NotAssistant,
    InProgress,
    NoTokens,
    UnknownType,
}

#[derive(Debug, Clone, PartialEq)]
pub enum HostEvent {
    Usage(CompletedMessage),
    SessionIdle,
    Skipped(SkipReason),
}

/// Parse one event line from the host
pub fn parse_event(line: &str) -> Result<HostEvent, serde_json::Error> {
    let raw: RawEvent = serde_json::from_str(line)?;

    let event = match raw.kind.as_str() {
        "session.idle" => HostEvent::SessionIdle,
        "message.updated" => match raw.properties.and_then(|p| p.info) {
            Some(message) => normalize_message(message),
            None => HostEvent::Skipped(SkipReason::NoMessage),
        },
        _ => HostEvent::Skipped(SkipReason::UnknownType),
    };
    Ok(event)
}

fn normalize_message(message: RawMessage) -> HostEvent {
    if message.role.as_deref() != Some("assistant") {
        return HostEvent::Skipped(SkipReason::NotAssistant);
    }
    let completed = message
        .time
        .and_then(|t| t.completed)
        .is_some_and(|c| c != 0.0);
    if !completed {
        return HostEvent::Skipped(SkipReason::InProgress);
    }
    let Some(tokens) = message.tokens else {
        return HostEvent::Skipped(SkipReason::NoTokens);
    };

    let cache = tokens.cache.unwrap_or_default();
    let usage = TokenUsage {
        input: tokens.input.unwrap_or(0),
        output: tokens.output.unwrap_or(0),
        reasoning: tokens.reasoning.unwrap_or(0),
        cache_read: cache.read.unwrap_or(0),
        cache_write: cache.write.unwrap_or(0),
    };

    let model_id = message
        .model_id
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| UNKNOWN_MODEL.to_string());
    let cost = message
        .cost
        .filter(|c| c.is_finite() && *c > 0.0)
        .unwrap_or(0.0);

    HostEvent::Usage(CompletedMessage {
        model_id,
        tokens: usage,
        cost,
    })
}
