//! Payload classification.
//!
//! Decision table, first match wins:
//!
//! ```text
//! status == "enabled"     → Enabled
//! status == "disabled"    → Disabled
//! FTLnotrunning is truthy → EngineDown
//! otherwise               → UnknownShape
//! ```

use serde_json::Value;

use holewatch_core::PollOutcome;

use crate::fetcher::{FetchError, Payload};

/// Classify a parsed status payload. Total over every mapping.
pub fn classify(payload: &Payload) -> PollOutcome {
    match payload.get("status").and_then(Value::as_str) {
        Some("enabled") => return PollOutcome::Enabled,
        Some("disabled") => return PollOutcome::Disabled,
        _ => {}
    }
    if payload.get("FTLnotrunning").is_some_and(is_truthy) {
        return PollOutcome::EngineDown;
    }
    PollOutcome::UnknownShape
}

/// Map a complete fetch result to exactly one outcome.
pub fn outcome_of(result: &Result<Payload, FetchError>) -> PollOutcome {
    match result {
        Ok(payload) => classify(payload),
        Err(FetchError::Unreachable(_)) => PollOutcome::Unreachable,
        Err(FetchError::MalformedResponse(_)) => PollOutcome::UnknownShape,
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}
