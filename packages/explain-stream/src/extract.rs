//! Recover a JSON object from free-form model output.
//!
//! Generative output may wrap the object in prose or code fences. The scan
//! takes everything from the first `{` to the last `}` and tries to parse it.

use serde_json::Value;

use crate::frame::StructuredExplanation;

/// Slice from the first `{` to the last `}` (inclusive), if both exist in order.
pub fn bracket_scan(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end <= start {
        return None;
    }
    Some(&text[start..=end])
}

/// Bracket-scan and parse into a JSON object. Never fails loudly.
pub fn parse_object(text: &str) -> Option<Value> {
    let candidate = bracket_scan(text)?;
    match serde_json::from_str::<Value>(candidate) {
        Ok(value) if value.is_object() => Some(value),
        Ok(_) => None,
        Err(e) => {
            tracing::debug!(error = %e, len = candidate.len(), "bracket scan candidate did not parse");
            None
        }
    }
}

/// Bracket-scan and parse into a structured explanation.
pub fn parse_structured(text: &str) -> Option<StructuredExplanation> {
    parse_object(text).and_then(StructuredExplanation::from_value)
}
