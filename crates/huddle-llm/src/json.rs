//! Hygiene helpers for loosely-formatted model JSON.
//!
//! Routing and extraction prompts demand bare JSON objects, but models still
//! wrap output in code fences or stray prose often enough that every
//! boundary re-validates with these helpers before trusting a byte.

use serde_json::Value;

/// Strip a leading ```/```json fence and a trailing ``` fence, if present.
pub fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();

    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    let rest = rest.strip_suffix("```").unwrap_or(rest);
    rest.trim()
}

/// Slice out the first `{ ... }` span (first `{` to last `}`).
pub fn extract_first_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end <= start {
        return None;
    }
    Some(&text[start..=end])
}

/// Best-effort parse of a JSON object from model output: direct parse after
/// fence stripping, then a first-object slice. Returns `None` rather than
/// guessing when nothing parses — callers fall back to their safe variant.
pub fn parse_object(text: &str) -> Option<Value> {
    let cleaned = strip_code_fences(text);
    if cleaned.is_empty() {
        return None;
    }

    if let Ok(value) = serde_json::from_str::<Value>(cleaned) {
        if value.is_object() {
            return Some(value);
        }
    }

    let candidate = extract_first_object(cleaned)?;
    match serde_json::from_str::<Value>(candidate) {
        Ok(value) if value.is_object() => Some(value),
        _ => None,
    }
}

/// Clamp a loose confidence number into 0.0..=1.0 (NaN becomes 0).
pub fn clamp01(n: f64) -> f64 {
    if n.is_nan() {
        return 0.0;
    }
    n.clamp(0.0, 1.0)
}
