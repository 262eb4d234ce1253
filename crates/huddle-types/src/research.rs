use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Ephemeral per-turn research decision.
///
/// Invariant: `needed == true` implies `queries.len() >= 3` with distinct,
/// non-empty entries; `needed == false` implies `queries` is empty. The
/// router enforces this before the decision ever reaches the research
/// client.
#[derive(Debug, Clone, PartialEq)]
pub struct ResearchDecision {
    pub needed: bool,
    pub queries: Vec<String>,
    pub reason: String,
}

impl ResearchDecision {
    pub fn skip(reason: impl Into<String>) -> Self {
        Self {
            needed: false,
            queries: Vec::new(),
            reason: reason.into(),
        }
    }
}

/// A normalized research citation: at least one of title/url is non-empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
}

impl Citation {
    /// Coerce a loosely-typed upstream citation into a flat pair.
    ///
    /// Providers have been observed sending `title`/`url` as a string, an
    /// array of strings, an object, or a bare URL string in place of the
    /// whole citation. Entries with neither a title nor a url are dropped.
    pub fn from_loose(value: &Value) -> Option<Citation> {
        let (title, url) = match value {
            Value::String(s) => (String::new(), s.trim().to_string()),
            Value::Object(map) => (
                loose_string(map.get("title")),
                loose_string(map.get("url")),
            ),
            _ => return None,
        };

        if title.is_empty() && url.is_empty() {
            None
        } else {
            Some(Citation { title, url })
        }
    }

    /// Normalize a provider citation list, dropping unusable entries.
    pub fn normalize_list(values: &[Value]) -> Vec<Citation> {
        values.iter().filter_map(Citation::from_loose).collect()
    }
}

fn loose_string(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Array(items)) => items
            .iter()
            .find_map(|x| x.as_str())
            .unwrap_or("")
            .trim()
            .to_string(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}
