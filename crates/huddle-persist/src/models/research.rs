use chrono::{DateTime, Utc};
use huddle_types::Citation;
use serde::{Deserialize, Serialize};

/// Cached external-research payload. Entries are append-only; freshness is
/// enforced at read time against the TTL window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchCacheEntry {
    pub answer: String,
    pub citations: Vec<Citation>,
    pub created_at: DateTime<Utc>,
}

impl ResearchCacheEntry {
    pub fn new(answer: impl Into<String>, citations: Vec<Citation>) -> Self {
        Self {
            answer: answer.into(),
            citations,
            created_at: Utc::now(),
        }
    }
}
