use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One relevance-ranked snippet from the internal knowledge base.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeItem {
    pub id: String,
    pub title: Option<String>,
    pub content: String,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rank: Option<f32>,
}
