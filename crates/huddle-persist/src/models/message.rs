use crate::models::AccountCandidate;
use chrono::{DateTime, Utc};
use huddle_types::ChatRole;
use serde::{Deserialize, Serialize};

/// One persisted turn. Only user messages and the final synthesized
/// assistant reply are ever stored; intermediate context-injection messages
/// stay in memory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredMessage {
    pub id: String,
    pub thread_id: String,
    pub tenant_id: String,
    pub role: ChatRole,
    pub content: String,
    /// Transient side-channel: ambiguous entity-resolution matches remembered
    /// for the next turn's disambiguation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_candidates: Option<Vec<AccountCandidate>>,
    pub created_at: DateTime<Utc>,
}

impl StoredMessage {
    pub fn new(
        tenant_id: impl Into<String>,
        thread_id: impl Into<String>,
        role: ChatRole,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            thread_id: thread_id.into(),
            tenant_id: tenant_id.into(),
            role,
            content: content.into(),
            resolved_candidates: None,
            created_at: Utc::now(),
        }
    }
}
