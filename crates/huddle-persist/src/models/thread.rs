use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A persisted conversation between a user and the system.
///
/// `account_id`, once set, is never silently overwritten by automatic
/// resolution; only an explicit relink changes it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Thread {
    pub id: String,
    pub tenant_id: String,
    pub user_id: String,
    pub account_id: Option<String>,
    pub title: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Thread {
    pub fn new(tenant_id: impl Into<String>, user_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            tenant_id: tenant_id.into(),
            user_id: user_id.into(),
            account_id: None,
            title: None,
            created_at: now,
            updated_at: now,
        }
    }
}
