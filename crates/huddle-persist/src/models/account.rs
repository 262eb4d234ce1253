use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A CRM-like entity representing the organization a thread discusses.
/// Unique per tenant on `normalized_name`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    pub tenant_id: String,
    pub name: String,
    pub normalized_name: String,
    /// Free-form tenant-owned facts blob, rendered into account memory.
    #[serde(default)]
    pub facts: serde_json::Value,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    pub fn new(tenant_id: impl Into<String>, name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            tenant_id: tenant_id.into(),
            normalized_name: normalize_account_name(&name),
            name,
            facts: serde_json::Value::Null,
            updated_at: Utc::now(),
        }
    }
}

/// A ranked fuzzy-search match, also stored transiently on a message row
/// when resolution asks the user to disambiguate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountCandidate {
    pub id: String,
    pub name: String,
    pub score: f32,
}

/// Dedup key: lowercased, whitespace-collapsed.
pub fn normalize_account_name(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Deterministic fuzzy score in 0.0..=1.0 between a query and an account
/// name. Exact normalized match scores 1.0; containment scores by coverage;
/// otherwise token overlap decides. Shared by every `AccountStore` backend
/// so ranking behaves identically in tests and production.
pub fn score_name_match(query: &str, name: &str) -> f32 {
    let q = normalize_account_name(query);
    let n = normalize_account_name(name);

    if q.is_empty() || n.is_empty() {
        return 0.0;
    }
    if q == n {
        return 1.0;
    }

    if n.contains(&q) || q.contains(&n) {
        let coverage = q.len().min(n.len()) as f32 / q.len().max(n.len()) as f32;
        return 0.6 + 0.35 * coverage;
    }

    let q_tokens: HashSet<&str> = q.split(' ').collect();
    let n_tokens: HashSet<&str> = n.split(' ').collect();
    let shared = q_tokens.intersection(&n_tokens).count() as f32;
    let total = q_tokens.union(&n_tokens).count() as f32;
    0.8 * (shared / total)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalization_collapses_whitespace_and_case() {
        assert_eq!(
            normalize_account_name("  Toronto   GENERAL  Hospital "),
            "toronto general hospital"
        );
    }

    #[test]
    fn exact_match_scores_one() {
        assert_eq!(score_name_match("Toronto General", "toronto  general"), 1.0);
    }

    #[test]
    fn containment_beats_token_overlap() {
        let contained = score_name_match("Toronto General", "Toronto General Hospital");
        let overlap = score_name_match("Toronto Clinic", "Toronto General Hospital");
        assert!(contained > overlap);
        assert!(contained > 0.6);
    }

    #[test]
    fn disjoint_names_score_zero() {
        assert_eq!(score_name_match("Acme Corp", "Zenith Labs"), 0.0);
        assert_eq!(score_name_match("", "anything"), 0.0);
    }

    #[test]
    fn account_gets_normalized_name_on_construction() {
        let account = Account::new("t1", "  Meadville  Medical Center");
        assert_eq!(account.normalized_name, "meadville medical center");
    }
}
