//! Entity resolution: link a new thread to the account it is about.
//!
//! Three tiers, cheapest first: confident fuzzy match auto-links, plausible
//! matches are remembered on the message for disambiguation next turn, and
//! as a last resort an LLM extracts the organization name and upserts it.
//! Resolution is best-effort throughout; no failure here ever fails a turn.

use crate::config::ResolverConfig;
use crate::prompts;
use huddle_llm::json::{clamp01, parse_object};
use huddle_llm::{CompletionClient, CompletionRequest};
use huddle_persist::{AccountCandidate, AccountStore, MessageStore, StoredMessage};
use huddle_types::ChatMessage;
use serde::Deserialize;

#[derive(Debug)]
pub enum Resolution {
    /// Thread linked to this account id.
    Linked { account_id: String, name: String },
    /// Plausible matches stored on the message; the user picks next turn.
    Ambiguous(Vec<AccountCandidate>),
    /// Nothing confident enough to act on.
    Unresolved,
}

#[derive(Debug, Deserialize, Default)]
struct ExtractPayload {
    #[serde(default)]
    organization: Option<String>,
    #[serde(default)]
    confidence: Option<f64>,
}

/// Try to link `thread_id` to the account the message is about.
pub async fn resolve_account(
    accounts: &dyn AccountStore,
    messages: &dyn MessageStore,
    completion: &dyn CompletionClient,
    cfg: &ResolverConfig,
    tenant_id: &str,
    thread_id: &str,
    message: &StoredMessage,
) -> Resolution {
    let query = message.content.trim();
    if query.is_empty() {
        return Resolution::Unresolved;
    }

    let candidates = match accounts.search(tenant_id, query, cfg.disambiguate_limit.max(2)).await {
        Ok(candidates) => candidates,
        Err(error) => {
            tracing::warn!(%error, "account search failed during resolution");
            return Resolution::Unresolved;
        }
    };

    if let Some(top) = candidates.first() {
        let runner_up = candidates.get(1).map(|c| c.score).unwrap_or(0.0);
        if top.score >= cfg.auto_link_score && top.score - runner_up >= cfg.auto_link_margin {
            return link(messages, tenant_id, thread_id, &top.id, &top.name).await;
        }

        let plausible: Vec<AccountCandidate> = candidates
            .iter()
            .filter(|c| c.score >= cfg.plausible_score)
            .take(cfg.disambiguate_limit)
            .cloned()
            .collect();
        if !plausible.is_empty() {
            if let Err(error) = messages
                .set_resolved_candidates(tenant_id, &message.id, &plausible)
                .await
            {
                tracing::warn!(%error, "failed to store resolution candidates");
            }
            return Resolution::Ambiguous(plausible);
        }
    }

    extract_and_link(accounts, messages, completion, cfg, tenant_id, thread_id, query).await
}

/// No fuzzy match: ask the model whether the message names an organization,
/// and create the account if it does.
async fn extract_and_link(
    accounts: &dyn AccountStore,
    messages: &dyn MessageStore,
    completion: &dyn CompletionClient,
    cfg: &ResolverConfig,
    tenant_id: &str,
    thread_id: &str,
    query: &str,
) -> Resolution {
    let request = CompletionRequest::new(
        prompts::ORG_EXTRACT_SYSTEM,
        vec![ChatMessage::user(query.to_string())],
    )
    .max_tokens(200)
    .json();

    let raw = match completion.complete(request).await {
        Ok(raw) => raw,
        Err(error) => {
            tracing::warn!(%error, "organization extraction call failed");
            return Resolution::Unresolved;
        }
    };

    let payload: ExtractPayload = match parse_object(&raw).and_then(|v| serde_json::from_value(v).ok())
    {
        Some(p) => p,
        None => {
            tracing::warn!("organization extraction returned unparseable output");
            return Resolution::Unresolved;
        }
    };

    let confidence = clamp01(payload.confidence.unwrap_or(0.0)) as f32;
    let name = match payload.organization {
        Some(name) if !name.trim().is_empty() && confidence >= cfg.extract_confidence => name,
        _ => return Resolution::Unresolved,
    };

    let account = match accounts.upsert_by_normalized_name(tenant_id, name.trim()).await {
        Ok(account) => account,
        Err(error) => {
            tracing::warn!(%error, "account upsert failed during resolution");
            return Resolution::Unresolved;
        }
    };

    link(messages, tenant_id, thread_id, &account.id, &account.name).await
}

async fn link(
    messages: &dyn MessageStore,
    tenant_id: &str,
    thread_id: &str,
    account_id: &str,
    name: &str,
) -> Resolution {
    match messages.link_account(tenant_id, thread_id, account_id).await {
        Ok(()) => Resolution::Linked {
            account_id: account_id.to_string(),
            name: name.to_string(),
        },
        Err(error) => {
            tracing::warn!(%error, "failed to link thread to account");
            Resolution::Unresolved
        }
    }
}
