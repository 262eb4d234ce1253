//! Layered turn router. Deterministic layers first (continuity, bare
//! account names, keyword intent), then the LLM fallback, then mode
//! enforcement over whatever won.

pub mod llm;
pub mod mode;
pub mod research;
pub mod rules;

use crate::config::RouterConfig;
use huddle_llm::CompletionClient;
use huddle_types::{ChatMessage, RoutingDecision};
use std::time::Duration;

/// Route one turn. Always returns a mode-consistent decision; a dead or
/// slow routing model degrades to the chat fallback, never an error.
pub async fn route_turn(
    client: &dyn CompletionClient,
    text: &str,
    history: &[ChatMessage],
    cfg: &RouterConfig,
    llm_timeout: Duration,
) -> RoutingDecision {
    let decision = match rules::route(text, history, cfg) {
        Some(decision) => decision,
        None => match tokio::time::timeout(llm_timeout, llm::route(client, text, history, cfg)).await
        {
            Ok(decision) => decision,
            Err(_) => {
                tracing::warn!(timeout_ms = llm_timeout.as_millis() as u64, "router timed out");
                RoutingDecision::fallback("router timed out")
            }
        },
    };

    let (mut decision, note) = mode::enforce(decision, &cfg.mode_bounds);
    if let Some(note) = note {
        decision.reason = format!("{} ({note})", decision.reason);
    }
    decision
}
