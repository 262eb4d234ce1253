//! LLM routing fallback, used when every deterministic layer abstains. The
//! model's JSON is treated as hostile input: unknown agents are dropped,
//! confidence is clamped, and any parse failure lands on the safe fallback.

use crate::config::RouterConfig;
use crate::prompts;
use huddle_llm::json::{clamp01, parse_object};
use huddle_llm::{CompletionClient, CompletionRequest};
use huddle_types::{ChatMessage, DecisionMode, RoutingDecision, SpecialistId};
use serde::Deserialize;

/// Fixed presentation order for multi-agent routes: evaluation first, then
/// planning, then people, then drafting.
const PRIORITY: [SpecialistId; 5] = [
    SpecialistId::IcpFit,
    SpecialistId::SalesStrategy,
    SpecialistId::StakeholderMap,
    SpecialistId::DraftOutreach,
    SpecialistId::Chat,
];

#[derive(Debug, Deserialize, Default)]
struct RouterPayload {
    #[serde(default)]
    agents: Vec<String>,
    #[serde(default)]
    mode: Option<String>,
    #[serde(default)]
    confidence: Option<f64>,
    #[serde(default)]
    reason: Option<String>,
}

/// Ask the completion model for a route. Never fails: provider errors and
/// unparseable output both produce the chat fallback.
pub async fn route(
    client: &dyn CompletionClient,
    text: &str,
    history: &[ChatMessage],
    cfg: &RouterConfig,
) -> RoutingDecision {
    let request = CompletionRequest::new(prompts::ROUTER_SYSTEM, routing_messages(text, history, cfg))
        .max_tokens(400)
        .json();

    let raw = match client.complete(request).await {
        Ok(raw) => raw,
        Err(error) => {
            tracing::warn!(%error, "router completion failed");
            return RoutingDecision::fallback("router call failed");
        }
    };

    let Some(value) = parse_object(&raw) else {
        tracing::warn!("router returned unparseable output");
        return RoutingDecision::fallback("router output was not valid JSON");
    };
    let payload: RouterPayload = match serde_json::from_value(value) {
        Ok(p) => p,
        Err(error) => {
            tracing::warn!(%error, "router JSON had an unexpected shape");
            return RoutingDecision::fallback("router output had an unexpected shape");
        }
    };

    normalize(payload, cfg)
}

/// Latest user text plus a short tail of history for context.
fn routing_messages(text: &str, history: &[ChatMessage], cfg: &RouterConfig) -> Vec<ChatMessage> {
    let tail = history.len().saturating_sub(cfg.context_window);
    let mut messages: Vec<ChatMessage> = history[tail..].to_vec();
    messages.push(ChatMessage::user(format!("Route this message: {text}")));
    messages
}

fn normalize(payload: RouterPayload, cfg: &RouterConfig) -> RoutingDecision {
    let mut agents: Vec<SpecialistId> = payload
        .agents
        .iter()
        .filter_map(|raw| SpecialistId::parse(raw))
        .collect();
    agents.sort_by_key(|a| PRIORITY.iter().position(|p| p == a));
    agents.dedup();

    if agents.is_empty() {
        return RoutingDecision::fallback("router proposed no known agents");
    }

    let mode = payload
        .mode
        .as_deref()
        .and_then(DecisionMode::parse)
        .unwrap_or(DecisionMode::Judgment);
    let confidence = clamp01(payload.confidence.unwrap_or(0.0)) as f32;
    let reason = payload
        .reason
        .unwrap_or_else(|| "model routing".to_string());

    let wants_specialists = agents.iter().any(|a| a.is_specialist());
    if wants_specialists && confidence < cfg.confidence_floor {
        return RoutingDecision {
            agents: vec![SpecialistId::Chat],
            mode: DecisionMode::Judgment,
            confidence,
            reason: format!("low routing confidence ({confidence:.2}), answering as chat"),
        };
    }

    RoutingDecision {
        agents,
        mode,
        confidence,
        reason,
    }
}
