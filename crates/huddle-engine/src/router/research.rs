//! Research decision. Heuristics decide the clear cases; an LLM decides the
//! rest; and whatever decided, the query invariant is enforced before the
//! decision leaves this module: a positive decision always carries at least
//! three distinct queries, or it is disabled.

use crate::config::ResearchConfig;
use crate::prompts;
use huddle_llm::json::parse_object;
use huddle_llm::{CompletionClient, CompletionRequest};
use huddle_types::{ChatMessage, ResearchDecision, RoutingDecision, SpecialistId};
use serde::Deserialize;

const MIN_QUERIES: usize = 3;
const MAX_QUERY_LEN: usize = 160;
const MAX_REASON_LEN: usize = 220;

#[derive(Debug, Deserialize, Default)]
struct ResearchPayload {
    #[serde(default)]
    needs_research: bool,
    #[serde(default)]
    queries: Vec<String>,
    #[serde(default)]
    reason: Option<String>,
}

/// Decide whether this turn needs live external research.
///
/// `subject` is the best-known name for what the turn is about (linked
/// account, or the message itself when it reads as one). `knowledge_rich`
/// means the internal knowledge base already answered well for this turn.
pub async fn decide(
    client: &dyn CompletionClient,
    text: &str,
    subject: Option<&str>,
    routing: &RoutingDecision,
    knowledge_rich: bool,
    cfg: &ResearchConfig,
) -> ResearchDecision {
    if !cfg.enabled {
        return ResearchDecision::skip("research disabled by configuration");
    }

    // Entity-evaluation routes always research their subject: internal notes
    // go stale, external facts do not.
    let entity_route = routing.agents.iter().any(|a| {
        matches!(
            a,
            SpecialistId::IcpFit | SpecialistId::SalesStrategy | SpecialistId::StakeholderMap
        )
    });
    if entity_route {
        if let Some(subject) = subject {
            return enforce(
                ResearchDecision {
                    needed: true,
                    queries: default_queries(subject),
                    reason: format!("evaluating {subject} needs current external facts"),
                },
                Some(subject),
            );
        }
    }

    if routing.agents.contains(&SpecialistId::DraftOutreach) {
        if let Some(subject) = subject {
            return enforce(
                ResearchDecision {
                    needed: true,
                    queries: contact_queries(subject),
                    reason: format!("personalizing outreach with current facts about {subject}"),
                },
                Some(subject),
            );
        }
    }

    // A chat turn the knowledge base already covers does not need the web.
    if knowledge_rich && routing.specialists().is_empty() {
        return ResearchDecision::skip("internal knowledge covers this turn");
    }

    // Nothing to look up: no linked subject and no proper noun in the turn.
    if subject.is_none() && !names_entity(text) {
        return ResearchDecision::skip("turn names no external subject");
    }

    llm_decide(client, text, subject).await
}

/// Crude proper-noun check: any capitalized word past the first.
fn names_entity(text: &str) -> bool {
    text.split_whitespace()
        .skip(1)
        .any(|w| w.chars().next().is_some_and(|c| c.is_uppercase()))
}

async fn llm_decide(
    client: &dyn CompletionClient,
    text: &str,
    subject: Option<&str>,
) -> ResearchDecision {
    let request = CompletionRequest::new(
        prompts::RESEARCH_SYSTEM,
        vec![ChatMessage::user(format!("Decide for this message: {text}"))],
    )
    .max_tokens(400)
    .json();

    let raw = match client.complete(request).await {
        Ok(raw) => raw,
        Err(error) => {
            tracing::warn!(%error, "research decision call failed");
            return ResearchDecision::skip("research decision call failed");
        }
    };

    let payload: ResearchPayload = match parse_object(&raw).and_then(|v| serde_json::from_value(v).ok())
    {
        Some(p) => p,
        None => {
            tracing::warn!("research decision returned unparseable output");
            return ResearchDecision::skip("research decision output was not valid JSON");
        }
    };

    enforce(
        ResearchDecision {
            needed: payload.needs_research,
            queries: payload.queries,
            reason: payload
                .reason
                .unwrap_or_else(|| "model research decision".to_string()),
        },
        subject,
    )
}

/// Enforce the query invariant on any decision, wherever it came from:
/// a `needed` decision carries >= 3 distinct non-empty queries, topped up
/// from defaults when a subject is known, or it flips to not-needed.
pub fn enforce(mut decision: ResearchDecision, subject: Option<&str>) -> ResearchDecision {
    truncate_chars(&mut decision.reason, MAX_REASON_LEN);

    if !decision.needed {
        decision.queries.clear();
        return decision;
    }

    let mut queries: Vec<String> = Vec::new();
    let mut seen = std::collections::HashSet::new();
    for raw in &decision.queries {
        let mut q = raw.trim().to_string();
        if q.is_empty() {
            continue;
        }
        truncate_chars(&mut q, MAX_QUERY_LEN);
        if seen.insert(q.to_lowercase()) {
            queries.push(q);
        }
    }

    if queries.len() < MIN_QUERIES {
        if let Some(subject) = subject {
            for q in default_queries(subject) {
                if queries.len() >= MIN_QUERIES {
                    break;
                }
                if seen.insert(q.to_lowercase()) {
                    queries.push(q);
                }
            }
        }
    }

    if queries.len() < MIN_QUERIES {
        return ResearchDecision::skip(
            "research requested without enough distinct queries and no subject to fill them",
        );
    }

    decision.queries = queries;
    decision
}

/// Char-boundary-safe truncation.
fn truncate_chars(s: &mut String, max: usize) {
    if let Some((idx, _)) = s.char_indices().nth(max) {
        s.truncate(idx);
    }
}

pub fn default_queries(subject: &str) -> Vec<String> {
    vec![
        format!("{subject} company overview"),
        format!("{subject} leadership team"),
        format!("{subject} recent news"),
    ]
}

fn contact_queries(subject: &str) -> Vec<String> {
    vec![
        format!("{subject} company overview"),
        format!("{subject} recent news"),
        format!("{subject} priorities and initiatives"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use huddle_llm::MockCompletionClient;
    use huddle_types::{DecisionMode, RoutingDecision};

    fn fit_route() -> RoutingDecision {
        RoutingDecision {
            agents: vec![SpecialistId::IcpFit],
            mode: DecisionMode::Rules,
            confidence: 0.9,
            reason: "test".to_string(),
        }
    }

    fn chat_route() -> RoutingDecision {
        RoutingDecision::fallback("test")
    }

    #[tokio::test]
    async fn entity_route_forces_research_without_an_llm_call() {
        let client = MockCompletionClient::new();
        let cfg = ResearchConfig::default();
        let d = decide(
            &client,
            "Meadville Medical Center",
            Some("Meadville Medical Center"),
            &fit_route(),
            false,
            &cfg,
        )
        .await;
        assert!(d.needed);
        assert!(d.queries.len() >= 3);
        assert!(client.requests().is_empty());
    }

    #[tokio::test]
    async fn knowledge_rich_chat_turn_skips_research() {
        let client = MockCompletionClient::new();
        let cfg = ResearchConfig::default();
        let d = decide(&client, "how does our tiering work?", None, &chat_route(), true, &cfg).await;
        assert!(!d.needed);
        assert!(d.queries.is_empty());
        assert!(client.requests().is_empty());
    }

    #[tokio::test]
    async fn subjectless_turn_skips_without_an_llm_call() {
        let client = MockCompletionClient::new();
        let cfg = ResearchConfig::default();
        let outreach = RoutingDecision {
            agents: vec![SpecialistId::DraftOutreach],
            mode: DecisionMode::Rules,
            confidence: 0.92,
            reason: "test".to_string(),
        };
        let d = decide(&client, "draft a follow-up email", None, &outreach, false, &cfg).await;
        assert!(!d.needed);
        assert!(client.requests().is_empty());
    }

    #[tokio::test]
    async fn disabled_config_skips_everything() {
        let client = MockCompletionClient::new();
        let cfg = ResearchConfig {
            enabled: false,
            ..ResearchConfig::default()
        };
        let d = decide(&client, "Acme Corp", Some("Acme Corp"), &fit_route(), false, &cfg).await;
        assert!(!d.needed);
    }

    #[test]
    fn positive_decision_with_too_few_queries_is_topped_up() {
        let d = enforce(
            ResearchDecision {
                needed: true,
                queries: vec!["acme corp funding".to_string()],
                reason: "r".to_string(),
            },
            Some("Acme Corp"),
        );
        assert!(d.needed);
        assert_eq!(d.queries.len(), 3);
        assert_eq!(d.queries[0], "acme corp funding");
    }

    #[test]
    fn positive_decision_without_subject_or_queries_is_disabled() {
        let d = enforce(
            ResearchDecision {
                needed: true,
                queries: vec![],
                reason: "r".to_string(),
            },
            None,
        );
        assert!(!d.needed);
        assert!(d.queries.is_empty());
    }

    #[test]
    fn duplicate_and_blank_queries_collapse() {
        let d = enforce(
            ResearchDecision {
                needed: true,
                queries: vec![
                    "Acme news".to_string(),
                    "acme news".to_string(),
                    "  ".to_string(),
                    "Acme leadership".to_string(),
                    "Acme funding".to_string(),
                ],
                reason: "r".to_string(),
            },
            None,
        );
        assert_eq!(d.queries.len(), 3);
    }

    #[test]
    fn negative_decision_drops_stray_queries() {
        let d = enforce(
            ResearchDecision {
                needed: false,
                queries: vec!["leftover".to_string()],
                reason: "r".to_string(),
            },
            None,
        );
        assert!(!d.needed);
        assert!(d.queries.is_empty());
    }

    #[tokio::test]
    async fn llm_decision_failure_degrades_to_skip() {
        let client = MockCompletionClient::new().failure("down");
        let cfg = ResearchConfig::default();
        let d = decide(&client, "tell me a joke", None, &chat_route(), false, &cfg).await;
        assert!(!d.needed);
    }
}
