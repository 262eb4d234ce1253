//! External research execution: cache lookup, live fetch with a deadline,
//! and write-behind caching. Like every other context source, research
//! failure degrades the turn instead of failing it.

use crate::config::EngineConfig;
use huddle_persist::{ResearchCache, ResearchCacheEntry};
use huddle_llm::{ResearchClient, ResearchRequest};
use huddle_types::{ChatMessage, Citation, ResearchDecision, RoutingDecision};
use std::sync::Arc;

/// Longest subject slice participating in the cache key.
const KEY_SUBJECT_CHARS: usize = 200;
/// Queries past this many do not differentiate cache entries.
const KEY_MAX_QUERIES: usize = 4;

#[derive(Debug, Clone)]
pub struct ResearchContext {
    /// Ready-to-inject context block.
    pub block: String,
    pub citations: Vec<Citation>,
    pub from_cache: bool,
}

/// Deterministic cache key over everything that shapes the answer: the
/// route, the exact query set, and the subject.
pub fn cache_key(route: &RoutingDecision, queries: &[String], subject: &str) -> String {
    let agents: Vec<&str> = route.agents.iter().map(|a| a.as_str()).collect();
    let qs: Vec<String> = queries
        .iter()
        .take(KEY_MAX_QUERIES)
        .map(|q| q.trim().to_lowercase())
        .collect();
    let subject: String = subject
        .trim()
        .to_lowercase()
        .chars()
        .take(KEY_SUBJECT_CHARS)
        .collect();
    format!("route={}::q={}::u={}", agents.join("+"), qs.join("|"), subject)
}

/// Run the research decision: serve from cache when fresh, otherwise fetch
/// live and cache the result in the background.
pub async fn fetch(
    client: &dyn ResearchClient,
    cache: Arc<dyn ResearchCache>,
    cfg: &EngineConfig,
    tenant_id: &str,
    decision: &ResearchDecision,
    route: &RoutingDecision,
    subject: &str,
) -> Option<ResearchContext> {
    if !decision.needed {
        return None;
    }

    let key = cache_key(route, &decision.queries, subject);

    match cache.get(tenant_id, &key, cfg.cache_ttl()).await {
        Ok(Some(entry)) => {
            tracing::debug!(key, "research cache hit");
            return Some(ResearchContext {
                block: render_block(subject, &entry.answer, &entry.citations),
                citations: entry.citations,
                from_cache: true,
            });
        }
        Ok(None) => {}
        Err(error) => {
            tracing::warn!(%error, "research cache read failed"); // fetch live anyway
        }
    }

    let request = ResearchRequest::new(research_messages(subject, &decision.queries))
        .max_tokens(cfg.research.max_tokens);

    let response = match tokio::time::timeout(cfg.research_timeout(), client.research(request)).await
    {
        Ok(Ok(response)) => response,
        Ok(Err(error)) => {
            tracing::warn!(%error, "research call failed");
            return None;
        }
        Err(_) => {
            tracing::warn!(
                timeout_ms = cfg.timeouts.research_ms,
                "research call timed out"
            );
            return None;
        }
    };

    if response.answer.trim().is_empty() {
        tracing::warn!("research returned an empty answer");
        return None;
    }

    // Write-behind: the turn never waits on the cache.
    {
        let cache = Arc::clone(&cache);
        let tenant_id = tenant_id.to_string();
        let key = key.clone();
        let entry = ResearchCacheEntry::new(response.answer.clone(), response.citations.clone());
        tokio::spawn(async move {
            if let Err(error) = cache.put(&tenant_id, &key, entry).await {
                tracing::warn!(%error, key, "research cache write failed");
            }
        });
    }

    Some(ResearchContext {
        block: render_block(subject, &response.answer, &response.citations),
        citations: response.citations,
        from_cache: false,
    })
}

fn research_messages(subject: &str, queries: &[String]) -> Vec<ChatMessage> {
    let mut prompt = format!(
        "Research the following about {subject}. Answer each question with current, \
         sourced facts; say when something could not be verified.\n"
    );
    for (i, query) in queries.iter().enumerate() {
        prompt.push_str(&format!("{}. {}\n", i + 1, query));
    }
    vec![
        ChatMessage::system(
            "You are a B2B sales research assistant. Be factual and concise; cite sources.",
        ),
        ChatMessage::user(prompt),
    ]
}

fn render_block(subject: &str, answer: &str, citations: &[Citation]) -> String {
    let mut block = format!("[External Research]\nLive findings about {subject}:\n\n{answer}\n");
    if !citations.is_empty() {
        block.push_str("\nSources:\n");
        for c in citations {
            match (c.title.is_empty(), c.url.is_empty()) {
                (false, false) => block.push_str(&format!("- {} ({})\n", c.title, c.url)),
                (false, true) => block.push_str(&format!("- {}\n", c.title)),
                _ => block.push_str(&format!("- {}\n", c.url)),
            }
        }
    }
    block
}

#[cfg(test)]
mod tests {
    use super::*;
    use huddle_llm::MockResearchClient;
    use huddle_persist::MemoryStore;
    use huddle_types::{DecisionMode, SpecialistId};

    fn route() -> RoutingDecision {
        RoutingDecision {
            agents: vec![SpecialistId::IcpFit],
            mode: DecisionMode::Rules,
            confidence: 0.9,
            reason: "test".to_string(),
        }
    }

    fn decision() -> ResearchDecision {
        ResearchDecision {
            needed: true,
            queries: vec![
                "acme corp company overview".to_string(),
                "acme corp leadership team".to_string(),
                "acme corp recent news".to_string(),
            ],
            reason: "test".to_string(),
        }
    }

    #[test]
    fn cache_key_is_stable_and_normalized() {
        let a = cache_key(&route(), &["Acme News ".to_string()], "Acme Corp");
        let b = cache_key(&route(), &["acme news".to_string()], "acme corp");
        assert_eq!(a, b);
        assert!(a.starts_with("route=icp_fit::q="));
    }

    #[test]
    fn cache_key_varies_with_queries() {
        let a = cache_key(&route(), &["x".to_string()], "s");
        let b = cache_key(&route(), &["y".to_string()], "s");
        assert_ne!(a, b);
    }

    #[test]
    fn cache_key_ignores_queries_past_the_fourth() {
        let base: Vec<String> = (0..4).map(|i| format!("q{i}")).collect();
        let mut extended = base.clone();
        extended.push("q4".to_string());
        assert_eq!(
            cache_key(&route(), &base, "s"),
            cache_key(&route(), &extended, "s")
        );
    }

    #[tokio::test]
    async fn live_fetch_then_cache_hit() {
        let cache = Arc::new(MemoryStore::new());
        let client = MockResearchClient::new("Acme has 4,000 employees.").with_citations(vec![
            Citation {
                title: "Acme About".to_string(),
                url: "https://acme.example/about".to_string(),
            },
        ]);
        let cfg = EngineConfig::default();

        let first = fetch(&client, cache.clone(), &cfg, "t1", &decision(), &route(), "Acme Corp")
            .await
            .expect("live research");
        assert!(!first.from_cache);
        assert!(first.block.contains("4,000 employees"));
        assert!(first.block.contains("https://acme.example/about"));

        // Let the write-behind task land.
        tokio::task::yield_now().await;

        let second = fetch(&client, cache, &cfg, "t1", &decision(), &route(), "Acme Corp")
            .await
            .expect("cached research");
        assert!(second.from_cache);
        assert_eq!(client.call_count(), 1);
    }

    #[tokio::test]
    async fn failed_research_degrades_to_none() {
        let cache = Arc::new(MemoryStore::new());
        let client = MockResearchClient::failing("provider down");
        let cfg = EngineConfig::default();
        let out = fetch(&client, cache, &cfg, "t1", &decision(), &route(), "Acme Corp").await;
        assert!(out.is_none());
    }

    #[tokio::test]
    async fn slow_research_times_out() {
        let cache = Arc::new(MemoryStore::new());
        let client =
            MockResearchClient::new("late").with_delay(std::time::Duration::from_millis(200));
        let mut cfg = EngineConfig::default();
        cfg.timeouts.research_ms = 20;
        let out = fetch(&client, cache, &cfg, "t1", &decision(), &route(), "Acme Corp").await;
        assert!(out.is_none());
    }

    #[tokio::test]
    async fn not_needed_decision_is_a_no_op() {
        let cache = Arc::new(MemoryStore::new());
        let client = MockResearchClient::new("unused");
        let cfg = EngineConfig::default();
        let skip = ResearchDecision::skip("no subject");
        let out = fetch(&client, cache, &cfg, "t1", &skip, &route(), "").await;
        assert!(out.is_none());
        assert_eq!(client.call_count(), 0);
    }
}
