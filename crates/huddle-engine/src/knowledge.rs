//! Internal knowledge-base retrieval. Strictly best-effort: a slow or
//! broken knowledge store costs the turn its grounding block, never the
//! turn itself.

use futures::future::join_all;
use huddle_persist::{KnowledgeItem, KnowledgeStore};
use huddle_types::SpecialistId;
use std::collections::HashSet;
use std::time::Duration;

/// Longest slice of one item carried into context.
const MAX_ITEM_CHARS: usize = 1600;

/// Hits pulled per reference topic.
const REFERENCE_HITS_PER_TOPIC: usize = 2;

#[derive(Debug, Clone)]
pub struct KnowledgeContext {
    /// Ready-to-inject context block.
    pub block: String,
    pub items: usize,
}

impl KnowledgeContext {
    /// More than one relevant item usually means the internal KB can carry
    /// the answer on its own; the research decision uses this to skip the
    /// web for methodology questions.
    pub fn is_rich(&self) -> bool {
        self.items >= 2
    }
}

/// Search the tenant knowledge base and render the hits as a context block.
pub async fn fetch(
    store: &dyn KnowledgeStore,
    tenant_id: &str,
    query: &str,
    limit: usize,
    timeout: Duration,
) -> Option<KnowledgeContext> {
    let hits = match tokio::time::timeout(timeout, store.search(tenant_id, query, limit)).await {
        Ok(Ok(hits)) => hits,
        Ok(Err(error)) => {
            tracing::warn!(%error, "knowledge search failed");
            return None;
        }
        Err(_) => {
            tracing::warn!(timeout_ms = timeout.as_millis() as u64, "knowledge search timed out");
            return None;
        }
    };

    if hits.is_empty() {
        return None;
    }

    let mut block = String::from(
        "[Knowledge Base]\nInternal notes relevant to this conversation. Treat these as the \
         tenant's own guidance:\n",
    );
    for item in &hits {
        push_item(&mut block, item);
    }

    Some(KnowledgeContext {
        block,
        items: hits.len(),
    })
}

/// KB topics each specialist consults before weighing in, on top of the
/// turn-level search.
pub fn reference_topics(agent: SpecialistId) -> &'static [&'static str] {
    match agent {
        SpecialistId::IcpFit => &[
            "ideal customer profile framework",
            "disqualifiers",
            "scored account examples",
        ],
        SpecialistId::SalesStrategy => &[
            "sales playbook",
            "competitive positioning",
            "pursuit plan examples",
        ],
        SpecialistId::StakeholderMap => &[
            "buying committee roles",
            "stakeholder personas",
            "economic buyer and champion",
        ],
        SpecialistId::DraftOutreach => &[
            "outreach templates",
            "messaging guidelines",
            "tone of voice",
        ],
        SpecialistId::Chat => &[],
    }
}

/// Search one specialist's reference topics in parallel under a shared
/// deadline and render the hits as that specialist's reference block.
/// Best-effort like the turn-level search: a failed or slow topic costs
/// only its material.
pub async fn fetch_reference(
    store: &dyn KnowledgeStore,
    tenant_id: &str,
    agent: SpecialistId,
    timeout: Duration,
) -> Option<String> {
    let topics = reference_topics(agent);
    if topics.is_empty() {
        return None;
    }

    let searches = topics
        .iter()
        .map(|topic| store.search(tenant_id, topic, REFERENCE_HITS_PER_TOPIC));
    let settled = match tokio::time::timeout(timeout, join_all(searches)).await {
        Ok(settled) => settled,
        Err(_) => {
            tracing::warn!(agent = agent.as_str(), "reference search timed out");
            return None;
        }
    };

    // Items matching more than one topic appear once.
    let mut seen = HashSet::new();
    let mut items: Vec<KnowledgeItem> = Vec::new();
    for result in settled {
        match result {
            Ok(hits) => {
                for hit in hits {
                    if seen.insert(hit.id.clone()) {
                        items.push(hit);
                    }
                }
            }
            Err(error) => {
                tracing::warn!(%error, agent = agent.as_str(), "reference search failed");
            }
        }
    }
    if items.is_empty() {
        return None;
    }

    let mut block = format!(
        "[{} Reference]\nInternal reference material for this perspective:\n",
        agent.label()
    );
    for item in &items {
        push_item(&mut block, item);
    }
    Some(block)
}

fn push_item(block: &mut String, item: &KnowledgeItem) {
    block.push('\n');
    if let Some(title) = item.title.as_deref().filter(|t| !t.trim().is_empty()) {
        block.push_str("### ");
        block.push_str(title.trim());
        block.push('\n');
    }
    block.push_str(clip(&item.content));
    block.push('\n');
}

fn clip(content: &str) -> &str {
    match content.char_indices().nth(MAX_ITEM_CHARS) {
        Some((idx, _)) => &content[..idx],
        None => content,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use huddle_persist::MemoryStore;

    #[tokio::test]
    async fn renders_hits_into_a_titled_block() {
        let store = MemoryStore::new();
        store
            .seed_knowledge("t1", "ICP framework", "Hospitals with 200+ beds score highest.")
            .await;

        let ctx = fetch(&store, "t1", "icp framework", 6, Duration::from_secs(3))
            .await
            .expect("knowledge hit");
        assert!(ctx.block.starts_with("[Knowledge Base]"));
        assert!(ctx.block.contains("### ICP framework"));
        assert!(ctx.block.contains("200+ beds"));
        assert!(!ctx.is_rich());
    }

    #[tokio::test]
    async fn no_hits_means_no_block() {
        let store = MemoryStore::new();
        let ctx = fetch(&store, "t1", "anything", 6, Duration::from_secs(3)).await;
        assert!(ctx.is_none());
    }

    #[tokio::test]
    async fn long_items_are_clipped() {
        let store = MemoryStore::new();
        store
            .seed_knowledge("t1", "Huge playbook", &"playbook ".repeat(1000))
            .await;

        let ctx = fetch(&store, "t1", "huge playbook", 6, Duration::from_secs(3))
            .await
            .expect("knowledge hit");
        // Block carries header + title + clipped body, not the full 9000 chars.
        assert!(ctx.block.len() < 2000);
    }

    #[tokio::test]
    async fn reference_block_collects_topic_hits() {
        let store = MemoryStore::new();
        store
            .seed_knowledge("t1", "Disqualifiers", "Walk away from clinics under 50 beds.")
            .await;
        store
            .seed_knowledge("t1", "Travel policy", "Book refundable fares only.")
            .await;

        let block = fetch_reference(&store, "t1", SpecialistId::IcpFit, Duration::from_secs(3))
            .await
            .expect("reference material");
        assert!(block.starts_with("[ICP Fit Reference]"));
        assert!(block.contains("under 50 beds"));
        assert!(!block.contains("refundable fares"));
    }

    #[tokio::test]
    async fn chat_pulls_no_reference_material() {
        let store = MemoryStore::new();
        store.seed_knowledge("t1", "Sales playbook", "Lead with ROI.").await;
        let block =
            fetch_reference(&store, "t1", SpecialistId::Chat, Duration::from_secs(3)).await;
        assert!(block.is_none());
    }

    #[tokio::test]
    async fn item_matching_two_topics_appears_once() {
        let store = MemoryStore::new();
        store
            .seed_knowledge(
                "t1",
                "Scoring rubric",
                "Our ideal customer profile framework and disqualifiers in one page.",
            )
            .await;

        let block = fetch_reference(&store, "t1", SpecialistId::IcpFit, Duration::from_secs(3))
            .await
            .expect("reference material");
        assert_eq!(block.matches("### Scoring rubric").count(), 1);
    }

    #[tokio::test]
    async fn two_items_count_as_rich() {
        let store = MemoryStore::new();
        store.seed_knowledge("t1", "Tiering", "tier definitions").await;
        store.seed_knowledge("t1", "Tier scoring", "tier scoring rubric").await;

        let ctx = fetch(&store, "t1", "tier", 6, Duration::from_secs(3))
            .await
            .expect("knowledge hits");
        assert!(ctx.is_rich());
    }
}
