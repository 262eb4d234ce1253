//! Run one full turn against the in-memory store.
//!
//! With `ANTHROPIC_API_KEY` (and optionally `PERPLEXITY_API_KEY`) set, the
//! turn uses live providers; without them it runs fully offline on scripted
//! doubles, which is enough to watch the pipeline work end to end.
//!
//! ```bash
//! cargo run --example run_turn
//! cargo run --example run_turn -- "Meadville Medical Center"
//! ```

use huddle_engine::{EngineConfig, TurnEngine, TurnRequest};
use huddle_llm::{
    AnthropicClient, CompletionClient, MockCompletionClient, MockResearchClient, PerplexityClient,
    ResearchClient,
};
use huddle_persist::MemoryStore;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let message = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "Is Borealis Robotics a good fit for us?".to_string());

    let config = EngineConfig::load()?;

    let store = Arc::new(MemoryStore::new());
    store
        .seed_knowledge(
            "demo-tenant",
            "ICP framework",
            "We sell to mid-market manufacturers and robotics companies, 200-2000 \
             employees, with in-house operations teams. Tier 1 requires an active \
             automation initiative.",
        )
        .await;
    store
        .seed_account(
            "demo-tenant",
            "Borealis Robotics",
            serde_json::json!({"employees": 450, "segment": "industrial robotics"}),
        )
        .await;

    let completion: Arc<dyn CompletionClient> = match std::env::var("ANTHROPIC_API_KEY") {
        Ok(key) => Arc::new(AnthropicClient::new(key, config.models.completion.as_str())?),
        Err(_) => {
            println!("ANTHROPIC_API_KEY not set, running on scripted doubles\n");
            Arc::new(scripted_completion())
        }
    };
    let research: Arc<dyn ResearchClient> = match std::env::var("PERPLEXITY_API_KEY") {
        Ok(key) => Arc::new(PerplexityClient::new(key, config.models.research.as_str())?),
        Err(_) => Arc::new(MockResearchClient::new(
            "Borealis Robotics builds industrial picking arms; ~450 employees; \
             opened a second plant in Ohio this spring.",
        )),
    };

    let engine = TurnEngine::new(store, completion, research, config);

    println!("user: {message}\n");
    let outcome = engine
        .run_turn(TurnRequest {
            tenant_id: "demo-tenant".to_string(),
            user_id: "demo-user".to_string(),
            thread_id: None,
            message,
        })
        .await?;

    println!(
        "routed to {:?} in {} mode (confidence {:.2})",
        outcome
            .routing
            .agents
            .iter()
            .map(|a| a.as_str())
            .collect::<Vec<_>>(),
        outcome.routing.mode.as_str(),
        outcome.routing.confidence
    );
    println!(
        "research: {} | knowledge items: {}\n",
        if outcome.research.needed { "yes" } else { "no" },
        outcome.knowledge_items
    );
    println!("assistant: {}", outcome.reply.content);

    Ok(())
}

/// Enough scripted replies to cover routing, research decision, one
/// specialist, synthesis, and the auto-title, in any order of need.
fn scripted_completion() -> MockCompletionClient {
    MockCompletionClient::new().reply(
        "Borealis Robotics looks like a Tier 1 fit: right segment, right size, and an \
         active automation build-out. Want me to map their buying committee next?",
    )
}
