//! The turn pipeline. One entry point, `TurnEngine::run_turn`, drives a
//! user message through resolution, grounding, routing, research, the
//! specialist pool, and synthesis, then persists the reply.

use crate::config::EngineConfig;
use crate::context::{self, ContextBlocks};
use crate::error::{Result, TurnError};
use crate::pool::{self, SpecialistTask};
use crate::prompts;
use crate::resolver::{self, Resolution};
use crate::router::{self, research as research_router, rules};
use crate::{knowledge, research, specialists};
use huddle_llm::{CompletionClient, CompletionRequest, ResearchClient};
use huddle_persist::{
    AccountStore, KnowledgeStore, MessageStore, ResearchCache, StoredMessage, Thread,
};
use huddle_types::{ChatMessage, ChatRole, ResearchDecision, RoutingDecision};
use std::sync::Arc;

/// Everything the engine needs from persistence, behind one handle.
pub trait TurnStore: MessageStore + AccountStore + KnowledgeStore + ResearchCache {}
impl<T: MessageStore + AccountStore + KnowledgeStore + ResearchCache> TurnStore for T {}

#[derive(Debug, Clone)]
pub struct TurnRequest {
    pub tenant_id: String,
    pub user_id: String,
    /// Existing thread to continue, or `None` to start one.
    pub thread_id: Option<String>,
    pub message: String,
}

#[derive(Debug)]
pub struct TurnOutcome {
    pub thread_id: String,
    pub reply: StoredMessage,
    pub routing: RoutingDecision,
    pub research: ResearchDecision,
    pub research_from_cache: bool,
    pub knowledge_items: usize,
    pub specialist_results: Vec<huddle_types::SpecialistResult>,
}

pub struct TurnEngine {
    config: EngineConfig,
    messages: Arc<dyn MessageStore>,
    accounts: Arc<dyn AccountStore>,
    knowledge: Arc<dyn KnowledgeStore>,
    cache: Arc<dyn ResearchCache>,
    completion: Arc<dyn CompletionClient>,
    research: Arc<dyn ResearchClient>,
}

impl TurnEngine {
    pub fn new<S>(
        store: Arc<S>,
        completion: Arc<dyn CompletionClient>,
        research: Arc<dyn ResearchClient>,
        config: EngineConfig,
    ) -> Self
    where
        S: TurnStore + 'static,
    {
        Self {
            config,
            messages: store.clone(),
            accounts: store.clone(),
            knowledge: store.clone(),
            cache: store,
            completion,
            research,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Process one user turn end to end and persist the reply.
    pub async fn run_turn(&self, request: TurnRequest) -> Result<TurnOutcome> {
        let text = request.message.trim().to_string();
        if text.is_empty() {
            return Err(TurnError::EmptyUserMessage);
        }
        let tenant = request.tenant_id.as_str();

        let mut thread = self.load_or_create_thread(&request).await?;
        let prior = self.messages.list_messages(tenant, &thread.id).await?;
        let first_turn = !prior.iter().any(|m| m.role == ChatRole::User);

        let user_message = self
            .messages
            .append_message(tenant, &thread.id, ChatRole::User, &text)
            .await?;

        // Entity resolution only runs while the thread is unlinked, and only
        // on its opening user message; a linked thread is never relinked
        // behind the user's back.
        if thread.account_id.is_none() && first_turn {
            match resolver::resolve_account(
                self.accounts.as_ref(),
                self.messages.as_ref(),
                self.completion.as_ref(),
                &self.config.resolver,
                tenant,
                &thread.id,
                &user_message,
            )
            .await
            {
                Resolution::Linked { account_id, name } => {
                    tracing::info!(thread = %thread.id, account = %name, "thread linked to account");
                    thread.account_id = Some(account_id);
                }
                Resolution::Ambiguous(candidates) => {
                    tracing::info!(
                        thread = %thread.id,
                        candidates = candidates.len(),
                        "account resolution ambiguous"
                    );
                }
                Resolution::Unresolved => {}
            }
        }

        let history: Vec<ChatMessage> = prior
            .iter()
            .map(|m| ChatMessage {
                role: m.role,
                content: m.content.clone(),
            })
            .chain(std::iter::once(ChatMessage::user(text.clone())))
            .collect();

        let account = match &thread.account_id {
            Some(id) => self.accounts.get(tenant, id).await.unwrap_or_else(|error| {
                tracing::warn!(%error, "account lookup failed");
                None
            }),
            None => None,
        };
        let subject: Option<String> = account
            .as_ref()
            .map(|a| a.name.clone())
            .or_else(|| rules::looks_like_account_name(&text).then(|| text.clone()));

        // Knowledge retrieval runs before routing so the research decision
        // knows whether internal notes already cover the turn.
        let knowledge_ctx = knowledge::fetch(
            self.knowledge.as_ref(),
            tenant,
            &text,
            self.config.specialists.knowledge_limit,
            self.config.knowledge_timeout(),
        )
        .await;
        let knowledge_rich = knowledge_ctx.as_ref().is_some_and(|k| k.is_rich());
        let knowledge_items = knowledge_ctx.as_ref().map(|k| k.items).unwrap_or(0);

        let routing = router::route_turn(
            self.completion.as_ref(),
            &text,
            &history[..history.len() - 1],
            &self.config.router,
            self.config.router_timeout(),
        )
        .await;
        tracing::info!(
            agents = ?routing.agents.iter().map(|a| a.as_str()).collect::<Vec<_>>(),
            mode = routing.mode.as_str(),
            confidence = routing.confidence,
            "turn routed"
        );

        let research_decision = research_router::decide(
            self.completion.as_ref(),
            &text,
            subject.as_deref(),
            &routing,
            knowledge_rich,
            &self.config.research,
        )
        .await;

        let research_ctx = research::fetch(
            self.research.as_ref(),
            Arc::clone(&self.cache),
            &self.config,
            tenant,
            &research_decision,
            &routing,
            subject.as_deref().unwrap_or(&text),
        )
        .await;
        let research_from_cache = research_ctx.as_ref().is_some_and(|r| r.from_cache);

        let blocks = ContextBlocks {
            account_memory: account.as_ref().map(context::account_memory_block),
            knowledge: knowledge_ctx.map(|k| k.block),
            research: research_ctx.map(|r| r.block),
        };

        // Each specialist also pulls its own reference topics from the KB,
        // on top of the shared turn-level block.
        let mut tasks: Vec<SpecialistTask> = Vec::new();
        for agent in routing.specialists() {
            let reference = knowledge::fetch_reference(
                self.knowledge.as_ref(),
                tenant,
                agent,
                self.config.knowledge_timeout(),
            )
            .await;
            tasks.push(SpecialistTask {
                agent,
                messages: context::specialist_messages(
                    &history,
                    &blocks,
                    agent,
                    reference.as_deref(),
                ),
                max_tokens: self.config.specialists.max_tokens,
            });
        }
        let specialist_results = pool::run_all(
            Arc::clone(&self.completion),
            tasks,
            self.config.specialists.concurrency,
            self.config.specialist_timeout(),
        )
        .await;

        let council = specialists::council_findings(&specialist_results);
        let synthesis_input = context::synthesis_messages(
            &history,
            &blocks,
            &routing,
            &specialist_results,
            council.as_deref(),
        );

        let reply_text = self.synthesize(synthesis_input).await?;
        let reply = self
            .messages
            .append_message(tenant, &thread.id, ChatRole::Assistant, &reply_text)
            .await?;

        if first_turn && thread.title.is_none() {
            self.spawn_auto_title(tenant, &thread.id, &text);
        }

        Ok(TurnOutcome {
            thread_id: thread.id,
            reply,
            routing,
            research: research_decision,
            research_from_cache,
            knowledge_items,
            specialist_results,
        })
    }

    async fn load_or_create_thread(&self, request: &TurnRequest) -> Result<Thread> {
        match &request.thread_id {
            Some(id) => self
                .messages
                .get_thread(&request.tenant_id, id)
                .await?
                .ok_or_else(|| TurnError::ThreadNotFound(id.clone())),
            None => Ok(self
                .messages
                .create_thread(&request.tenant_id, &request.user_id)
                .await?),
        }
    }

    async fn synthesize(&self, messages: Vec<ChatMessage>) -> Result<String> {
        let request = CompletionRequest::new(prompts::persona(), messages)
            .max_tokens(self.config.specialists.synthesis_max_tokens);

        let reply = match tokio::time::timeout(
            self.config.synthesis_timeout(),
            self.completion.complete(request),
        )
        .await
        {
            Ok(Ok(reply)) => reply,
            Ok(Err(error)) => return Err(TurnError::Synthesis(error.to_string())),
            Err(_) => {
                return Err(TurnError::Synthesis(format!(
                    "timed out after {}ms",
                    self.config.timeouts.synthesis_ms
                )))
            }
        };

        let reply = reply.trim().to_string();
        if reply.is_empty() {
            return Err(TurnError::EmptyReply);
        }
        Ok(reply)
    }

    /// Title the thread off its opening message, in the background. Failure
    /// costs nothing but the title.
    fn spawn_auto_title(&self, tenant_id: &str, thread_id: &str, opening: &str) {
        let completion = Arc::clone(&self.completion);
        let messages = Arc::clone(&self.messages);
        let tenant_id = tenant_id.to_string();
        let thread_id = thread_id.to_string();
        let opening = opening.to_string();

        tokio::spawn(async move {
            let request = CompletionRequest::new(
                prompts::TITLE_SYSTEM,
                vec![ChatMessage::user(opening)],
            )
            .max_tokens(60);

            let title = match completion.complete(request).await {
                Ok(raw) => sanitize_title(&raw),
                Err(error) => {
                    tracing::warn!(%error, thread = %thread_id, "auto-title call failed");
                    return;
                }
            };
            let Some(title) = title else {
                tracing::warn!(thread = %thread_id, "auto-title produced nothing usable");
                return;
            };

            if let Err(error) = messages.set_title(&tenant_id, &thread_id, &title).await {
                tracing::warn!(%error, thread = %thread_id, "failed to store thread title");
            }
        });
    }
}

/// First line of the model's answer, stripped of quotes and clamped.
fn sanitize_title(raw: &str) -> Option<String> {
    let line = raw.lines().find(|l| !l.trim().is_empty())?;
    let cleaned: String = line
        .trim()
        .trim_matches(|c| c == '"' || c == '\'' || c == '`')
        .trim_end_matches('.')
        .chars()
        .take(80)
        .collect();
    let cleaned = cleaned.trim().to_string();
    (!cleaned.is_empty()).then_some(cleaned)
}
