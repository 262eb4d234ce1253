use anyhow::Result;
use async_trait::async_trait;
use huddle_types::{ChatMessage, Citation};

/// Trait for the final-answer / routing completion provider.
///
/// The orchestrator only ever needs `complete(prompt) -> text`; provider
/// framing (endpoints, auth, retries) stays behind this seam.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, request: CompletionRequest) -> Result<String>;
}

/// Trait for the external answer-engine used for live fact lookup.
#[async_trait]
pub trait ResearchClient: Send + Sync {
    async fn research(&self, request: ResearchRequest) -> Result<ResearchResponse>;
}

#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub system: String,
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
    /// Instruct the model to emit a bare JSON object (no fences, no prose).
    pub wants_json: bool,
}

impl CompletionRequest {
    pub fn new(system: impl Into<String>, messages: Vec<ChatMessage>) -> Self {
        Self {
            system: system.into(),
            messages,
            max_tokens: 900,
            wants_json: false,
        }
    }

    pub fn max_tokens(mut self, tokens: u32) -> Self {
        self.max_tokens = tokens;
        self
    }

    pub fn json(mut self) -> Self {
        self.wants_json = true;
        self
    }
}

#[derive(Debug, Clone)]
pub struct ResearchRequest {
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
}

impl ResearchRequest {
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            max_tokens: 2200,
        }
    }

    pub fn max_tokens(mut self, tokens: u32) -> Self {
        self.max_tokens = tokens;
        self
    }
}

#[derive(Debug, Clone)]
pub struct ResearchResponse {
    pub answer: String,
    /// Already normalized: every entry has at least a title or a url.
    pub citations: Vec<Citation>,
}
