//! Scripted provider doubles for tests and offline runs.

use crate::traits::{
    CompletionClient, CompletionRequest, ResearchClient, ResearchRequest, ResearchResponse,
};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use huddle_types::Citation;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

enum Scripted {
    Reply(String),
    Failure(String),
}

/// Completion double that pops scripted replies in order. When the script
/// runs dry it keeps returning the last entry, so a single canned reply can
/// serve any number of calls.
pub struct MockCompletionClient {
    script: Mutex<VecDeque<Scripted>>,
    last: Mutex<Option<String>>,
    requests: Mutex<Vec<CompletionRequest>>,
    delay: Option<Duration>,
}

impl MockCompletionClient {
    pub fn new() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            last: Mutex::new(None),
            requests: Mutex::new(Vec::new()),
            delay: None,
        }
    }

    pub fn reply(self, text: impl Into<String>) -> Self {
        self.script
            .lock()
            .unwrap()
            .push_back(Scripted::Reply(text.into()));
        self
    }

    pub fn failure(self, error: impl Into<String>) -> Self {
        self.script
            .lock()
            .unwrap()
            .push_back(Scripted::Failure(error.into()));
        self
    }

    /// Sleep before answering; used to exercise per-call timeouts.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Requests seen so far, for prompt-content assertions.
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl Default for MockCompletionClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CompletionClient for MockCompletionClient {
    async fn complete(&self, request: CompletionRequest) -> Result<String> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        self.requests.lock().unwrap().push(request);

        let next = self.script.lock().unwrap().pop_front();
        match next {
            Some(Scripted::Reply(text)) => {
                *self.last.lock().unwrap() = Some(text.clone());
                Ok(text)
            }
            Some(Scripted::Failure(error)) => Err(anyhow!(error)),
            None => match self.last.lock().unwrap().clone() {
                Some(text) => Ok(text),
                None => Err(anyhow!("mock completion script is empty")),
            },
        }
    }
}

/// Research double with a fixed answer and citation list.
pub struct MockResearchClient {
    answer: String,
    citations: Vec<Citation>,
    fail_with: Option<String>,
    delay: Option<Duration>,
    requests: Mutex<Vec<ResearchRequest>>,
}

impl MockResearchClient {
    pub fn new(answer: impl Into<String>) -> Self {
        Self {
            answer: answer.into(),
            citations: Vec::new(),
            fail_with: None,
            delay: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn with_citations(mut self, citations: Vec<Citation>) -> Self {
        self.citations = citations;
        self
    }

    pub fn failing(error: impl Into<String>) -> Self {
        Self {
            answer: String::new(),
            citations: Vec::new(),
            fail_with: Some(error.into()),
            delay: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl ResearchClient for MockResearchClient {
    async fn research(&self, request: ResearchRequest) -> Result<ResearchResponse> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        self.requests.lock().unwrap().push(request);

        if let Some(error) = &self.fail_with {
            return Err(anyhow!(error.clone()));
        }

        Ok(ResearchResponse {
            answer: self.answer.clone(),
            citations: self.citations.clone(),
        })
    }
}
