//! In-memory store used by tests, examples, and offline development.
//! Implements every store trait behind one handle.

use crate::error::{PersistError, Result};
use crate::models::{
    normalize_account_name, score_name_match, Account, AccountCandidate, KnowledgeItem,
    ResearchCacheEntry, StoredMessage, Thread,
};
use crate::stores::{AccountStore, KnowledgeStore, MessageStore, ResearchCache};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use huddle_types::ChatRole;
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Default)]
struct Inner {
    threads: HashMap<String, Thread>,
    messages: HashMap<String, Vec<StoredMessage>>,
    accounts: Vec<Account>,
    knowledge: Vec<(String, KnowledgeItem)>,
    research: HashMap<(String, String), Vec<ResearchCacheEntry>>,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an account row (tests/dev).
    pub async fn seed_account(&self, tenant_id: &str, name: &str, facts: serde_json::Value) -> Account {
        let mut account = Account::new(tenant_id, name);
        account.facts = facts;
        let mut inner = self.inner.write().await;
        inner.accounts.push(account.clone());
        account
    }

    /// Seed a knowledge-base item (tests/dev).
    pub async fn seed_knowledge(&self, tenant_id: &str, title: &str, content: &str) {
        let item = KnowledgeItem {
            id: uuid::Uuid::new_v4().to_string(),
            title: Some(title.to_string()),
            content: content.to_string(),
            updated_at: Utc::now(),
            rank: None,
        };
        let mut inner = self.inner.write().await;
        inner.knowledge.push((tenant_id.to_string(), item));
    }
}

#[async_trait]
impl MessageStore for MemoryStore {
    async fn get_thread(&self, tenant_id: &str, thread_id: &str) -> Result<Option<Thread>> {
        let inner = self.inner.read().await;
        Ok(inner
            .threads
            .get(thread_id)
            .filter(|t| t.tenant_id == tenant_id)
            .cloned())
    }

    async fn create_thread(&self, tenant_id: &str, user_id: &str) -> Result<Thread> {
        let thread = Thread::new(tenant_id, user_id);
        let mut inner = self.inner.write().await;
        inner.threads.insert(thread.id.clone(), thread.clone());
        Ok(thread)
    }

    async fn list_messages(&self, tenant_id: &str, thread_id: &str) -> Result<Vec<StoredMessage>> {
        let inner = self.inner.read().await;
        let mut messages: Vec<StoredMessage> = inner
            .messages
            .get(thread_id)
            .map(|m| {
                m.iter()
                    .filter(|msg| msg.tenant_id == tenant_id)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        messages.sort_by_key(|m| m.created_at);
        Ok(messages)
    }

    async fn append_message(
        &self,
        tenant_id: &str,
        thread_id: &str,
        role: ChatRole,
        content: &str,
    ) -> Result<StoredMessage> {
        let message = StoredMessage::new(tenant_id, thread_id, role, content);
        let mut inner = self.inner.write().await;
        if let Some(thread) = inner.threads.get_mut(thread_id) {
            thread.updated_at = Utc::now();
        }
        inner
            .messages
            .entry(thread_id.to_string())
            .or_default()
            .push(message.clone());
        Ok(message)
    }

    async fn set_resolved_candidates(
        &self,
        tenant_id: &str,
        message_id: &str,
        candidates: &[AccountCandidate],
    ) -> Result<()> {
        let mut inner = self.inner.write().await;
        for messages in inner.messages.values_mut() {
            if let Some(msg) = messages
                .iter_mut()
                .find(|m| m.id == message_id && m.tenant_id == tenant_id)
            {
                msg.resolved_candidates = Some(candidates.to_vec());
                return Ok(());
            }
        }
        Err(PersistError::MessageNotFound(message_id.to_string()))
    }

    async fn touch_thread(&self, tenant_id: &str, thread_id: &str) -> Result<()> {
        let mut inner = self.inner.write().await;
        match inner
            .threads
            .get_mut(thread_id)
            .filter(|t| t.tenant_id == tenant_id)
        {
            Some(thread) => {
                thread.updated_at = Utc::now();
                Ok(())
            }
            None => Err(PersistError::ThreadNotFound(thread_id.to_string())),
        }
    }

    async fn set_title(&self, tenant_id: &str, thread_id: &str, title: &str) -> Result<()> {
        let mut inner = self.inner.write().await;
        match inner
            .threads
            .get_mut(thread_id)
            .filter(|t| t.tenant_id == tenant_id)
        {
            Some(thread) => {
                thread.title = Some(title.to_string());
                thread.updated_at = Utc::now();
                Ok(())
            }
            None => Err(PersistError::ThreadNotFound(thread_id.to_string())),
        }
    }

    async fn link_account(
        &self,
        tenant_id: &str,
        thread_id: &str,
        account_id: &str,
    ) -> Result<()> {
        let mut inner = self.inner.write().await;
        match inner
            .threads
            .get_mut(thread_id)
            .filter(|t| t.tenant_id == tenant_id)
        {
            Some(thread) => {
                thread.account_id = Some(account_id.to_string());
                thread.updated_at = Utc::now();
                Ok(())
            }
            None => Err(PersistError::ThreadNotFound(thread_id.to_string())),
        }
    }
}

#[async_trait]
impl AccountStore for MemoryStore {
    async fn search(
        &self,
        tenant_id: &str,
        query: &str,
        limit: usize,
    ) -> Result<Vec<AccountCandidate>> {
        let inner = self.inner.read().await;
        let mut candidates: Vec<AccountCandidate> = inner
            .accounts
            .iter()
            .filter(|a| a.tenant_id == tenant_id)
            .map(|a| AccountCandidate {
                id: a.id.clone(),
                name: a.name.clone(),
                score: score_name_match(query, &a.name),
            })
            .filter(|c| c.score > 0.0)
            .collect();

        candidates.sort_by(|a, b| b.score.total_cmp(&a.score));
        candidates.truncate(limit);
        Ok(candidates)
    }

    async fn get(&self, tenant_id: &str, account_id: &str) -> Result<Option<Account>> {
        let inner = self.inner.read().await;
        Ok(inner
            .accounts
            .iter()
            .find(|a| a.tenant_id == tenant_id && a.id == account_id)
            .cloned())
    }

    async fn upsert_by_normalized_name(&self, tenant_id: &str, name: &str) -> Result<Account> {
        let normalized = normalize_account_name(name);
        let mut inner = self.inner.write().await;

        if let Some(existing) = inner
            .accounts
            .iter_mut()
            .find(|a| a.tenant_id == tenant_id && a.normalized_name == normalized)
        {
            existing.updated_at = Utc::now();
            return Ok(existing.clone());
        }

        let account = Account::new(tenant_id, name);
        inner.accounts.push(account.clone());
        Ok(account)
    }
}

#[async_trait]
impl KnowledgeStore for MemoryStore {
    async fn search(
        &self,
        tenant_id: &str,
        query: &str,
        limit: usize,
    ) -> Result<Vec<KnowledgeItem>> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return Ok(Vec::new());
        }

        let inner = self.inner.read().await;
        let mut hits: Vec<KnowledgeItem> = inner
            .knowledge
            .iter()
            .filter(|(t, _)| t == tenant_id)
            .filter(|(_, item)| {
                let title_hit = item
                    .title
                    .as_deref()
                    .map(|t| t.to_lowercase().contains(&needle))
                    .unwrap_or(false);
                // Any query token in the body counts: bare org names rarely
                // appear verbatim in playbook-style KB items.
                let body = item.content.to_lowercase();
                let body_hit = needle.split(' ').any(|tok| !tok.is_empty() && body.contains(tok));
                title_hit || body_hit
            })
            .map(|(_, item)| item.clone())
            .collect();

        hits.sort_by_key(|item| std::cmp::Reverse(item.updated_at));
        hits.truncate(limit);
        Ok(hits)
    }
}

#[async_trait]
impl ResearchCache for MemoryStore {
    async fn get(
        &self,
        tenant_id: &str,
        key: &str,
        max_age: Duration,
    ) -> Result<Option<ResearchCacheEntry>> {
        let since = Utc::now() - max_age;
        let inner = self.inner.read().await;
        Ok(inner
            .research
            .get(&(tenant_id.to_string(), key.to_string()))
            .and_then(|entries| {
                entries
                    .iter()
                    .filter(|e| e.created_at >= since)
                    .max_by_key(|e| e.created_at)
                    .cloned()
            }))
    }

    async fn put(&self, tenant_id: &str, key: &str, entry: ResearchCacheEntry) -> Result<()> {
        let mut inner = self.inner.write().await;
        inner
            .research
            .entry((tenant_id.to_string(), key.to_string()))
            .or_default()
            .push(entry);
        Ok(())
    }
}
