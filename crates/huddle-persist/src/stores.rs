//! Narrow, function-shaped store interfaces. Every call is tenant-scoped;
//! the orchestrator never sees another tenant's rows.

use crate::error::Result;
use crate::models::{
    Account, AccountCandidate, KnowledgeItem, ResearchCacheEntry, StoredMessage, Thread,
};
use async_trait::async_trait;
use chrono::Duration;
use huddle_types::ChatRole;

#[async_trait]
pub trait MessageStore: Send + Sync {
    async fn get_thread(&self, tenant_id: &str, thread_id: &str) -> Result<Option<Thread>>;

    async fn create_thread(&self, tenant_id: &str, user_id: &str) -> Result<Thread>;

    /// Messages ordered by creation time ascending.
    async fn list_messages(&self, tenant_id: &str, thread_id: &str) -> Result<Vec<StoredMessage>>;

    async fn append_message(
        &self,
        tenant_id: &str,
        thread_id: &str,
        role: ChatRole,
        content: &str,
    ) -> Result<StoredMessage>;

    /// Remember ambiguous resolution matches on a message row so the next
    /// turn can disambiguate.
    async fn set_resolved_candidates(
        &self,
        tenant_id: &str,
        message_id: &str,
        candidates: &[AccountCandidate],
    ) -> Result<()>;

    /// Bump the thread's updated_at.
    async fn touch_thread(&self, tenant_id: &str, thread_id: &str) -> Result<()>;

    async fn set_title(&self, tenant_id: &str, thread_id: &str, title: &str) -> Result<()>;

    async fn link_account(&self, tenant_id: &str, thread_id: &str, account_id: &str)
        -> Result<()>;
}

#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Fuzzy search, ranked by score descending.
    async fn search(
        &self,
        tenant_id: &str,
        query: &str,
        limit: usize,
    ) -> Result<Vec<AccountCandidate>>;

    async fn get(&self, tenant_id: &str, account_id: &str) -> Result<Option<Account>>;

    /// Insert-or-fetch on (tenant_id, normalized_name).
    async fn upsert_by_normalized_name(&self, tenant_id: &str, name: &str) -> Result<Account>;
}

#[async_trait]
pub trait KnowledgeStore: Send + Sync {
    /// Keyword search, bounded result count.
    async fn search(
        &self,
        tenant_id: &str,
        query: &str,
        limit: usize,
    ) -> Result<Vec<KnowledgeItem>>;
}

#[async_trait]
pub trait ResearchCache: Send + Sync {
    /// Freshest entry for the key no older than `max_age`, or None.
    async fn get(
        &self,
        tenant_id: &str,
        key: &str,
        max_age: Duration,
    ) -> Result<Option<ResearchCacheEntry>>;

    async fn put(&self, tenant_id: &str, key: &str, entry: ResearchCacheEntry) -> Result<()>;
}
