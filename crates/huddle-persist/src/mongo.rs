//! MongoDB-backed stores. One connected handle implements every store
//! trait; collections are `threads`, `messages`, `accounts`, `kb_items`,
//! `research_cache`, all filtered by `tenant_id`.

use crate::error::{PersistError, Result};
use crate::models::{
    normalize_account_name, score_name_match, Account, AccountCandidate, KnowledgeItem,
    ResearchCacheEntry, StoredMessage, Thread,
};
use crate::stores::{AccountStore, KnowledgeStore, MessageStore, ResearchCache};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use futures::TryStreamExt;
use huddle_types::ChatRole;
use mongodb::bson::doc;
use mongodb::{Client, Collection};
use serde::{Deserialize, Serialize};

#[derive(Clone)]
pub struct MongoStore {
    threads: Collection<Thread>,
    messages: Collection<StoredMessage>,
    accounts: Collection<Account>,
    knowledge: Collection<KbRow>,
    research: Collection<CacheRow>,
}

/// Row shape for `kb_items`, which carries a tenant column the domain model
/// does not.
#[derive(Debug, Serialize, Deserialize)]
struct KbRow {
    tenant_id: String,
    #[serde(flatten)]
    item: KnowledgeItem,
}

#[derive(Debug, Serialize, Deserialize)]
struct CacheRow {
    tenant_id: String,
    cache_key: String,
    #[serde(flatten)]
    entry: ResearchCacheEntry,
}

impl MongoStore {
    pub async fn connect(uri: &str, database: &str) -> Result<Self> {
        let client = Client::with_uri_str(uri)
            .await
            .map_err(|e| PersistError::Internal(format!("Mongo connection failed: {e}")))?;
        let db = client.database(database);

        Ok(Self {
            threads: db.collection("threads"),
            messages: db.collection("messages"),
            accounts: db.collection("accounts"),
            knowledge: db.collection("kb_items"),
            research: db.collection("research_cache"),
        })
    }
}

#[async_trait]
impl MessageStore for MongoStore {
    async fn get_thread(&self, tenant_id: &str, thread_id: &str) -> Result<Option<Thread>> {
        let filter = doc! { "tenant_id": tenant_id, "id": thread_id };
        Ok(self.threads.find_one(filter).await?)
    }

    async fn create_thread(&self, tenant_id: &str, user_id: &str) -> Result<Thread> {
        let thread = Thread::new(tenant_id, user_id);
        self.threads.insert_one(&thread).await?;
        Ok(thread)
    }

    async fn list_messages(&self, tenant_id: &str, thread_id: &str) -> Result<Vec<StoredMessage>> {
        let filter = doc! { "tenant_id": tenant_id, "thread_id": thread_id };
        let messages = self
            .messages
            .find(filter)
            .sort(doc! { "created_at": 1 })
            .await?
            .try_collect()
            .await?;
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
        self.messages.insert_one(&message).await?;
        self.touch_thread(tenant_id, thread_id).await?;
        Ok(message)
    }

    async fn set_resolved_candidates(
        &self,
        tenant_id: &str,
        message_id: &str,
        candidates: &[AccountCandidate],
    ) -> Result<()> {
        let filter = doc! { "tenant_id": tenant_id, "id": message_id };
        let update = doc! {
            "$set": { "resolved_candidates": bson::to_bson(candidates)? }
        };
        let result = self.messages.update_one(filter, update).await?;
        if result.matched_count == 0 {
            return Err(PersistError::MessageNotFound(message_id.to_string()));
        }
        Ok(())
    }

    async fn touch_thread(&self, tenant_id: &str, thread_id: &str) -> Result<()> {
        let filter = doc! { "tenant_id": tenant_id, "id": thread_id };
        let update = doc! { "$set": { "updated_at": bson::to_bson(&Utc::now())? } };
        self.threads.update_one(filter, update).await?;
        Ok(())
    }

    async fn set_title(&self, tenant_id: &str, thread_id: &str, title: &str) -> Result<()> {
        let filter = doc! { "tenant_id": tenant_id, "id": thread_id };
        let update = doc! {
            "$set": { "title": title, "updated_at": bson::to_bson(&Utc::now())? }
        };
        let result = self.threads.update_one(filter, update).await?;
        if result.matched_count == 0 {
            return Err(PersistError::ThreadNotFound(thread_id.to_string()));
        }
        Ok(())
    }

    async fn link_account(
        &self,
        tenant_id: &str,
        thread_id: &str,
        account_id: &str,
    ) -> Result<()> {
        let filter = doc! { "tenant_id": tenant_id, "id": thread_id };
        let update = doc! {
            "$set": { "account_id": account_id, "updated_at": bson::to_bson(&Utc::now())? }
        };
        let result = self.threads.update_one(filter, update).await?;
        if result.matched_count == 0 {
            return Err(PersistError::ThreadNotFound(thread_id.to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl AccountStore for MongoStore {
    async fn search(
        &self,
        tenant_id: &str,
        query: &str,
        limit: usize,
    ) -> Result<Vec<AccountCandidate>> {
        // Prefilter by any query token, then rank in-process with the same
        // scorer every backend uses.
        let tokens: Vec<String> = normalize_account_name(query)
            .split(' ')
            .filter(|t| !t.is_empty())
            .map(regex_escape)
            .collect();
        if tokens.is_empty() {
            return Ok(Vec::new());
        }

        let pattern = tokens.join("|");
        let filter = doc! {
            "tenant_id": tenant_id,
            "name": { "$regex": &pattern, "$options": "i" },
        };

        let rows: Vec<Account> = self
            .accounts
            .find(filter)
            .limit((limit * 4) as i64)
            .await?
            .try_collect()
            .await?;

        let mut candidates: Vec<AccountCandidate> = rows
            .into_iter()
            .map(|a| AccountCandidate {
                score: score_name_match(query, &a.name),
                id: a.id,
                name: a.name,
            })
            .filter(|c| c.score > 0.0)
            .collect();

        candidates.sort_by(|a, b| b.score.total_cmp(&a.score));
        candidates.truncate(limit);
        Ok(candidates)
    }

    async fn get(&self, tenant_id: &str, account_id: &str) -> Result<Option<Account>> {
        let filter = doc! { "tenant_id": tenant_id, "id": account_id };
        Ok(self.accounts.find_one(filter).await?)
    }

    async fn upsert_by_normalized_name(&self, tenant_id: &str, name: &str) -> Result<Account> {
        let normalized = normalize_account_name(name);
        let filter = doc! { "tenant_id": tenant_id, "normalized_name": &normalized };

        if let Some(mut existing) = self.accounts.find_one(filter.clone()).await? {
            existing.updated_at = Utc::now();
            let update = doc! { "$set": { "updated_at": bson::to_bson(&existing.updated_at)? } };
            self.accounts.update_one(filter, update).await?;
            return Ok(existing);
        }

        let account = Account::new(tenant_id, name);
        self.accounts.insert_one(&account).await?;
        Ok(account)
    }
}

#[async_trait]
impl KnowledgeStore for MongoStore {
    async fn search(
        &self,
        tenant_id: &str,
        query: &str,
        limit: usize,
    ) -> Result<Vec<KnowledgeItem>> {
        let q = query.trim();
        if q.is_empty() {
            return Ok(Vec::new());
        }
        let pattern = regex_escape(q);

        let filter = doc! {
            "tenant_id": tenant_id,
            "$or": [
                { "title": { "$regex": &pattern, "$options": "i" } },
                { "content": { "$regex": &pattern, "$options": "i" } },
            ],
        };

        let rows: Vec<KbRow> = self
            .knowledge
            .find(filter)
            .sort(doc! { "updated_at": -1 })
            .limit(limit as i64)
            .await?
            .try_collect()
            .await?;

        Ok(rows.into_iter().map(|r| r.item).collect())
    }
}

#[async_trait]
impl ResearchCache for MongoStore {
    async fn get(
        &self,
        tenant_id: &str,
        key: &str,
        max_age: Duration,
    ) -> Result<Option<ResearchCacheEntry>> {
        let since = Utc::now() - max_age;
        let filter = doc! {
            "tenant_id": tenant_id,
            "cache_key": key,
            "created_at": { "$gte": bson::to_bson(&since)? },
        };

        let row = self
            .research
            .find_one(filter)
            .sort(doc! { "created_at": -1 })
            .await?;
        Ok(row.map(|r| r.entry))
    }

    async fn put(&self, tenant_id: &str, key: &str, entry: ResearchCacheEntry) -> Result<()> {
        let row = CacheRow {
            tenant_id: tenant_id.to_string(),
            cache_key: key.to_string(),
            entry,
        };
        self.research.insert_one(&row).await?;
        Ok(())
    }
}

fn regex_escape(input: impl AsRef<str>) -> String {
    let mut out = String::new();
    for c in input.as_ref().chars() {
        if "\\.+*?()|[]{}^$".contains(c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
