pub mod error;
pub mod memory;
pub mod models;
pub mod stores;

#[cfg(feature = "mongodb")]
pub mod mongo;

pub use error::{PersistError, Result};
pub use memory::MemoryStore;
pub use models::{
    normalize_account_name, score_name_match, Account, AccountCandidate, KnowledgeItem,
    ResearchCacheEntry, StoredMessage, Thread,
};
pub use stores::{AccountStore, KnowledgeStore, MessageStore, ResearchCache};

#[cfg(feature = "mongodb")]
pub use mongo::MongoStore;
