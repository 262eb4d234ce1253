mod account;
mod knowledge;
mod message;
mod research;
mod thread;

pub use account::{normalize_account_name, score_name_match, Account, AccountCandidate};
pub use knowledge::KnowledgeItem;
pub use message::StoredMessage;
pub use research::ResearchCacheEntry;
pub use thread::Thread;
