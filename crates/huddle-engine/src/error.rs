use huddle_persist::PersistError;
use thiserror::Error;

/// The only failure class a caller ever sees. Everything else in the
/// pipeline (knowledge, research, resolution, individual specialists,
/// auto-title) degrades in place and is logged instead of raised.
#[derive(Error, Debug)]
pub enum TurnError {
    #[error("thread not found: {0}")]
    ThreadNotFound(String),

    #[error("empty user message")]
    EmptyUserMessage,

    #[error("synthesis failed: {0}")]
    Synthesis(String),

    #[error("synthesis returned an empty reply")]
    EmptyReply,

    #[error(transparent)]
    Store(#[from] PersistError),
}

pub type Result<T> = std::result::Result<T, TurnError>;
