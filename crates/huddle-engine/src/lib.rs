//! Turn-processing orchestrator for the Huddle sales copilot.
//!
//! One user message goes in; one grounded, synthesized reply comes out.
//! In between: entity resolution, knowledge retrieval, layered routing,
//! external research with caching, a bounded specialist pool, and context
//! assembly for the final synthesis call.

pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod knowledge;
pub mod pool;
pub mod prompts;
pub mod research;
pub mod resolver;
pub mod router;
pub mod specialists;

pub use config::EngineConfig;
pub use engine::{TurnEngine, TurnOutcome, TurnRequest, TurnStore};
pub use error::{Result, TurnError};
