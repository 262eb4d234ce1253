pub mod anthropic;
pub mod json;
pub mod mock;
pub mod perplexity;
pub mod traits;

pub use anthropic::AnthropicClient;
pub use mock::{MockCompletionClient, MockResearchClient};
pub use perplexity::PerplexityClient;
pub use traits::{
    CompletionClient, CompletionRequest, ResearchClient, ResearchRequest, ResearchResponse,
};
