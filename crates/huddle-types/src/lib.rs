pub mod message;
pub mod research;
pub mod routing;
pub mod specialist;

pub use message::{last_user_text, ChatMessage, ChatRole};
pub use research::{Citation, ResearchDecision};
pub use routing::{DecisionMode, RoutingDecision};
pub use specialist::{SpecialistId, SpecialistOutput, SpecialistResult, Telemetry};
