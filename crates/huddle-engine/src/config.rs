use config::{Config as ConfigLoader, ConfigError, Environment, File};
use huddle_types::DecisionMode;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Engine tuning surface. Every threshold here is a configuration default,
/// not business law; defaults match the reference deployment.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub models: ModelConfig,
    pub resolver: ResolverConfig,
    pub router: RouterConfig,
    pub timeouts: TimeoutConfig,
    pub research: ResearchConfig,
    pub specialists: SpecialistConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub completion: String,
    pub research: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Auto-link when the top fuzzy score clears this.
    pub auto_link_score: f32,
    /// ...and leads the runner-up by at least this margin.
    pub auto_link_margin: f32,
    /// Below auto-link but above this: ask the user to disambiguate.
    pub plausible_score: f32,
    /// How many candidates to offer when disambiguating.
    pub disambiguate_limit: usize,
    /// Minimum LLM-extraction confidence to upsert + link.
    pub extract_confidence: f32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    /// Specialist-heavy LLM routes below this confidence downgrade to chat.
    pub confidence_floor: f32,
    /// How many recent messages feed context-window heuristics.
    pub context_window: usize,
    pub mode_bounds: ModeBounds,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    pub knowledge_ms: u64,
    pub research_ms: u64,
    pub specialist_ms: u64,
    pub router_ms: u64,
    pub synthesis_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ResearchConfig {
    pub enabled: bool,
    pub cache_ttl_days: i64,
    pub max_tokens: u32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SpecialistConfig {
    pub concurrency: usize,
    pub max_tokens: u32,
    pub knowledge_limit: usize,
    pub synthesis_max_tokens: u32,
}

/// Inclusive specialist-count bounds per decision mode.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct ModeBounds {
    pub rules: (usize, usize),
    pub judgment: (usize, usize),
    pub council: (usize, usize),
    pub escalation: (usize, usize),
}

impl ModeBounds {
    pub fn for_mode(&self, mode: DecisionMode) -> (usize, usize) {
        match mode {
            DecisionMode::Rules => self.rules,
            DecisionMode::Judgment => self.judgment,
            DecisionMode::Council => self.council,
            DecisionMode::Escalation => self.escalation,
        }
    }
}

impl Default for ModeBounds {
    fn default() -> Self {
        Self {
            rules: (1, 1),
            judgment: (2, 2),
            council: (2, 3),
            escalation: (2, 4),
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            completion: "claude-sonnet-4-5".to_string(),
            research: "sonar".to_string(),
        }
    }
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            auto_link_score: 0.85,
            auto_link_margin: 0.15,
            plausible_score: 0.50,
            disambiguate_limit: 3,
            extract_confidence: 0.75,
        }
    }
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            confidence_floor: 0.70,
            context_window: 10,
            mode_bounds: ModeBounds::default(),
        }
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            knowledge_ms: 3_000,
            research_ms: 20_000,
            specialist_ms: 18_000,
            router_ms: 10_000,
            synthesis_ms: 60_000,
        }
    }
}

impl Default for ResearchConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            cache_ttl_days: 7,
            max_tokens: 2200,
        }
    }
}

impl Default for SpecialistConfig {
    fn default() -> Self {
        Self {
            concurrency: 3,
            max_tokens: 2000,
            knowledge_limit: 6,
            synthesis_max_tokens: 2000,
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            models: ModelConfig::default(),
            resolver: ResolverConfig::default(),
            router: RouterConfig::default(),
            timeouts: TimeoutConfig::default(),
            research: ResearchConfig::default(),
            specialists: SpecialistConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Load configuration, weakest to strongest:
    /// 1. built-in defaults
    /// 2. config/default.toml and config/{ENV}.toml if present
    /// 3. HUDDLE_-prefixed environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let env = std::env::var("ENV").unwrap_or_else(|_| "dev".to_string());

        let builder = ConfigLoader::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            .add_source(
                Environment::default()
                    .prefix("HUDDLE")
                    .separator("__")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }

    /// Load from a specific TOML file (tests).
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let builder = ConfigLoader::builder().add_source(File::from(path.as_ref()));
        builder.build()?.try_deserialize()
    }

    pub fn knowledge_timeout(&self) -> Duration {
        Duration::from_millis(self.timeouts.knowledge_ms)
    }

    pub fn research_timeout(&self) -> Duration {
        Duration::from_millis(self.timeouts.research_ms)
    }

    pub fn specialist_timeout(&self) -> Duration {
        Duration::from_millis(self.timeouts.specialist_ms)
    }

    pub fn router_timeout(&self) -> Duration {
        Duration::from_millis(self.timeouts.router_ms)
    }

    pub fn synthesis_timeout(&self) -> Duration {
        Duration::from_millis(self.timeouts.synthesis_ms)
    }

    pub fn cache_ttl(&self) -> chrono::Duration {
        chrono::Duration::days(self.research.cache_ttl_days)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_deployment() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.specialists.concurrency, 3);
        assert_eq!(cfg.timeouts.specialist_ms, 18_000);
        assert_eq!(cfg.timeouts.knowledge_ms, 3_000);
        assert_eq!(cfg.research.cache_ttl_days, 7);
        assert_eq!(cfg.router.confidence_floor, 0.70);
        assert_eq!(cfg.router.mode_bounds.council, (2, 3));
        assert_eq!(cfg.router.mode_bounds.escalation, (2, 4));
    }

    #[test]
    fn partial_toml_overlays_defaults() {
        let toml = r#"
            [specialists]
            concurrency = 5

            [research]
            enabled = false
        "#;
        let cfg: EngineConfig = toml::from_str(toml).unwrap();
        assert_eq!(cfg.specialists.concurrency, 5);
        assert!(!cfg.research.enabled);
        // Untouched sections keep their defaults.
        assert_eq!(cfg.timeouts.research_ms, 20_000);
        assert_eq!(cfg.resolver.auto_link_score, 0.85);
    }
}
