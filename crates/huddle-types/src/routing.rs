use crate::specialist::SpecialistId;
use serde::{Deserialize, Serialize};

/// How much specialist fan-out a turn is allowed: each mode bounds the
/// number of specialists that may run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecisionMode {
    Rules,
    Judgment,
    Council,
    Escalation,
}

impl DecisionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            DecisionMode::Rules => "rules",
            DecisionMode::Judgment => "judgment",
            DecisionMode::Council => "council",
            DecisionMode::Escalation => "escalation",
        }
    }

    pub fn parse(raw: &str) -> Option<DecisionMode> {
        match raw.trim() {
            "rules" => Some(DecisionMode::Rules),
            "judgment" | "judgement" => Some(DecisionMode::Judgment),
            "council" => Some(DecisionMode::Council),
            "escalation" => Some(DecisionMode::Escalation),
            _ => None,
        }
    }
}

/// Ephemeral per-turn routing decision. Computed fresh on every turn and
/// never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct RoutingDecision {
    /// Ordered agents to call, already filtered to the allow-list and
    /// bounded by `mode`.
    pub agents: Vec<SpecialistId>,
    pub mode: DecisionMode,
    /// 0.0 ..= 1.0
    pub confidence: f32,
    pub reason: String,
}

impl RoutingDecision {
    /// Safe default when every routing layer has failed: plain chat under
    /// judgment, near-zero confidence.
    pub fn fallback(reason: impl Into<String>) -> Self {
        Self {
            agents: vec![SpecialistId::Chat],
            mode: DecisionMode::Judgment,
            confidence: 0.0,
            reason: reason.into(),
        }
    }

    /// Agents that will actually run in the pool (excludes `chat`).
    pub fn specialists(&self) -> Vec<SpecialistId> {
        self.agents.iter().copied().filter(|a| a.is_specialist()).collect()
    }
}
