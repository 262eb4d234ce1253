use serde::{Deserialize, Serialize};

/// Identifiers for the narrowly-scoped agents the router may select.
///
/// `Chat` is the generic fallback route; it is a valid routing target but is
/// never executed as a specialist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpecialistId {
    IcpFit,
    SalesStrategy,
    StakeholderMap,
    DraftOutreach,
    Chat,
}

impl SpecialistId {
    pub const ALL: [SpecialistId; 5] = [
        SpecialistId::IcpFit,
        SpecialistId::SalesStrategy,
        SpecialistId::StakeholderMap,
        SpecialistId::DraftOutreach,
        SpecialistId::Chat,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SpecialistId::IcpFit => "icp_fit",
            SpecialistId::SalesStrategy => "sales_strategy",
            SpecialistId::StakeholderMap => "stakeholder_map",
            SpecialistId::DraftOutreach => "draft_outreach",
            SpecialistId::Chat => "chat",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SpecialistId::IcpFit => "ICP Fit",
            SpecialistId::SalesStrategy => "Sales Strategy",
            SpecialistId::StakeholderMap => "Stakeholder Map",
            SpecialistId::DraftOutreach => "Draft Outreach",
            SpecialistId::Chat => "Chat",
        }
    }

    /// Parse a loosely-formatted id from router LLM output. Accepts both
    /// snake_case and the camelCase spellings models tend to emit.
    pub fn parse(raw: &str) -> Option<SpecialistId> {
        match raw.trim() {
            "icp_fit" | "icpFit" | "icpfit" => Some(SpecialistId::IcpFit),
            "sales_strategy" | "salesStrategy" => Some(SpecialistId::SalesStrategy),
            "stakeholder_map" | "stakeholderMap" | "stakeholder_mapping" | "stakeholderMapping" => {
                Some(SpecialistId::StakeholderMap)
            }
            "draft_outreach" | "draftOutreach" => Some(SpecialistId::DraftOutreach),
            "chat" => Some(SpecialistId::Chat),
            _ => None,
        }
    }

    /// True for agents that actually run in the specialist pool.
    pub fn is_specialist(&self) -> bool {
        !matches!(self, SpecialistId::Chat)
    }
}

/// Structured side-channel output from one specialist, aggregated across the
/// turn into council findings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Telemetry {
    #[serde(default)]
    pub alerts: Vec<String>,
    #[serde(default)]
    pub recommendations: Vec<String>,
    #[serde(default)]
    pub assumptions: Vec<String>,
    #[serde(default)]
    pub questions: Vec<String>,
}

impl Telemetry {
    pub fn is_empty(&self) -> bool {
        self.alerts.is_empty()
            && self.recommendations.is_empty()
            && self.assumptions.is_empty()
            && self.questions.is_empty()
    }

    /// Single synthetic alert, used when a specialist fails so the failure
    /// stays visible downstream.
    pub fn alert(text: impl Into<String>) -> Self {
        Self {
            alerts: vec![text.into()],
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpecialistOutput {
    /// Free-text perspective, telemetry block already stripped.
    pub content: String,
    pub telemetry: Option<Telemetry>,
}

/// Settled result for one specialist task. One rejection never aborts the
/// others; the pool returns exactly one of these per requested agent.
#[derive(Debug, Clone)]
pub struct SpecialistResult {
    pub agent: SpecialistId,
    pub outcome: Result<SpecialistOutput, String>,
}

impl SpecialistResult {
    pub fn label(&self) -> &'static str {
        self.agent.label()
    }
}
