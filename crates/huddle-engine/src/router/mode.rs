//! Decision-mode enforcement. Whatever layer produced the route, the final
//! decision must satisfy the per-mode specialist-count bounds before the
//! pool sees it. Agents are only ever removed here, never invented.

use crate::config::ModeBounds;
use huddle_types::{DecisionMode, RoutingDecision, SpecialistId};

const DOWNGRADE_ORDER: [DecisionMode; 4] = [
    DecisionMode::Escalation,
    DecisionMode::Council,
    DecisionMode::Judgment,
    DecisionMode::Rules,
];

/// Clamp a routing decision into its mode's bounds. Returns the adjusted
/// decision and a note describing any change, for the routing context block.
pub fn enforce(mut decision: RoutingDecision, bounds: &ModeBounds) -> (RoutingDecision, Option<String>) {
    dedupe(&mut decision.agents);

    let count = decision.specialists().len();
    if count == 0 {
        // Nothing to run in the pool: plain chat under judgment.
        let note = (decision.mode != DecisionMode::Judgment
            || decision.agents != vec![SpecialistId::Chat])
            .then(|| "no specialists selected; answering as plain chat".to_string());
        decision.agents = vec![SpecialistId::Chat];
        decision.mode = DecisionMode::Judgment;
        return (decision, note);
    }

    let (min, max) = bounds.for_mode(decision.mode);

    if count > max {
        truncate_specialists(&mut decision.agents, max);
        let note = format!(
            "{} mode allows at most {} specialists; kept the first {}",
            decision.mode.as_str(),
            max,
            max
        );
        return (decision, Some(note));
    }

    if count < min {
        let original = decision.mode;
        for candidate in downgrades_from(decision.mode) {
            let (c_min, c_max) = bounds.for_mode(candidate);
            if count >= c_min && count <= c_max {
                decision.mode = candidate;
                let note = format!(
                    "downgraded {} to {} for {} specialist(s)",
                    original.as_str(),
                    candidate.as_str(),
                    count
                );
                return (decision, Some(note));
            }
        }
        // No mode fits (misconfigured bounds): fall back to judgment.
        decision.mode = DecisionMode::Judgment;
        return (
            decision,
            Some(format!(
                "no mode bounds fit {} specialist(s); forced judgment",
                count
            )),
        );
    }

    (decision, None)
}

fn dedupe(agents: &mut Vec<SpecialistId>) {
    let mut seen = std::collections::HashSet::new();
    agents.retain(|a| seen.insert(*a));
}

/// Drop specialists past `max`, preserving order; non-specialist entries
/// (chat) survive.
fn truncate_specialists(agents: &mut Vec<SpecialistId>, max: usize) {
    let mut kept = 0;
    agents.retain(|a| {
        if !a.is_specialist() {
            return true;
        }
        kept += 1;
        kept <= max
    });
}

fn downgrades_from(mode: DecisionMode) -> impl Iterator<Item = DecisionMode> {
    let start = DOWNGRADE_ORDER
        .iter()
        .position(|m| *m == mode)
        .unwrap_or(0);
    DOWNGRADE_ORDER.into_iter().skip(start + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bounds() -> ModeBounds {
        ModeBounds::default()
    }

    fn decision(agents: Vec<SpecialistId>, mode: DecisionMode) -> RoutingDecision {
        RoutingDecision {
            agents,
            mode,
            confidence: 0.8,
            reason: "test".to_string(),
        }
    }

    #[test]
    fn within_bounds_is_untouched() {
        let d = decision(vec![SpecialistId::IcpFit], DecisionMode::Rules);
        let (out, note) = enforce(d.clone(), &bounds());
        assert_eq!(out, d);
        assert!(note.is_none());
    }

    #[test]
    fn oversized_council_is_truncated_in_order() {
        let d = decision(
            vec![
                SpecialistId::IcpFit,
                SpecialistId::SalesStrategy,
                SpecialistId::StakeholderMap,
                SpecialistId::DraftOutreach,
            ],
            DecisionMode::Council,
        );
        let (out, note) = enforce(d, &bounds());
        assert_eq!(
            out.agents,
            vec![
                SpecialistId::IcpFit,
                SpecialistId::SalesStrategy,
                SpecialistId::StakeholderMap,
            ]
        );
        assert_eq!(out.mode, DecisionMode::Council);
        assert!(note.unwrap().contains("at most 3"));
    }

    #[test]
    fn undersized_council_downgrades_to_rules() {
        // Judgment needs exactly 2, so one specialist lands on rules.
        let d = decision(vec![SpecialistId::IcpFit], DecisionMode::Council);
        let (out, note) = enforce(d, &bounds());
        assert_eq!(out.mode, DecisionMode::Rules);
        assert_eq!(out.agents, vec![SpecialistId::IcpFit]);
        assert!(note.unwrap().contains("downgraded council"));
    }

    #[test]
    fn empty_route_becomes_chat_judgment() {
        let d = decision(vec![], DecisionMode::Escalation);
        let (out, note) = enforce(d, &bounds());
        assert_eq!(out.agents, vec![SpecialistId::Chat]);
        assert_eq!(out.mode, DecisionMode::Judgment);
        assert!(note.is_some());
    }

    #[test]
    fn duplicates_collapse_before_counting() {
        let d = decision(
            vec![SpecialistId::IcpFit, SpecialistId::IcpFit],
            DecisionMode::Rules,
        );
        let (out, note) = enforce(d, &bounds());
        assert_eq!(out.agents, vec![SpecialistId::IcpFit]);
        assert!(note.is_none());
    }

    #[test]
    fn chat_entry_survives_truncation() {
        let d = decision(
            vec![
                SpecialistId::Chat,
                SpecialistId::IcpFit,
                SpecialistId::SalesStrategy,
                SpecialistId::StakeholderMap,
            ],
            DecisionMode::Judgment,
        );
        let (out, _) = enforce(d, &bounds());
        assert!(out.agents.contains(&SpecialistId::Chat));
        assert_eq!(out.specialists().len(), 2);
    }
}
