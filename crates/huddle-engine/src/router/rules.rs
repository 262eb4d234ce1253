//! Deterministic routing layers. These run before any model call and decide
//! the easy turns for free: conversational continuity, bare account names,
//! and unambiguous keyword intent.

use crate::config::RouterConfig;
use huddle_types::{ChatMessage, ChatRole, DecisionMode, RoutingDecision, SpecialistId};

/// First-match-wins pass over the deterministic layers. `None` means no
/// layer was confident and the LLM fallback should decide.
pub fn route(text: &str, history: &[ChatMessage], cfg: &RouterConfig) -> Option<RoutingDecision> {
    if let Some(decision) = continuity(text, history, cfg) {
        return Some(decision);
    }
    if looks_like_account_name(text) {
        // A bare name is an implicit "evaluate this account": fit scoring
        // plus a first pursuit read.
        return Some(RoutingDecision {
            agents: vec![SpecialistId::IcpFit, SpecialistId::SalesStrategy],
            mode: DecisionMode::Judgment,
            confidence: 0.9,
            reason: "bare account name, treated as an evaluation request".to_string(),
        });
    }
    keyword_intent(text)
}

/// Continuity layer: a short follow-up inside an active evaluation exchange
/// stays with the evaluation specialist instead of re-deciding from scratch.
fn continuity(
    text: &str,
    history: &[ChatMessage],
    cfg: &RouterConfig,
) -> Option<RoutingDecision> {
    if !looks_like_follow_up(text) {
        return None;
    }
    if !in_evaluation_context(history, cfg.context_window) {
        return None;
    }
    if !follow_up_is_evaluation_relevant(text) {
        return None;
    }
    Some(RoutingDecision {
        agents: vec![SpecialistId::IcpFit],
        mode: DecisionMode::Judgment,
        confidence: 0.85,
        reason: "follow-up within an active fit evaluation".to_string(),
    })
}

/// Recent messages (either side) mention qualification vocabulary.
pub fn in_evaluation_context(history: &[ChatMessage], window: usize) -> bool {
    const EVAL_TERMS: [&str; 7] = [
        "icp",
        "fit",
        "qualify",
        "qualification",
        "tier 1",
        "tier 2",
        "tier 3",
    ];
    history
        .iter()
        .rev()
        .take(window)
        .filter(|m| matches!(m.role, ChatRole::User | ChatRole::Assistant))
        .any(|m| {
            let lower = m.content.to_lowercase();
            EVAL_TERMS.iter().any(|t| {
                if t.contains(' ') {
                    lower.contains(t)
                } else {
                    contains_word(&lower, t)
                }
            })
        })
}

/// Short message opening with a connective or pronoun: probably continuing
/// the previous exchange rather than starting a new request.
pub fn looks_like_follow_up(text: &str) -> bool {
    let lower = text.trim().to_lowercase();
    if lower.is_empty() || lower.split_whitespace().count() > 12 {
        return false;
    }
    const OPENERS: [&str; 12] = [
        "what about", "how about", "and ", "also ", "but ", "why", "they ", "their ", "it ",
        "ok ", "same for", "now ",
    ];
    OPENERS.iter().any(|o| lower.starts_with(o))
}

/// The follow-up still talks about the account being evaluated, not a new
/// topic. Guards against "what about pricing?" hijacking the fit route.
pub fn follow_up_is_evaluation_relevant(text: &str) -> bool {
    let lower = text.to_lowercase();
    const OFF_TOPIC: [&str; 5] = ["pricing", "price", "discount", "contract", "invoice"];
    !OFF_TOPIC.iter().any(|t| contains_word(&lower, t))
}

/// A message that is just an organization name: few words, no question
/// punctuation, capitalized or carrying a corporate suffix.
pub fn looks_like_account_name(text: &str) -> bool {
    let trimmed = text.trim().trim_end_matches('.');
    if trimmed.is_empty() || trimmed.contains('?') || trimmed.contains('\n') {
        return false;
    }
    if !trimmed.chars().next().is_some_and(|c| c.is_alphabetic()) {
        return false;
    }
    let words: Vec<&str> = trimmed.split_whitespace().collect();
    if words.is_empty() || words.len() > 12 {
        return false;
    }

    let lower = trimmed.to_lowercase();
    if lower.contains("http") || lower.contains("www.") {
        return false;
    }
    const NOT_NAMES: [&str; 10] = [
        "hi", "hello", "hey", "thanks", "thank you", "yes", "no", "ok", "okay", "sure",
    ];
    if NOT_NAMES.contains(&lower.as_str()) {
        return false;
    }
    // Sentences read as requests, not names.
    const VERBS: [&str; 8] = ["help", "write", "draft", "tell", "show", "give", "find", "explain"];
    if VERBS.iter().any(|v| contains_word(&lower, v)) {
        return false;
    }

    const ORG_SUFFIXES: [&str; 12] = [
        "inc", "llc", "ltd", "corp", "co", "gmbh", "hospital", "health", "clinic", "group",
        "labs", "systems",
    ];
    let has_suffix = ORG_SUFFIXES
        .iter()
        .any(|s| contains_word(&lower, s));
    let capitalized = words
        .iter()
        .filter(|w| w.chars().next().is_some_and(|c| c.is_uppercase()))
        .count();

    has_suffix || capitalized * 2 >= words.len()
}

/// Unambiguous keyword intent. Negative contexts keep product-pricing talk
/// ("subscription tier") out of the qualification route.
pub fn keyword_intent(text: &str) -> Option<RoutingDecision> {
    let lower = text.to_lowercase();

    // Definitional questions about the vocabulary are chat material, not a
    // request to run the evaluation they name.
    const DEFINITIONAL: [&str; 5] = ["what is", "what's", "what does", "define", "explain"];
    if DEFINITIONAL.iter().any(|p| lower.starts_with(p)) {
        return None;
    }

    let pricing_context = ["pricing tier", "price tier", "tier pricing", "subscription tier"]
        .iter()
        .any(|p| lower.contains(p));

    let icp = !pricing_context
        && (contains_word(&lower, "icp")
            || lower.contains("good fit")
            || contains_word(&lower, "qualify")
            || contains_word(&lower, "qualification")
            || (contains_word(&lower, "tier") && !pricing_context)
            || lower.contains("fit score"));
    if icp {
        return Some(decision(
            SpecialistId::IcpFit,
            0.92,
            "qualification keywords",
        ));
    }

    if contains_word(&lower, "stakeholder")
        || lower.contains("buying committee")
        || lower.contains("decision maker")
        || lower.contains("org chart")
        || lower.contains("who should i talk")
    {
        return Some(decision(
            SpecialistId::StakeholderMap,
            0.92,
            "stakeholder keywords",
        ));
    }

    if contains_word(&lower, "outreach")
        || lower.contains("draft an email")
        || lower.contains("draft a message")
        || lower.contains("write an email")
        || lower.contains("cold email")
        || lower.contains("linkedin message")
        || lower.contains("follow-up email")
    {
        return Some(decision(
            SpecialistId::DraftOutreach,
            0.92,
            "outreach keywords",
        ));
    }

    if contains_word(&lower, "strategy")
        || lower.contains("game plan")
        || lower.contains("how do i approach")
        || lower.contains("how should i approach")
        || lower.contains("next steps with")
    {
        return Some(decision(
            SpecialistId::SalesStrategy,
            0.92,
            "strategy keywords",
        ));
    }

    None
}

fn decision(agent: SpecialistId, confidence: f32, reason: &str) -> RoutingDecision {
    RoutingDecision {
        agents: vec![agent],
        mode: DecisionMode::Rules,
        confidence,
        reason: reason.to_string(),
    }
}

/// Whole-word containment without a regex: `tier` must not match `frontier`.
pub fn contains_word(haystack: &str, word: &str) -> bool {
    let mut start = 0;
    while let Some(pos) = haystack[start..].find(word) {
        let abs = start + pos;
        let before_ok = abs == 0
            || !haystack[..abs]
                .chars()
                .next_back()
                .is_some_and(|c| c.is_alphanumeric());
        let after = abs + word.len();
        let after_ok = after >= haystack.len()
            || !haystack[after..]
                .chars()
                .next()
                .is_some_and(|c| c.is_alphanumeric());
        if before_ok && after_ok {
            return true;
        }
        start = abs + word.len();
    }
    false
}
