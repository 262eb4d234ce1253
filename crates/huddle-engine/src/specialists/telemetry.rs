//! Telemetry side-channel parsing. Specialists append one HTML comment
//! carrying structured findings; this module splits it off the prose.

use huddle_llm::json::parse_object;
use huddle_types::Telemetry;

const OPEN: &str = "<!--TELEMETRY";
const CLOSE: &str = "-->";

/// Split a specialist reply into prose and its telemetry block, if any.
/// A malformed block is dropped from the prose but yields no telemetry.
pub fn extract(text: &str) -> (String, Option<Telemetry>) {
    let Some(start) = text.find(OPEN) else {
        return (text.trim().to_string(), None);
    };
    let after_open = start + OPEN.len();
    let Some(close_rel) = text[after_open..].find(CLOSE) else {
        // Unterminated comment: keep the prose before it, drop the rest.
        return (text[..start].trim().to_string(), None);
    };
    let close = after_open + close_rel;

    let mut prose = String::with_capacity(text.len());
    prose.push_str(&text[..start]);
    prose.push_str(&text[close + CLOSE.len()..]);

    let telemetry = parse_object(&text[after_open..close])
        .and_then(|value| serde_json::from_value::<Telemetry>(value).ok())
        .filter(|t| !t.is_empty());

    (prose.trim().to_string(), telemetry)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_prose_from_block() {
        let raw = "VERDICT: Tier 2.\n\n<!--TELEMETRY {\"alerts\":[\"bed count unverified\"],\"recommendations\":[],\"assumptions\":[],\"questions\":[]} -->";
        let (prose, telemetry) = extract(raw);
        assert_eq!(prose, "VERDICT: Tier 2.");
        assert_eq!(telemetry.unwrap().alerts, vec!["bed count unverified"]);
    }

    #[test]
    fn no_block_means_no_telemetry() {
        let (prose, telemetry) = extract("Just prose.");
        assert_eq!(prose, "Just prose.");
        assert!(telemetry.is_none());
    }

    #[test]
    fn empty_block_is_treated_as_absent() {
        let raw = "Answer. <!--TELEMETRY {\"alerts\":[],\"recommendations\":[],\"assumptions\":[],\"questions\":[]} -->";
        let (prose, telemetry) = extract(raw);
        assert_eq!(prose, "Answer.");
        assert!(telemetry.is_none());
    }

    #[test]
    fn malformed_json_drops_block_keeps_prose() {
        let raw = "Answer.\n<!--TELEMETRY not json at all -->";
        let (prose, telemetry) = extract(raw);
        assert_eq!(prose, "Answer.");
        assert!(telemetry.is_none());
    }

    #[test]
    fn unterminated_comment_keeps_leading_prose() {
        let raw = "Answer.\n<!--TELEMETRY {\"alerts\":[\"x\"]";
        let (prose, telemetry) = extract(raw);
        assert_eq!(prose, "Answer.");
        assert!(telemetry.is_none());
    }

    #[test]
    fn text_after_block_survives() {
        let raw = "Before. <!--TELEMETRY {\"questions\":[\"q1\"]} --> After.";
        let (prose, telemetry) = extract(raw);
        assert!(prose.starts_with("Before."));
        assert!(prose.ends_with("After."));
        assert_eq!(telemetry.unwrap().questions, vec!["q1"]);
    }
}
