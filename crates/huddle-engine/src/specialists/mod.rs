//! Specialist execution and council-findings aggregation.

pub mod telemetry;

use crate::prompts;
use anyhow::Result;
use huddle_llm::{CompletionClient, CompletionRequest};
use huddle_types::{ChatMessage, SpecialistId, SpecialistOutput, SpecialistResult};

/// Per-category caps on aggregated council findings.
const MAX_ALERTS: usize = 10;
const MAX_RECOMMENDATIONS: usize = 10;
const MAX_ASSUMPTIONS: usize = 10;
const MAX_QUESTIONS: usize = 5;

/// Run one specialist over an already-assembled context.
pub async fn run_specialist(
    client: &dyn CompletionClient,
    agent: SpecialistId,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
) -> Result<SpecialistOutput> {
    let system = format!(
        "{}\n{}",
        prompts::specialist_system(agent),
        prompts::TELEMETRY_SUFFIX
    );
    let raw = client
        .complete(CompletionRequest::new(system, messages).max_tokens(max_tokens))
        .await?;
    let (content, telemetry) = telemetry::extract(&raw);
    Ok(SpecialistOutput { content, telemetry })
}

/// Aggregate telemetry across settled specialists into one findings block.
/// Every line is prefixed with the specialist it came from; failed
/// specialists surface as alerts so the synthesis can acknowledge the gap.
pub fn council_findings(results: &[SpecialistResult]) -> Option<String> {
    let mut alerts = Vec::new();
    let mut recommendations = Vec::new();
    let mut assumptions = Vec::new();
    let mut questions = Vec::new();

    for result in results {
        let label = result.label();
        match &result.outcome {
            Ok(output) => {
                if let Some(t) = &output.telemetry {
                    extend_prefixed(&mut alerts, label, &t.alerts, MAX_ALERTS);
                    extend_prefixed(
                        &mut recommendations,
                        label,
                        &t.recommendations,
                        MAX_RECOMMENDATIONS,
                    );
                    extend_prefixed(&mut assumptions, label, &t.assumptions, MAX_ASSUMPTIONS);
                    extend_prefixed(&mut questions, label, &t.questions, MAX_QUESTIONS);
                }
            }
            Err(error) => {
                if alerts.len() < MAX_ALERTS {
                    alerts.push(format!("[{label}] perspective unavailable: {error}"));
                }
            }
        }
    }

    if alerts.is_empty() && recommendations.is_empty() && assumptions.is_empty() && questions.is_empty()
    {
        return None;
    }

    let mut block = String::from("[Council Findings]\n");
    append_section(&mut block, "Alerts", &alerts);
    append_section(&mut block, "Recommendations", &recommendations);
    append_section(&mut block, "Assumptions", &assumptions);
    append_section(&mut block, "Open questions", &questions);
    Some(block)
}

fn extend_prefixed(into: &mut Vec<String>, label: &str, items: &[String], cap: usize) {
    for item in items {
        if into.len() >= cap {
            break;
        }
        let item = item.trim();
        if !item.is_empty() {
            into.push(format!("[{label}] {item}"));
        }
    }
}

fn append_section(block: &mut String, heading: &str, items: &[String]) {
    if items.is_empty() {
        return;
    }
    block.push_str(heading);
    block.push_str(":\n");
    for item in items {
        block.push_str("- ");
        block.push_str(item);
        block.push('\n');
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use huddle_llm::MockCompletionClient;
    use huddle_types::Telemetry;

    fn ok_result(agent: SpecialistId, telemetry: Option<Telemetry>) -> SpecialistResult {
        SpecialistResult {
            agent,
            outcome: Ok(SpecialistOutput {
                content: "perspective".to_string(),
                telemetry,
            }),
        }
    }

    #[tokio::test]
    async fn runner_strips_telemetry_from_content() {
        let client = MockCompletionClient::new().reply(
            "VERDICT: Tier 1.\n<!--TELEMETRY {\"alerts\":[],\"recommendations\":[\"book a demo\"],\"assumptions\":[],\"questions\":[]} -->",
        );
        let output = run_specialist(
            &client,
            SpecialistId::IcpFit,
            vec![ChatMessage::user("Acme Corp")],
            2000,
        )
        .await
        .unwrap();

        assert_eq!(output.content, "VERDICT: Tier 1.");
        assert_eq!(
            output.telemetry.unwrap().recommendations,
            vec!["book a demo"]
        );
        // The specialist prompt and telemetry instructions ride the system slot.
        let request = &client.requests()[0];
        assert!(request.system.contains("TELEMETRY"));
        assert!(request.system.contains("ideal customer profile"));
    }

    #[test]
    fn findings_are_prefixed_per_specialist() {
        let results = vec![
            ok_result(
                SpecialistId::IcpFit,
                Some(Telemetry {
                    alerts: vec!["bed count unverified".to_string()],
                    questions: vec!["what EHR do they run?".to_string()],
                    ..Default::default()
                }),
            ),
            ok_result(
                SpecialistId::SalesStrategy,
                Some(Telemetry {
                    recommendations: vec!["lead with the CFO".to_string()],
                    ..Default::default()
                }),
            ),
        ];
        let block = council_findings(&results).unwrap();
        assert!(block.contains("[ICP Fit] bed count unverified"));
        assert!(block.contains("[Sales Strategy] lead with the CFO"));
        assert!(block.contains("Open questions:\n- [ICP Fit] what EHR do they run?"));
    }

    #[test]
    fn failed_specialist_becomes_an_alert() {
        let results = vec![SpecialistResult {
            agent: SpecialistId::StakeholderMap,
            outcome: Err("timed out after 18000ms".to_string()),
        }];
        let block = council_findings(&results).unwrap();
        assert!(block.contains("[Stakeholder Map] perspective unavailable: timed out"));
    }

    #[test]
    fn no_telemetry_means_no_block() {
        let results = vec![ok_result(SpecialistId::IcpFit, None)];
        assert!(council_findings(&results).is_none());
    }

    #[test]
    fn question_cap_holds_across_specialists() {
        let many = Telemetry {
            questions: (0..8).map(|i| format!("q{i}")).collect(),
            ..Default::default()
        };
        let results = vec![ok_result(SpecialistId::IcpFit, Some(many))];
        let block = council_findings(&results).unwrap();
        assert_eq!(block.matches("- [ICP Fit] q").count(), 5);
    }
}
