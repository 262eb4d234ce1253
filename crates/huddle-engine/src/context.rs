//! Context assembly. Everything a model call sees is built here: the
//! persisted history, the injected grounding blocks, and the task message.
//! Two invariants govern every assembled sequence: the last message is
//! always a user message carrying the task, and grounding blocks ride as
//! assistant turns — providers hoist system turns into a single top-level
//! field, so a system-role block would never reach the messages array.

use huddle_persist::Account;
use huddle_types::{ChatMessage, ChatRole, RoutingDecision, SpecialistId, SpecialistResult};

/// Grounding blocks shared by every model call in a turn. Each is already
/// rendered; `None` means the source produced nothing this turn.
#[derive(Debug, Default, Clone)]
pub struct ContextBlocks {
    pub account_memory: Option<String>,
    pub knowledge: Option<String>,
    pub research: Option<String>,
}

impl ContextBlocks {
    /// Knowledge reads as "retrieved for this question" and sits immediately
    /// before the last user message; account memory and research are broader
    /// context and follow the history.
    fn inject(&self, into: &mut Vec<ChatMessage>) {
        if let Some(knowledge) = &self.knowledge {
            let at = into
                .iter()
                .rposition(|m| m.role == ChatRole::User)
                .unwrap_or(into.len());
            into.insert(at, ChatMessage::assistant(knowledge.clone()));
        }
        for block in [&self.account_memory, &self.research].into_iter().flatten() {
            into.push(ChatMessage::assistant(block.clone()));
        }
    }
}

/// Render the linked account into an account-memory block.
pub fn account_memory_block(account: &Account) -> String {
    let mut block = format!("[Account Memory]\nAccount: {}\n", account.name);
    match &account.facts {
        serde_json::Value::Null => {}
        facts => {
            let rendered =
                serde_json::to_string_pretty(facts).unwrap_or_else(|_| facts.to_string());
            block.push_str("Known facts:\n");
            block.push_str(&rendered);
            block.push('\n');
        }
    }
    block
}

/// Render the routing decision so the synthesis knows what ran and why.
pub fn routing_block(decision: &RoutingDecision) -> String {
    let agents: Vec<&str> = decision.agents.iter().map(|a| a.as_str()).collect();
    format!(
        "[Routing]\nInternal metadata; never quote verbatim.\nAgents: {}\nMode: {}\nConfidence: {:.2}\nReason: {}\n",
        agents.join(", "),
        decision.mode.as_str(),
        decision.confidence,
        decision.reason
    )
}

/// Render settled specialist prose into one perspectives block. Failures
/// appear as explicit gaps so the synthesis never silently drops an agent.
pub fn perspectives_block(results: &[SpecialistResult]) -> Option<String> {
    if results.is_empty() {
        return None;
    }
    let mut block = String::from("[Agent Perspectives]\n");
    for result in results {
        block.push_str(&format!("## {}\n", result.label()));
        match &result.outcome {
            Ok(output) if !output.content.trim().is_empty() => {
                block.push_str(output.content.trim());
                block.push('\n');
            }
            Ok(_) => block.push_str("(no perspective produced)\n"),
            Err(error) => block.push_str(&format!("(unavailable: {error})\n")),
        }
        block.push('\n');
    }
    Some(block)
}

/// Build the message sequence one specialist sees: history, grounding
/// blocks, its own reference material, then its task as the final user
/// message.
pub fn specialist_messages(
    history: &[ChatMessage],
    blocks: &ContextBlocks,
    agent: SpecialistId,
    reference: Option<&str>,
) -> Vec<ChatMessage> {
    let mut messages = conversational(history);
    blocks.inject(&mut messages);
    if let Some(reference) = reference {
        messages.push(ChatMessage::assistant(reference.to_string()));
    }
    messages.push(ChatMessage::user(format!(
        "Task: provide your {} perspective on the latest request in this conversation. \
         Work only from the conversation and the bracketed context blocks.",
        agent.label()
    )));
    messages
}

/// Build the synthesis message sequence: history, grounding blocks, routing,
/// specialist perspectives, council findings, then the synthesis task as the
/// final user message.
pub fn synthesis_messages(
    history: &[ChatMessage],
    blocks: &ContextBlocks,
    routing: &RoutingDecision,
    results: &[SpecialistResult],
    council: Option<&str>,
) -> Vec<ChatMessage> {
    let mut messages = conversational(history);
    blocks.inject(&mut messages);
    messages.push(ChatMessage::assistant(routing_block(routing)));
    if let Some(perspectives) = perspectives_block(results) {
        messages.push(ChatMessage::assistant(perspectives));
    }
    if let Some(council) = council {
        messages.push(ChatMessage::assistant(council.to_string()));
    }
    messages.push(ChatMessage::user(
        "Write the final reply to my latest message above, grounded in the bracketed \
         context blocks. Speak directly to me; do not mention the blocks, the agents, \
         or the routing."
            .to_string(),
    ));
    messages
}

/// History restricted to what a model should replay: user and assistant
/// turns with non-empty content.
fn conversational(history: &[ChatMessage]) -> Vec<ChatMessage> {
    history
        .iter()
        .filter(|m| {
            matches!(m.role, ChatRole::User | ChatRole::Assistant) && !m.content.trim().is_empty()
        })
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use huddle_types::{DecisionMode, SpecialistOutput};

    fn history() -> Vec<ChatMessage> {
        vec![
            ChatMessage::user("Toronto General Hospital"),
            ChatMessage::assistant("VERDICT: Tier 2."),
            ChatMessage::user("what about their EHR?"),
        ]
    }

    fn routing() -> RoutingDecision {
        RoutingDecision {
            agents: vec![SpecialistId::IcpFit],
            mode: DecisionMode::Judgment,
            confidence: 0.85,
            reason: "follow-up".to_string(),
        }
    }

    #[test]
    fn last_message_is_always_the_user_task() {
        let blocks = ContextBlocks {
            knowledge: Some("[Knowledge Base]\nnotes".to_string()),
            ..Default::default()
        };
        let for_specialist = specialist_messages(&history(), &blocks, SpecialistId::IcpFit, None);
        assert_eq!(for_specialist.last().unwrap().role, ChatRole::User);

        let for_synthesis = synthesis_messages(&history(), &blocks, &routing(), &[], None);
        assert_eq!(for_synthesis.last().unwrap().role, ChatRole::User);

        // Holds even with no history at all.
        let empty = synthesis_messages(&[], &ContextBlocks::default(), &routing(), &[], None);
        assert_eq!(empty.last().unwrap().role, ChatRole::User);
    }

    #[test]
    fn knowledge_precedes_the_last_user_message_other_blocks_follow() {
        let blocks = ContextBlocks {
            account_memory: Some("[Account Memory]\nAccount: TGH".to_string()),
            knowledge: Some("[Knowledge Base]\nnotes".to_string()),
            research: Some("[External Research]\nfindings".to_string()),
        };
        let messages = specialist_messages(&history(), &blocks, SpecialistId::IcpFit, None);

        // history (3, knowledge spliced before its last user turn) + broader
        // blocks (2) + task (1)
        assert_eq!(messages.len(), 7);
        assert!(messages[2].content.starts_with("[Knowledge Base]"));
        assert_eq!(messages[3].content, "what about their EHR?");
        assert!(messages[4].content.starts_with("[Account Memory]"));
        assert!(messages[5].content.starts_with("[External Research]"));
        assert_eq!(messages[2].role, ChatRole::Assistant);
    }

    // Providers drop system rows from the messages array, so an assembled
    // sequence must never rely on that role for its grounding.
    #[test]
    fn grounding_blocks_ride_as_assistant_turns() {
        let blocks = ContextBlocks {
            account_memory: Some("[Account Memory]\nAccount: TGH".to_string()),
            knowledge: Some("[Knowledge Base]\nnotes".to_string()),
            research: Some("[External Research]\nfindings".to_string()),
        };
        let results = vec![SpecialistResult {
            agent: SpecialistId::IcpFit,
            outcome: Ok(SpecialistOutput {
                content: "Tier 2.".to_string(),
                telemetry: None,
            }),
        }];
        let messages = synthesis_messages(
            &history(),
            &blocks,
            &routing(),
            &results,
            Some("[Council Findings]\nAlerts:\n- [ICP Fit] x\n"),
        );

        assert!(messages.iter().all(|m| m.role != ChatRole::System));
        // knowledge + account memory + research + routing + perspectives +
        // council, all as assistant turns.
        let assistant_blocks: Vec<&str> = messages
            .iter()
            .filter(|m| m.role == ChatRole::Assistant && m.content.starts_with('['))
            .map(|m| m.content.as_str())
            .collect();
        assert_eq!(assistant_blocks.len(), 6);
    }

    #[test]
    fn specialist_reference_sits_between_blocks_and_task() {
        let messages = specialist_messages(
            &history(),
            &ContextBlocks::default(),
            SpecialistId::IcpFit,
            Some("[ICP Fit Reference]\nWalk away under 50 beds."),
        );
        let n = messages.len();
        assert!(messages[n - 2].content.starts_with("[ICP Fit Reference]"));
        assert_eq!(messages[n - 2].role, ChatRole::Assistant);
        assert_eq!(messages[n - 1].role, ChatRole::User);
    }

    #[test]
    fn synthesis_carries_routing_perspectives_and_findings() {
        let results = vec![
            SpecialistResult {
                agent: SpecialistId::IcpFit,
                outcome: Ok(SpecialistOutput {
                    content: "Tier 2, strong ops fit.".to_string(),
                    telemetry: None,
                }),
            },
            SpecialistResult {
                agent: SpecialistId::StakeholderMap,
                outcome: Err("timed out after 18000ms".to_string()),
            },
        ];
        let messages = synthesis_messages(
            &history(),
            &ContextBlocks::default(),
            &routing(),
            &results,
            Some("[Council Findings]\nAlerts:\n- [ICP Fit] x\n"),
        );

        let joined: String = messages.iter().map(|m| m.content.as_str()).collect();
        assert!(joined.contains("[Routing]"));
        assert!(joined.contains("## ICP Fit"));
        assert!(joined.contains("(unavailable: timed out after 18000ms)"));
        assert!(joined.contains("[Council Findings]"));
    }

    #[test]
    fn account_memory_renders_facts_when_present() {
        let mut account = Account::new("t1", "Toronto General Hospital");
        account.facts = serde_json::json!({"beds": 471});
        let block = account_memory_block(&account);
        assert!(block.contains("Account: Toronto General Hospital"));
        assert!(block.contains("471"));

        account.facts = serde_json::Value::Null;
        let bare = account_memory_block(&account);
        assert!(!bare.contains("Known facts"));
    }

    #[test]
    fn stray_system_rows_in_history_are_dropped() {
        let history = vec![
            ChatMessage::system("leftover"),
            ChatMessage::user("hi"),
        ];
        let messages =
            specialist_messages(&history, &ContextBlocks::default(), SpecialistId::Chat, None);
        assert!(!messages.iter().any(|m| m.content == "leftover"));
    }
}
