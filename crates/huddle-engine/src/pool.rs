//! Bounded-concurrency specialist pool. A fixed set of workers pulls tasks
//! off a shared index; each task runs under its own deadline, and every
//! task settles. One slow or failing specialist never takes down the rest.

use crate::specialists;
use huddle_llm::CompletionClient;
use huddle_types::{ChatMessage, SpecialistId, SpecialistResult};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub struct SpecialistTask {
    pub agent: SpecialistId,
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
}

/// Run every task and return one settled result per task, in input order.
pub async fn run_all(
    client: Arc<dyn CompletionClient>,
    tasks: Vec<SpecialistTask>,
    concurrency: usize,
    task_timeout: Duration,
) -> Vec<SpecialistResult> {
    if tasks.is_empty() {
        return Vec::new();
    }

    let agents: Vec<SpecialistId> = tasks.iter().map(|t| t.agent).collect();
    let tasks = Arc::new(tasks);
    let next = Arc::new(AtomicUsize::new(0));
    let slots: Arc<Mutex<Vec<Option<SpecialistResult>>>> =
        Arc::new(Mutex::new((0..tasks.len()).map(|_| None).collect()));

    let workers = concurrency.max(1).min(tasks.len());
    let mut handles = Vec::with_capacity(workers);
    for _ in 0..workers {
        let client = Arc::clone(&client);
        let tasks = Arc::clone(&tasks);
        let next = Arc::clone(&next);
        let slots = Arc::clone(&slots);
        handles.push(tokio::spawn(async move {
            loop {
                let index = next.fetch_add(1, Ordering::SeqCst);
                let Some(task) = tasks.get(index) else {
                    break;
                };

                let run = specialists::run_specialist(
                    client.as_ref(),
                    task.agent,
                    task.messages.clone(),
                    task.max_tokens,
                );
                let outcome = match tokio::time::timeout(task_timeout, run).await {
                    Ok(Ok(output)) => Ok(output),
                    Ok(Err(error)) => {
                        tracing::warn!(agent = task.agent.as_str(), %error, "specialist failed");
                        Err(error.to_string())
                    }
                    Err(_) => {
                        tracing::warn!(
                            agent = task.agent.as_str(),
                            timeout_ms = task_timeout.as_millis() as u64,
                            "specialist timed out"
                        );
                        Err(format!(
                            "{} timed out after {}ms",
                            task.agent.label(),
                            task_timeout.as_millis()
                        ))
                    }
                };

                let mut slots = slots.lock().unwrap_or_else(|p| p.into_inner());
                slots[index] = Some(SpecialistResult {
                    agent: task.agent,
                    outcome,
                });
            }
        }));
    }

    for handle in handles {
        if let Err(error) = handle.await {
            tracing::error!(%error, "specialist worker panicked");
        }
    }

    let mut slots = slots.lock().unwrap_or_else(|p| p.into_inner());
    slots
        .iter_mut()
        .enumerate()
        .map(|(i, slot)| {
            slot.take().unwrap_or_else(|| SpecialistResult {
                agent: agents[i],
                outcome: Err("specialist worker terminated unexpectedly".to_string()),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use huddle_llm::MockCompletionClient;

    fn task(agent: SpecialistId) -> SpecialistTask {
        SpecialistTask {
            agent,
            messages: vec![ChatMessage::user("Acme Corp")],
            max_tokens: 500,
        }
    }

    #[tokio::test]
    async fn results_come_back_in_input_order() {
        let client = Arc::new(
            MockCompletionClient::new()
                .reply("first perspective")
                .reply("second perspective")
                .reply("third perspective"),
        );
        let results = run_all(
            client,
            vec![
                task(SpecialistId::IcpFit),
                task(SpecialistId::SalesStrategy),
                task(SpecialistId::StakeholderMap),
            ],
            3,
            Duration::from_secs(5),
        )
        .await;

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].agent, SpecialistId::IcpFit);
        assert_eq!(results[1].agent, SpecialistId::SalesStrategy);
        assert_eq!(results[2].agent, SpecialistId::StakeholderMap);
        assert!(results.iter().all(|r| r.outcome.is_ok()));
    }

    #[tokio::test]
    async fn one_failure_does_not_sink_the_rest() {
        let client = Arc::new(
            MockCompletionClient::new()
                .failure("rate limited")
                .reply("fine"),
        );
        // Single worker so the scripted order is deterministic.
        let results = run_all(
            client,
            vec![task(SpecialistId::IcpFit), task(SpecialistId::SalesStrategy)],
            1,
            Duration::from_secs(5),
        )
        .await;

        assert_eq!(results.len(), 2);
        assert!(results[0].outcome.is_err());
        assert_eq!(results[1].outcome.as_ref().unwrap().content, "fine");
    }

    #[tokio::test]
    async fn slow_specialist_settles_as_timeout() {
        let client = Arc::new(
            MockCompletionClient::new()
                .reply("too late")
                .with_delay(Duration::from_millis(200)),
        );
        let results = run_all(
            client,
            vec![task(SpecialistId::DraftOutreach)],
            3,
            Duration::from_millis(20),
        )
        .await;

        let err = results[0].outcome.as_ref().unwrap_err();
        assert!(err.contains("timed out after 20ms"), "got: {err}");
    }

    #[tokio::test]
    async fn empty_task_list_is_a_no_op() {
        let client = Arc::new(MockCompletionClient::new());
        let results = run_all(client.clone(), Vec::new(), 3, Duration::from_secs(1)).await;
        assert!(results.is_empty());
        assert!(client.requests().is_empty());
    }
}
