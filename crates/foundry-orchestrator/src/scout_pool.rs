//! Parallel scout coordinator
//!
//! Runs all scout subagents concurrently under an upper bound. Each subagent
//! is an independent, self-contained LLM call; a thrown error becomes a
//! failure result. The phase succeeds when at least one scout succeeded
//! (partial-failure tolerance).

use foundry_client::UnifiedClient;
use foundry_tasks::{SubagentResult, SubagentTask};
use foundry_utils::types::PhaseKind;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info};

/// Upper bound on concurrent scout calls.
pub const SCOUT_MAX_WORKERS: usize = 5;

/// Executes scout subagent tasks concurrently.
pub struct ScoutCoordinator {
    client: Arc<UnifiedClient>,
}

impl ScoutCoordinator {
    #[must_use]
    pub fn new(client: Arc<UnifiedClient>) -> Self {
        Self { client }
    }

    /// Run every scout task; returns `(results, phase_success)`.
    pub async fn execute(&self, tasks: &[SubagentTask]) -> (Vec<SubagentResult>, bool) {
        if tasks.is_empty() {
            return (Vec::new(), false);
        }

        let semaphore = Arc::new(Semaphore::new(SCOUT_MAX_WORKERS));
        let mut join_set = JoinSet::new();

        for task in tasks {
            let task = task.clone();
            let client = Arc::clone(&self.client);
            let semaphore = Arc::clone(&semaphore);

            join_set.spawn(async move {
                let _permit = semaphore.acquire().await.expect("semaphore closed");
                run_scout_subagent(&client, &task).await
            });
        }

        let mut results = Vec::with_capacity(tasks.len());
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok(result) => results.push(result),
                Err(e) => error!(error = %e, "scout worker panicked"),
            }
        }

        let success = results.iter().any(|r| r.success);
        info!(
            total = results.len(),
            succeeded = results.iter().filter(|r| r.success).count(),
            success,
            "scout phase finished"
        );
        (results, success)
    }
}

async fn run_scout_subagent(client: &UnifiedClient, task: &SubagentTask) -> SubagentResult {
    let mut prompt = format!("{}\n", task.objective);
    if !task.sources.is_empty() {
        prompt.push_str("\nFOCUS ON:\n");
        for source in &task.sources {
            prompt.push_str(&format!("- {source}\n"));
        }
    }
    prompt.push_str("\nReturn concise research findings in markdown.");

    match client.call_detached(PhaseKind::Scout, &prompt, None).await {
        Ok(response) => {
            let mut result = SubagentResult::success(task);
            result.findings = Some(response.content);
            result.token_usage = (response.input_tokens, response.output_tokens);
            result
        }
        Err(e) => {
            error!(task = %task.id, error = %e, "scout subagent failed");
            SubagentResult::failure(task, e.to_string())
        }
    }
}
