//! Parallel builder coordinator
//!
//! Executes builder subagent tasks over a dependency DAG. Tasks in one level
//! run concurrently under a bounded worker pool; a level does not start
//! until every task in the prior level has terminated. Any failure within a
//! level logs and skips all remaining levels. Each subagent writes its files
//! directly to the project filesystem; nothing passes through the lead.

use crate::prompts;
use foundry_client::UnifiedClient;
use foundry_extraction::ArtifactExtractor;
use foundry_state::BuildStateTracker;
use foundry_tasks::{
    LevelSchedule, SubagentResult, SubagentTask, auto_scale_workers, topological_levels,
};
use foundry_utils::types::PhaseKind;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

/// Outcome of a coordinator run.
#[derive(Debug, Clone)]
pub struct PhaseOutcome {
    /// Per-task results, in completion order
    pub results: Vec<SubagentResult>,
    /// Whether at least one task succeeded
    pub success: bool,
    /// Levels that actually executed
    pub levels_executed: usize,
    /// Whether remaining levels were skipped after a failure
    pub skipped_levels: bool,
    /// Task ids reported as participating in a cycle
    pub cycle: Vec<String>,
}

impl PhaseOutcome {
    /// Zero-work success (incremental build with nothing to do).
    #[must_use]
    pub fn no_work() -> Self {
        Self {
            results: Vec::new(),
            success: true,
            levels_executed: 0,
            skipped_levels: false,
            cycle: Vec::new(),
        }
    }

    /// Every file written by successful tasks.
    #[must_use]
    pub fn files_written(&self) -> Vec<String> {
        self.results
            .iter()
            .filter(|r| r.success)
            .flat_map(|r| r.files_written.iter().cloned())
            .collect()
    }
}

/// Executes builder subagent tasks with bounded concurrency.
pub struct BuilderCoordinator {
    client: Arc<UnifiedClient>,
    extractor: ArtifactExtractor,
    max_parallel_override: Option<usize>,
}

impl BuilderCoordinator {
    #[must_use]
    pub fn new(client: Arc<UnifiedClient>, extractor: ArtifactExtractor) -> Self {
        Self {
            client,
            extractor,
            max_parallel_override: None,
        }
    }

    /// Cap worker counts below the auto-scaled value.
    #[must_use]
    pub const fn with_max_parallel(mut self, cap: usize) -> Self {
        self.max_parallel_override = Some(cap);
        self
    }

    /// Execute tasks, choosing dependency-aware or flat mode.
    pub async fn execute(&self, tasks: &[SubagentTask]) -> PhaseOutcome {
        if tasks.iter().any(|t| !t.dependencies.is_empty()) {
            self.execute_leveled(tasks).await
        } else {
            self.execute_flat(tasks).await
        }
    }

    /// Dependency-aware execution: levels in order, fail-fast at the level
    /// boundary.
    pub async fn execute_leveled(&self, tasks: &[SubagentTask]) -> PhaseOutcome {
        let schedule: LevelSchedule = topological_levels(tasks);
        if !schedule.cycle.is_empty() {
            warn!(cycle = ?schedule.cycle, "executing cycle tasks as a best-effort final level");
        }

        let mut results = Vec::new();
        let mut levels_executed = 0;
        let mut skipped_levels = false;

        for (index, level) in schedule.levels.iter().enumerate() {
            let workers = auto_scale_workers(level.len(), self.max_parallel_override);
            info!(level = index, tasks = level.len(), workers, "executing builder level");

            let level_results = self.run_pool(level, workers).await;
            let level_failed = level_results.iter().any(|r| !r.success);
            results.extend(level_results);
            levels_executed += 1;

            if level_failed && index + 1 < schedule.levels.len() {
                error!(
                    level = index,
                    remaining = schedule.levels.len() - index - 1,
                    "task failure in level; skipping remaining levels"
                );
                skipped_levels = true;
                break;
            }
        }

        let success = results.iter().any(|r| r.success);
        PhaseOutcome {
            results,
            success,
            levels_executed,
            skipped_levels,
            cycle: schedule.cycle,
        }
    }

    /// Flat execution: one bounded pool over all tasks.
    pub async fn execute_flat(&self, tasks: &[SubagentTask]) -> PhaseOutcome {
        let workers = auto_scale_workers(tasks.len(), self.max_parallel_override);
        info!(tasks = tasks.len(), workers, "executing builder tasks (flat)");
        let results = self.run_pool(tasks, workers).await;
        let success = results.iter().any(|r| r.success);
        PhaseOutcome {
            results,
            success,
            levels_executed: 1,
            skipped_levels: false,
            cycle: Vec::new(),
        }
    }

    /// Incremental execution against recorded build state.
    ///
    /// With no detected changes this performs zero provider calls. Otherwise
    /// only tasks affected by the changes run; when changes exist but map to
    /// no known task (new files), every task runs. Files created by
    /// successful tasks are re-hashed into the tracker afterwards.
    ///
    /// # Errors
    /// Returns an error only from build-state persistence.
    pub async fn execute_incremental(
        &self,
        tasks: &[SubagentTask],
        tracker: &mut BuildStateTracker,
    ) -> anyhow::Result<PhaseOutcome> {
        let (rebuild, reasons) = tracker.should_rebuild();
        if !rebuild {
            info!("incremental build: no changes detected; nothing to do");
            return Ok(PhaseOutcome::no_work());
        }
        info!(?reasons, "incremental build triggered");

        let changed = tracker.changed_files();
        let affected = tracker.affected_tasks(&changed);

        let subset: Vec<SubagentTask> = if affected.is_empty() {
            // Changes exist (new files, first build) but map to no known
            // task; fall back to the full set.
            tasks.to_vec()
        } else {
            tasks
                .iter()
                .filter(|t| affected.contains(&t.id))
                .cloned()
                .collect()
        };

        let subset = if subset.is_empty() { tasks.to_vec() } else { subset };
        info!(selected = subset.len(), total = tasks.len(), "incremental task selection");

        let outcome = self.execute_leveled(&subset).await;

        for result in outcome.results.iter().filter(|r| r.success) {
            for file in &result.files_written {
                if let Err(e) = tracker.track_file(file, &result.task_id, Vec::new()) {
                    warn!(file = %file, error = %e, "failed to re-hash file into build state");
                }
            }
        }
        tracker.finish_build()?;

        Ok(outcome)
    }

    /// Run one group of tasks under a semaphore-bounded pool.
    async fn run_pool(&self, tasks: &[SubagentTask], workers: usize) -> Vec<SubagentResult> {
        if tasks.is_empty() {
            return Vec::new();
        }
        let semaphore = Arc::new(Semaphore::new(workers.max(1)));
        let mut join_set = JoinSet::new();

        for task in tasks {
            let task = task.clone();
            let client = Arc::clone(&self.client);
            let extractor = self.extractor.clone();
            let semaphore = Arc::clone(&semaphore);

            join_set.spawn(async move {
                let _permit = semaphore.acquire().await.expect("semaphore closed");
                run_builder_subagent(&client, &extractor, &task).await
            });
        }

        let mut results = Vec::with_capacity(tasks.len());
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok(result) => results.push(result),
                Err(e) => {
                    // A panicked worker becomes a failure result so the
                    // phase accounting stays complete.
                    error!(error = %e, "builder worker panicked");
                    results.push(SubagentResult {
                        task_id: "unknown".to_string(),
                        task_type: foundry_tasks::SubagentTaskType::Builder,
                        success: false,
                        findings: None,
                        files_written: Vec::new(),
                        token_usage: (0, 0),
                        error: Some(format!("worker panicked: {e}")),
                        metadata: Default::default(),
                    });
                }
            }
        }
        results
    }
}

/// Execute one builder subagent: self-contained prompt, detached call,
/// direct extraction to the project filesystem.
async fn run_builder_subagent(
    client: &UnifiedClient,
    extractor: &ArtifactExtractor,
    task: &SubagentTask,
) -> SubagentResult {
    let prompt = prompts::subagent_builder_prompt(task);

    let response = match client.call_detached(PhaseKind::Builder, &prompt, None).await {
        Ok(response) => response,
        Err(e) => {
            error!(task = %task.id, error = %e, "builder subagent call failed");
            return SubagentResult::failure(task, e.to_string());
        }
    };

    let report = match extractor.extract(&response.content) {
        Ok(report) => report,
        Err(e) => {
            return SubagentResult::failure(task, format!("extraction failed: {e}"));
        }
    };

    for warning in &report.warnings {
        warn!(task = %task.id, warning = %warning, "extraction warning");
    }

    let mut result = SubagentResult::success(task);
    result.files_written = report.written.iter().map(|f| f.relpath.clone()).collect();
    result.token_usage = (response.input_tokens, response.output_tokens);
    result
}
