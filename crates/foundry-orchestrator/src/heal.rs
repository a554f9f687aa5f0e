//! Self-healing loop
//!
//! Validate, and on failure ask an LLM judge to score the artifacts against
//! the requirements, turn weak criteria into targeted fix tasks, run them
//! through the builder coordinator, and try again — up to a bounded number
//! of attempts.

use crate::builder_pool::BuilderCoordinator;
use foundry_client::UnifiedClient;
use foundry_utils::types::PhaseKind;
use foundry_validation::{
    JudgeScores, ValidationOutcome, Validator, all_passed, run_pipeline, synthesize_fix_tasks,
};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Default bound on heal attempts.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Pause between attempts so file writes settle before re-validation.
const SETTLE_DELAY: Duration = Duration::from_millis(500);

/// Result of a healing run.
#[derive(Debug)]
pub struct HealReport {
    /// Attempts actually made (1 = validation passed immediately)
    pub attempts: u32,
    /// Whether validation ultimately passed
    pub success: bool,
    /// Final pipeline outcomes, for reporting
    pub final_outcomes: Vec<(&'static str, ValidationOutcome)>,
    /// Fix tasks issued per attempt
    pub fix_tasks_issued: usize,
}

/// Bounded validate → judge → fix → rebuild loop.
pub struct SelfHealingLoop {
    client: Arc<UnifiedClient>,
    coordinator: BuilderCoordinator,
    validators: Vec<Box<dyn Validator>>,
    requirements: String,
    max_attempts: u32,
}

impl SelfHealingLoop {
    #[must_use]
    pub fn new(
        client: Arc<UnifiedClient>,
        coordinator: BuilderCoordinator,
        validators: Vec<Box<dyn Validator>>,
        requirements: impl Into<String>,
    ) -> Self {
        Self {
            client,
            coordinator,
            validators,
            requirements: requirements.into(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    /// Override the attempt bound.
    #[must_use]
    pub const fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Run the loop until validation passes or attempts are exhausted.
    pub async fn run(&self, project_root: &Path) -> HealReport {
        let mut fix_tasks_issued = 0;
        let mut last_outcomes = Vec::new();

        for attempt in 1..=self.max_attempts {
            let outcomes = run_pipeline(&self.validators, project_root).await;
            if all_passed(&outcomes) {
                info!(attempt, "validation passed");
                return HealReport {
                    attempts: attempt,
                    success: true,
                    final_outcomes: outcomes,
                    fix_tasks_issued,
                };
            }

            if attempt == self.max_attempts {
                last_outcomes = outcomes;
                break;
            }

            info!(attempt, "validation failed; judging artifacts");
            let runtime_stderr = outcomes
                .iter()
                .flat_map(|(_, o)| o.issues.iter())
                .find_map(|issue| issue.stderr_tail.clone());

            let scores = self.judge(project_root, &outcomes).await;
            let fix_tasks = synthesize_fix_tasks(&scores, runtime_stderr.as_deref(), attempt);
            if fix_tasks.is_empty() {
                // Judge found nothing actionable; issue one generic repair
                // task from the validator issues themselves.
                let issue_digest: Vec<String> = outcomes
                    .iter()
                    .flat_map(|(name, o)| {
                        o.issues.iter().map(move |i| format!("[{name}] {}", i.message))
                    })
                    .collect();
                let generic = foundry_tasks::SubagentTask::new(
                    format!("heal_{attempt}_validators"),
                    foundry_tasks::SubagentTaskType::Builder,
                    format!("Fix these validation failures:\n{}", issue_digest.join("\n")),
                );
                fix_tasks_issued += 1;
                let _ = self.coordinator.execute_leveled(&[generic]).await;
            } else {
                fix_tasks_issued += fix_tasks.len();
                info!(count = fix_tasks.len(), "running fix tasks");
                let outcome = self.coordinator.execute_leveled(&fix_tasks).await;
                if !outcome.success {
                    warn!("every fix task failed; continuing to next attempt anyway");
                }
            }

            tokio::time::sleep(SETTLE_DELAY).await;
        }

        HealReport {
            attempts: self.max_attempts,
            success: false,
            final_outcomes: last_outcomes,
            fix_tasks_issued,
        }
    }

    /// Score the current artifacts against the requirements.
    ///
    /// Judge failures degrade to empty scores (all criteria 0.0), which
    /// synthesize maximal fix tasks rather than aborting the loop.
    async fn judge(
        &self,
        project_root: &Path,
        outcomes: &[(&'static str, ValidationOutcome)],
    ) -> JudgeScores {
        let listing = project_listing(project_root);
        let failures: Vec<String> = outcomes
            .iter()
            .filter(|(_, o)| !o.passed)
            .flat_map(|(name, o)| o.issues.iter().map(move |i| format!("[{name}] {}", i.message)))
            .collect();

        let prompt = format!(
            "Score this generated project against its requirements. Respond with \
             JSON only: {{\"functionality\": {{\"score\": 0.0, \"issues\": []}}, \
             \"completeness\": ..., \"code_quality\": ..., \"test_coverage\": ..., \
             \"documentation\": ...}} with every score in [0, 1].\n\n\
             REQUIREMENTS:\n{}\n\nPROJECT FILES:\n{}\n\nVALIDATION FAILURES:\n{}",
            self.requirements,
            listing,
            failures.join("\n"),
        );

        match self.client.call_detached(PhaseKind::Architect, &prompt, None).await {
            Ok(response) => JudgeScores::from_llm_output(&response.content).unwrap_or_else(|w| {
                warn!(warning = %w.message, "judge output unusable; assuming worst scores");
                JudgeScores::default()
            }),
            Err(e) => {
                warn!(error = %e, "judge call failed; assuming worst scores");
                JudgeScores::default()
            }
        }
    }
}

/// Flat file listing of the project, excluding housekeeping directories.
fn project_listing(project_root: &Path) -> String {
    let mut files = Vec::new();
    let mut stack = vec![project_root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        let Ok(entries) = std::fs::read_dir(&dir) else {
            continue;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if path.is_dir() {
                if name != "node_modules" && !name.starts_with('.') {
                    stack.push(path);
                }
            } else if let Ok(rel) = path.strip_prefix(project_root) {
                files.push(rel.to_string_lossy().replace('\\', "/"));
            }
        }
    }
    files.sort();
    files.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use foundry_client::PhaseConfigs;
    use foundry_extraction::ArtifactExtractor;
    use foundry_providers::{Model, ModelPricing, Provider, ProviderRegistry};
    use foundry_utils::error::ProviderError;
    use foundry_utils::types::{Message, ProviderResponse};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    /// A validator that passes once a marker file exists.
    struct MarkerValidator;

    #[async_trait]
    impl Validator for MarkerValidator {
        fn name(&self) -> &'static str {
            "marker"
        }
        async fn validate(&self, project_root: &Path) -> ValidationOutcome {
            if project_root.join("src/impl.js").exists() {
                ValidationOutcome::pass()
            } else {
                ValidationOutcome::fail(vec![foundry_validation::ValidationIssue::new(
                    "implementation missing",
                )])
            }
        }
    }

    /// Judge responses say completeness is broken; builder responses write
    /// the missing implementation file.
    struct HealingProvider {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Provider for HealingProvider {
        fn name(&self) -> &'static str {
            "healing"
        }
        fn display_name(&self) -> &'static str {
            "Healing"
        }
        fn credential_env(&self) -> &'static str {
            "HEALING_KEY"
        }
        fn is_configured(&self) -> bool {
            true
        }
        fn available_models(&self) -> Vec<Model> {
            vec![Model::new("healing-1", "Healing", 100_000, "test")]
        }
        async fn call(
            &self,
            messages: &[Message],
            model: &str,
            _max_tokens: u32,
            _temperature: f32,
        ) -> Result<ProviderResponse, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let prompt = messages.last().map(|m| m.content.as_str()).unwrap_or("");
            let reply = if prompt.contains("Score this generated project") {
                r#"{"functionality": {"score": 0.8, "issues": []},
                    "completeness": {"score": 0.2, "issues": ["only tests exist"]},
                    "code_quality": {"score": 0.8, "issues": []},
                    "test_coverage": {"score": 0.9, "issues": []},
                    "documentation": {"score": 0.8, "issues": []}}"#
                    .to_string()
            } else {
                "FILE: src/impl.js\n```js\nmodule.exports = {};\n```\n".to_string()
            };
            Ok(ProviderResponse::new(reply, model, 10, 10))
        }
        fn fallback_pricing(&self) -> HashMap<String, ModelPricing> {
            HashMap::new()
        }
    }

    fn heal_loop(dir: &TempDir) -> (SelfHealingLoop, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut registry = ProviderRegistry::new();
        registry.register(Arc::new(HealingProvider {
            calls: Arc::clone(&calls),
        }));
        let client = Arc::new(
            UnifiedClient::new(
                Arc::new(registry),
                PhaseConfigs::uniform("healing", "healing-1"),
            )
            .unwrap(),
        );
        let coordinator = BuilderCoordinator::new(
            Arc::clone(&client),
            ArtifactExtractor::new(dir.path(), "demo"),
        );
        let validators: Vec<Box<dyn Validator>> = vec![Box::new(MarkerValidator)];
        (
            SelfHealingLoop::new(client, coordinator, validators, "a working module"),
            calls,
        )
    }

    #[tokio::test]
    async fn test_tests_only_project_heals_in_one_iteration() {
        let dir = TempDir::new().unwrap();
        // Builder produced only a test file; validation fails
        std::fs::create_dir_all(dir.path().join("tests")).unwrap();
        std::fs::write(dir.path().join("tests/impl.test.js"), "test()").unwrap();

        let (heal, _) = heal_loop(&dir);
        let report = heal.run(dir.path()).await;

        assert!(report.success);
        assert_eq!(report.attempts, 2, "one heal iteration then a passing validation");
        assert!(report.fix_tasks_issued >= 1);
        assert!(dir.path().join("src/impl.js").exists());
    }

    #[tokio::test]
    async fn test_already_valid_project_makes_no_calls() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("src")).unwrap();
        std::fs::write(dir.path().join("src/impl.js"), "ok").unwrap();

        let (heal, calls) = heal_loop(&dir);
        let report = heal.run(dir.path()).await;

        assert!(report.success);
        assert_eq!(report.attempts, 1);
        assert_eq!(report.fix_tasks_issued, 0);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_attempts_exhausted_reports_failure() {
        struct NeverPass;
        #[async_trait]
        impl Validator for NeverPass {
            fn name(&self) -> &'static str {
                "never"
            }
            async fn validate(&self, _root: &Path) -> ValidationOutcome {
                ValidationOutcome::fail(vec![foundry_validation::ValidationIssue::new("no")])
            }
        }

        let dir = TempDir::new().unwrap();
        let (mut heal, _calls) = heal_loop(&dir);
        heal.validators = vec![Box::new(NeverPass)];
        let heal = heal.with_max_attempts(2);

        let report = heal.run(dir.path()).await;
        assert!(!report.success);
        assert_eq!(report.attempts, 2);
        assert!(!report.final_outcomes.is_empty());
    }
}
