//! Validation of generated projects
//!
//! Validators run in order: reference checks, structure checks, then the
//! opt-in build and runtime validators that execute real commands. Each
//! returns a pass/fail outcome with structured details; failures feed the
//! self-healing loop rather than aborting the workflow.

mod build;
mod judge;
mod reference;
mod runtime;
mod structure;

pub use build::BuildValidator;
pub use judge::{CriterionScore, JudgeScores, synthesize_fix_tasks};
pub use reference::ReferenceValidator;
pub use runtime::RuntimeValidator;
pub use structure::{ProjectType, StructureValidator, detect_project_type};

use async_trait::async_trait;
use std::path::Path;

/// One problem a validator found.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ValidationIssue {
    /// What went wrong
    pub message: String,
    /// Command that produced the failure, when one ran
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    /// Exit code of that command
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    /// Tail of captured stderr
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stderr_tail: Option<String>,
}

impl ValidationIssue {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            command: None,
            exit_code: None,
            stderr_tail: None,
        }
    }

    #[must_use]
    pub fn with_command(mut self, command: impl Into<String>, exit_code: Option<i32>) -> Self {
        self.command = Some(command.into());
        self.exit_code = exit_code;
        self
    }

    #[must_use]
    pub fn with_stderr(mut self, stderr: &str) -> Self {
        let tail: String = stderr
            .chars()
            .rev()
            .take(2048)
            .collect::<String>()
            .chars()
            .rev()
            .collect();
        self.stderr_tail = Some(tail);
        self
    }
}

/// Result of running one validator.
#[derive(Debug, Clone, Default)]
pub struct ValidationOutcome {
    /// Whether the validator passed
    pub passed: bool,
    /// Hard problems (cause `passed == false`)
    pub issues: Vec<ValidationIssue>,
    /// Soft observations that do not fail validation
    pub warnings: Vec<String>,
}

impl ValidationOutcome {
    /// A clean pass.
    #[must_use]
    pub fn pass() -> Self {
        Self {
            passed: true,
            issues: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// A failure with issues.
    #[must_use]
    pub fn fail(issues: Vec<ValidationIssue>) -> Self {
        Self {
            passed: false,
            issues,
            warnings: Vec::new(),
        }
    }
}

/// A validation stage.
#[async_trait]
pub trait Validator: Send + Sync {
    /// Stable name for reporting ("reference", "structure", ...).
    fn name(&self) -> &'static str;

    /// Validate the project rooted at `project_root`.
    async fn validate(&self, project_root: &Path) -> ValidationOutcome;
}

/// Run validators in order, collecting every outcome.
///
/// All validators run even after a failure so the self-heal loop sees the
/// complete picture.
pub async fn run_pipeline(
    validators: &[Box<dyn Validator>],
    project_root: &Path,
) -> Vec<(&'static str, ValidationOutcome)> {
    let mut outcomes = Vec::with_capacity(validators.len());
    for validator in validators {
        let outcome = validator.validate(project_root).await;
        tracing::info!(
            validator = validator.name(),
            passed = outcome.passed,
            issues = outcome.issues.len(),
            "validator finished"
        );
        outcomes.push((validator.name(), outcome));
    }
    outcomes
}

/// Whether every outcome in a pipeline run passed.
#[must_use]
pub fn all_passed(outcomes: &[(&'static str, ValidationOutcome)]) -> bool {
    outcomes.iter().all(|(_, o)| o.passed)
}
