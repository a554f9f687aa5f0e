//! Judge scoring and fix-task synthesis
//!
//! On validation failure, an LLM judge scores the artifacts against the
//! requirements on five criteria. Criteria scoring under 0.7 become targeted
//! fix tasks: priority 0 (most urgent) under 0.5, priority 1 otherwise. A
//! runtime stderr, when present, always prepends a priority-0 fix task
//! naming the exact error.

use foundry_tasks::{SubagentTask, SubagentTaskType, strip_code_fence};
use foundry_utils::error::ParseWarning;
use serde::{Deserialize, Serialize};

/// Score threshold under which a criterion needs a fix task.
pub const FIX_THRESHOLD: f64 = 0.7;

/// Score threshold under which a fix task is most urgent.
pub const URGENT_THRESHOLD: f64 = 0.5;

/// One criterion's judgment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CriterionScore {
    /// Score in [0, 1]
    pub score: f64,
    /// Concrete problems the judge saw
    #[serde(default)]
    pub issues: Vec<String>,
}

/// The judge's full assessment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JudgeScores {
    #[serde(default)]
    pub functionality: CriterionScore,
    #[serde(default)]
    pub completeness: CriterionScore,
    #[serde(default)]
    pub code_quality: CriterionScore,
    #[serde(default)]
    pub test_coverage: CriterionScore,
    #[serde(default)]
    pub documentation: CriterionScore,
}

impl JudgeScores {
    /// Parse judge output, tolerating a wrapping code fence.
    ///
    /// # Errors
    /// Returns a `ParseWarning`; the heal loop then retries with a generic
    /// fix task instead of criterion-targeted ones.
    pub fn from_llm_output(raw: &str) -> Result<Self, ParseWarning> {
        serde_json::from_str(strip_code_fence(raw))
            .map_err(|e| ParseWarning::new("judge-scores", format!("judge JSON did not parse: {e}")))
    }

    /// Criteria in fixed order with their names.
    #[must_use]
    pub fn criteria(&self) -> [(&'static str, &CriterionScore); 5] {
        [
            ("functionality", &self.functionality),
            ("completeness", &self.completeness),
            ("code_quality", &self.code_quality),
            ("test_coverage", &self.test_coverage),
            ("documentation", &self.documentation),
        ]
    }

    /// Criteria scoring under [`FIX_THRESHOLD`].
    #[must_use]
    pub fn failing_criteria(&self) -> Vec<(&'static str, &CriterionScore)> {
        self.criteria()
            .into_iter()
            .filter(|(_, c)| c.score < FIX_THRESHOLD)
            .collect()
    }
}

/// Build fix tasks from judge scores and optional runtime stderr, sorted by
/// ascending priority (lower is more urgent).
#[must_use]
pub fn synthesize_fix_tasks(
    scores: &JudgeScores,
    runtime_stderr: Option<&str>,
    attempt: u32,
) -> Vec<SubagentTask> {
    let mut tasks = Vec::new();

    if let Some(stderr) = runtime_stderr.filter(|s| !s.trim().is_empty()) {
        tasks.push(
            SubagentTask::new(
                format!("heal_{attempt}_runtime"),
                SubagentTaskType::Builder,
                format!(
                    "Fix the runtime error observed when starting the generated project. \
                     Exact error output:\n{stderr}"
                ),
            )
            .with_priority(0),
        );
    }

    for (name, criterion) in scores.failing_criteria() {
        let priority = if criterion.score < URGENT_THRESHOLD { 0 } else { 1 };
        let issue_list = if criterion.issues.is_empty() {
            String::from("no specific issues were listed; review the criterion end to end")
        } else {
            criterion.issues.join("; ")
        };
        tasks.push(
            SubagentTask::new(
                format!("heal_{attempt}_{name}"),
                SubagentTaskType::Builder,
                format!(
                    "Improve {name} (scored {:.2}). Address: {issue_list}",
                    criterion.score
                ),
            )
            .with_priority(priority),
        );
    }

    tasks.sort_by_key(|t| t.priority);
    tasks
}
