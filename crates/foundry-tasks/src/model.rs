//! Subagent task and workflow plan types

use foundry_utils::error::ParseWarning;
use foundry_utils::types::WorkflowComplexity;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Role of a subagent task within a workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubagentTaskType {
    Scout,
    Builder,
    Validator,
    Architect,
}

/// A unit of work delegated to one LLM call.
///
/// `id` is unique within a workflow; `dependencies` must form a DAG (cycles
/// are reported by the scheduler, never silently executed).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubagentTask {
    /// Workflow-unique identifier
    pub id: String,
    /// What kind of subagent runs this task
    #[serde(rename = "type")]
    pub task_type: SubagentTaskType,
    /// Scoped objective text
    pub objective: String,
    /// Expected shape of the result ("markdown", "files", ...)
    #[serde(default)]
    pub output_format: String,
    /// Tools the subagent may use
    #[serde(default)]
    pub tools: Vec<String>,
    /// Source files or references in scope
    #[serde(default)]
    pub sources: Vec<String>,
    /// What the subagent must not touch
    #[serde(default)]
    pub boundaries: String,
    /// Priority; higher values route toward stronger models
    #[serde(default)]
    pub priority: i32,
    /// Ids of tasks that must complete first
    #[serde(default)]
    pub dependencies: Vec<String>,
}

impl SubagentTask {
    /// Minimal task constructor used by coordinators and tests.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        task_type: SubagentTaskType,
        objective: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            task_type,
            objective: objective.into(),
            output_format: String::new(),
            tools: Vec::new(),
            sources: Vec::new(),
            boundaries: String::new(),
            priority: 0,
            dependencies: Vec::new(),
        }
    }

    /// Add dependencies.
    #[must_use]
    pub fn with_dependencies(mut self, deps: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.dependencies = deps.into_iter().map(Into::into).collect();
        self
    }

    /// Set priority.
    #[must_use]
    pub const fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }
}

/// Result returned by one subagent execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubagentResult {
    pub task_id: String,
    pub task_type: SubagentTaskType,
    pub success: bool,
    /// Free-form findings for scout/validator tasks
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub findings: Option<String>,
    /// Files the subagent wrote, relative to the project root
    #[serde(default)]
    pub files_written: Vec<String>,
    /// Tokens consumed `(input, output)`
    #[serde(default)]
    pub token_usage: (u64, u64),
    /// Error description on failure
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Provider-specific or coordinator metadata
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl SubagentResult {
    /// A successful result for a task.
    #[must_use]
    pub fn success(task: &SubagentTask) -> Self {
        Self {
            task_id: task.id.clone(),
            task_type: task.task_type,
            success: true,
            findings: None,
            files_written: Vec::new(),
            token_usage: (0, 0),
            error: None,
            metadata: HashMap::new(),
        }
    }

    /// A failed result carrying an error message.
    #[must_use]
    pub fn failure(task: &SubagentTask, error: impl Into<String>) -> Self {
        Self {
            task_id: task.id.clone(),
            task_type: task.task_type,
            success: false,
            findings: None,
            files_written: Vec::new(),
            token_usage: (0, 0),
            error: Some(error.into()),
            metadata: HashMap::new(),
        }
    }
}

/// Structured plan produced by the lead orchestrator's planning call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowPlan {
    pub complexity: WorkflowComplexity,
    #[serde(default)]
    pub scout_tasks: Vec<SubagentTask>,
    #[serde(default)]
    pub architect_strategy: String,
    #[serde(default)]
    pub builder_tasks: Vec<SubagentTask>,
    #[serde(default)]
    pub validation_tasks: Vec<SubagentTask>,
    #[serde(default)]
    pub parallelization_strategy: String,
}

impl WorkflowPlan {
    /// Parse a plan from LLM output, tolerating a wrapping fenced code block.
    ///
    /// # Errors
    /// Returns a `ParseWarning` describing the failure; callers fall back to
    /// a single-task plan.
    pub fn from_llm_output(raw: &str) -> Result<Self, ParseWarning> {
        let stripped = strip_code_fence(raw);
        serde_json::from_str(stripped).map_err(|e| {
            ParseWarning::new("workflow-plan", format!("plan JSON did not parse: {e}"))
        })
    }
}

/// Remove a wrapping ```/```json fence, if present.
#[must_use]
pub fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the language hint line
    let rest = match rest.find('\n') {
        Some(idx) => &rest[idx + 1..],
        None => return trimmed,
    };
    rest.strip_suffix("```").map_or(trimmed, str::trim)
}
