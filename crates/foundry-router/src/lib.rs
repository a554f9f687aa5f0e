//! Intelligent model routing
//!
//! Scores each task on a 0–10 complexity scale and picks between a default
//! model and a complex model. Routing is deterministic: identical task
//! attributes always produce the same score and the same choice. Every
//! decision is recorded for later reporting.

use foundry_utils::types::{PhaseKind, WorkflowComplexity};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Mutex;
use tracing::debug;

/// Default score threshold at which the complex model is chosen.
pub const DEFAULT_THRESHOLD: u32 = 7;

/// Maximum contribution of keyword matches to the score.
const KEYWORD_CAP: u32 = 4;

/// Closed set of terms that signal complex work in a task objective.
const COMPLEX_KEYWORDS: &[&str] = &[
    "architecture",
    "algorithm",
    "security",
    "schema",
    "distributed",
    "optimize",
    "refactor",
    "migration",
    "protocol",
    "concurrency",
    "authentication",
    "encryption",
    "scalability",
];

/// Attributes of a task being routed.
#[derive(Debug, Clone, Default)]
pub struct TaskAttributes<'a> {
    /// Phase the call belongs to, when known
    pub phase: Option<PhaseKind>,
    /// Task objective text, scanned for complexity keywords
    pub objective: &'a str,
    /// Builder task priority, when the call carries one
    pub priority: Option<i32>,
    /// Complexity of the surrounding workflow plan
    pub workflow_complexity: Option<WorkflowComplexity>,
    /// Whether the task has declared dependencies
    pub has_dependencies: bool,
    /// Whether the task touches large files
    pub large_files: bool,
}

/// Outcome of one routing decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingDecision {
    /// Model to use for this call
    pub model: String,
    /// Computed complexity score
    pub score: u32,
    /// Keywords that contributed to the score
    pub matched_keywords: Vec<String>,
    /// Whether the complex model was selected
    pub used_complex: bool,
}

/// Aggregate report across all decisions made by a router.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingReport {
    /// Total decisions made
    pub decisions: usize,
    /// Decision count per model
    pub per_model: BTreeMap<String, usize>,
    /// Mean score across decisions
    pub average_score: f64,
}

/// Scores task complexity and picks default vs. complex model.
#[derive(Debug)]
pub struct ModelRouter {
    default_model: String,
    complex_model: String,
    threshold: u32,
    decisions: Mutex<Vec<RoutingDecision>>,
}

impl ModelRouter {
    /// Create a router with an explicit threshold.
    #[must_use]
    pub fn new(
        default_model: impl Into<String>,
        complex_model: impl Into<String>,
        threshold: u32,
    ) -> Self {
        Self {
            default_model: default_model.into(),
            complex_model: complex_model.into(),
            threshold,
            decisions: Mutex::new(Vec::new()),
        }
    }

    /// Build a router from `MODEL_DEFAULT`, `MODEL_COMPLEX`, and
    /// `COMPLEXITY_THRESHOLD`. Returns `None` when either model variable is
    /// absent or `MODEL_ROUTING_ENABLED` is explicitly off.
    #[must_use]
    pub fn from_env() -> Option<Self> {
        let enabled = std::env::var("MODEL_ROUTING_ENABLED")
            .map(|v| !matches!(v.to_lowercase().as_str(), "0" | "false" | "no"))
            .unwrap_or(true);
        if !enabled {
            return None;
        }

        let default_model = std::env::var("MODEL_DEFAULT").ok()?;
        let complex_model = std::env::var("MODEL_COMPLEX").ok()?;
        let threshold = std::env::var("COMPLEXITY_THRESHOLD")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_THRESHOLD);

        Some(Self::new(default_model, complex_model, threshold))
    }

    /// Compute the complexity score and matched keywords for a task.
    ///
    /// Pure: does not record a decision.
    #[must_use]
    pub fn score(attrs: &TaskAttributes<'_>) -> (u32, Vec<String>) {
        let mut score = 0u32;

        if attrs.phase == Some(PhaseKind::Architect) {
            score += 3;
        }

        if attrs.phase == Some(PhaseKind::Builder) {
            if let Some(priority) = attrs.priority {
                if priority >= 8 {
                    score += 2;
                    if priority >= 9 {
                        score += 2;
                    } else {
                        score += 1;
                    }
                }
            }
        }

        let objective = attrs.objective.to_lowercase();
        let mut matched = Vec::new();
        let mut keyword_score = 0u32;
        for keyword in COMPLEX_KEYWORDS {
            if objective.contains(keyword) {
                matched.push((*keyword).to_string());
                if keyword_score < KEYWORD_CAP {
                    keyword_score += 2;
                }
            }
        }
        score += keyword_score.min(KEYWORD_CAP);

        match attrs.workflow_complexity {
            Some(WorkflowComplexity::Complex) => score += 3,
            Some(WorkflowComplexity::Medium) => score += 1,
            _ => {}
        }

        if attrs.has_dependencies {
            score += 1;
        }
        if attrs.large_files {
            score += 1;
        }

        (score, matched)
    }

    /// Route a task: score it, pick a model, and record the decision.
    #[must_use]
    pub fn route(&self, attrs: &TaskAttributes<'_>) -> RoutingDecision {
        let (score, matched_keywords) = Self::score(attrs);
        let used_complex = score >= self.threshold;
        let model = if used_complex {
            self.complex_model.clone()
        } else {
            self.default_model.clone()
        };

        debug!(
            score,
            threshold = self.threshold,
            model = %model,
            keywords = ?matched_keywords,
            "routing decision"
        );

        let decision = RoutingDecision {
            model,
            score,
            matched_keywords,
            used_complex,
        };

        self.decisions
            .lock()
            .expect("router decision log poisoned")
            .push(decision.clone());
        decision
    }

    /// The model used when the score is below the threshold.
    #[must_use]
    pub fn default_model(&self) -> &str {
        &self.default_model
    }

    /// The model used when the score reaches the threshold.
    #[must_use]
    pub fn complex_model(&self) -> &str {
        &self.complex_model
    }

    /// Summarize every decision made so far.
    #[must_use]
    pub fn report(&self) -> RoutingReport {
        let decisions = self.decisions.lock().expect("router decision log poisoned");
        let mut per_model: BTreeMap<String, usize> = BTreeMap::new();
        let mut total_score = 0u64;
        for d in decisions.iter() {
            *per_model.entry(d.model.clone()).or_default() += 1;
            total_score += u64::from(d.score);
        }
        let average_score = if decisions.is_empty() {
            0.0
        } else {
            total_score as f64 / decisions.len() as f64
        };
        RoutingReport {
            decisions: decisions.len(),
            per_model,
            average_score,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn router() -> ModelRouter {
        ModelRouter::new("default-model", "complex-model", DEFAULT_THRESHOLD)
    }

    #[test]
    fn test_architect_complex_workflow_routes_to_complex_model() {
        // "Design system architecture and optimize schema": architecture,
        // optimize, schema match but cap at +4; architect +3; Complex +3.
        let attrs = TaskAttributes {
            phase: Some(PhaseKind::Architect),
            objective: "Design system architecture and optimize schema",
            workflow_complexity: Some(WorkflowComplexity::Complex),
            ..Default::default()
        };
        let (score, matched) = ModelRouter::score(&attrs);
        assert!(score >= 7, "score was {score}");
        assert!(matched.len() >= 3);

        let decision = router().route(&attrs);
        assert!(decision.used_complex);
        assert_eq!(decision.model, "complex-model");
    }

    #[test]
    fn test_trivial_builder_task_routes_to_default_model() {
        let attrs = TaskAttributes {
            phase: Some(PhaseKind::Builder),
            objective: "Add a log statement",
            priority: Some(1),
            ..Default::default()
        };
        let decision = router().route(&attrs);
        assert_eq!(decision.score, 0);
        assert!(!decision.used_complex);
        assert_eq!(decision.model, "default-model");
    }

    #[test]
    fn test_builder_priority_bumps() {
        let base = TaskAttributes {
            phase: Some(PhaseKind::Builder),
            objective: "",
            ..Default::default()
        };

        let mut p7 = base.clone();
        p7.priority = Some(7);
        assert_eq!(ModelRouter::score(&p7).0, 0);

        let mut p8 = base.clone();
        p8.priority = Some(8);
        assert_eq!(ModelRouter::score(&p8).0, 3);

        let mut p9 = base;
        p9.priority = Some(9);
        assert_eq!(ModelRouter::score(&p9).0, 4);
    }

    #[test]
    fn test_keyword_contribution_capped() {
        let attrs = TaskAttributes {
            objective: "security protocol migration refactor distributed algorithm",
            ..Default::default()
        };
        let (score, matched) = ModelRouter::score(&attrs);
        assert_eq!(score, 4);
        assert!(matched.len() >= 5);
    }

    #[test]
    fn test_context_flags_add_one_each() {
        let attrs = TaskAttributes {
            objective: "",
            has_dependencies: true,
            large_files: true,
            ..Default::default()
        };
        assert_eq!(ModelRouter::score(&attrs).0, 2);
    }

    #[test]
    fn test_routing_is_deterministic() {
        let attrs = TaskAttributes {
            phase: Some(PhaseKind::Architect),
            objective: "refactor the schema",
            workflow_complexity: Some(WorkflowComplexity::Medium),
            ..Default::default()
        };
        let r = router();
        let d1 = r.route(&attrs);
        let d2 = r.route(&attrs);
        assert_eq!(d1.model, d2.model);
        assert_eq!(d1.score, d2.score);
    }

    #[test]
    fn test_report_aggregates() {
        let r = router();
        let simple = TaskAttributes {
            objective: "tweak copy",
            ..Default::default()
        };
        let complex = TaskAttributes {
            phase: Some(PhaseKind::Architect),
            objective: "distributed security architecture",
            workflow_complexity: Some(WorkflowComplexity::Complex),
            ..Default::default()
        };
        let _ = r.route(&simple);
        let _ = r.route(&complex);

        let report = r.report();
        assert_eq!(report.decisions, 2);
        assert_eq!(report.per_model.get("default-model"), Some(&1));
        assert_eq!(report.per_model.get("complex-model"), Some(&1));
        assert!(report.average_score > 0.0);
    }
}
