//! Lead orchestrator (multi-agent planning)
//!
//! Asks the planning model for a structured workflow plan and parses it. The
//! lead performs no execution itself; coordinators consume the plan. After
//! scouting, the lead compresses concatenated findings into a bounded
//! summary so downstream prompts stay small.

use foundry_client::UnifiedClient;
use foundry_tasks::{SubagentResult, SubagentTask, SubagentTaskType, WorkflowPlan};
use foundry_utils::error::{FoundryError, ParseWarning};
use foundry_utils::types::{PhaseKind, WorkflowComplexity};
use std::sync::Arc;
use tracing::{info, warn};

/// Target size for compressed findings, in tokens.
pub const FINDINGS_SUMMARY_TOKENS: u64 = 2_000;

/// Compressed scout findings with compression metadata.
#[derive(Debug, Clone)]
pub struct CompressedFindings {
    /// The summary fed to downstream phases
    pub summary: String,
    /// The concatenated raw findings
    pub raw: String,
    /// `compressed_tokens / original_tokens`
    pub ratio: f64,
    pub original_tokens: u64,
    pub compressed_tokens: u64,
}

/// Plans multi-agent workflows.
pub struct LeadOrchestrator {
    client: Arc<UnifiedClient>,
}

impl LeadOrchestrator {
    #[must_use]
    pub fn new(client: Arc<UnifiedClient>) -> Self {
        Self { client }
    }

    /// Ask the planning model to decompose a request into subagent tasks.
    ///
    /// An unparseable plan degrades to a single-builder fallback plan with a
    /// recorded warning rather than failing the workflow.
    ///
    /// # Errors
    /// Propagates provider failures from the planning call itself.
    pub async fn plan_workflow(
        &self,
        user_request: &str,
        project_context: &str,
    ) -> Result<(WorkflowPlan, Vec<ParseWarning>), FoundryError> {
        let prompt = planning_prompt(user_request, project_context);
        let response = self.client.call_detached(PhaseKind::Architect, &prompt, None).await?;

        match WorkflowPlan::from_llm_output(&response.content) {
            Ok(plan) => {
                info!(
                    complexity = plan.complexity.as_str(),
                    scouts = plan.scout_tasks.len(),
                    builders = plan.builder_tasks.len(),
                    validators = plan.validation_tasks.len(),
                    "workflow plan parsed"
                );
                Ok((plan, Vec::new()))
            }
            Err(warning) => {
                warn!(warning = %warning.message, "falling back to single-task plan");
                Ok((fallback_plan(user_request), vec![warning]))
            }
        }
    }

    /// Concatenate scout findings and compress them to roughly
    /// [`FINDINGS_SUMMARY_TOKENS`] tokens.
    ///
    /// # Errors
    /// Propagates provider failures from the summary call.
    pub async fn compress_findings(
        &self,
        results: &[SubagentResult],
    ) -> Result<CompressedFindings, FoundryError> {
        let raw: String = results
            .iter()
            .filter(|r| r.success)
            .filter_map(|r| r.findings.as_deref())
            .collect::<Vec<_>>()
            .join("\n\n---\n\n");

        let original_tokens = estimate_tokens(&raw);
        if original_tokens <= FINDINGS_SUMMARY_TOKENS {
            // Already under budget; compression would only lose detail
            return Ok(CompressedFindings {
                summary: raw.clone(),
                compressed_tokens: original_tokens,
                ratio: 1.0,
                original_tokens,
                raw,
            });
        }

        let prompt = format!(
            "Compress these research findings into at most {FINDINGS_SUMMARY_TOKENS} tokens. \
             Keep concrete facts: component names, file paths, constraints, and risks. \
             Drop repetition and hedging.\n\nFINDINGS:\n{raw}"
        );
        let response = self.client.call_detached(PhaseKind::Scout, &prompt, None).await?;

        let compressed_tokens = estimate_tokens(&response.content);
        let ratio = if original_tokens == 0 {
            1.0
        } else {
            compressed_tokens as f64 / original_tokens as f64
        };
        info!(original_tokens, compressed_tokens, ratio, "scout findings compressed");

        Ok(CompressedFindings {
            summary: response.content,
            raw,
            ratio,
            original_tokens,
            compressed_tokens,
        })
    }
}

fn planning_prompt(user_request: &str, project_context: &str) -> String {
    format!(
        "Decompose this software request into a parallel workflow plan.\n\n\
         REQUEST: {user_request}\n\nPROJECT CONTEXT:\n{project_context}\n\n\
         Respond with JSON only, matching this schema:\n\
         {{\n  \"complexity\": \"Simple|Medium|Complex\",\n\
           \"scout_tasks\": [{{\"id\", \"type\": \"scout\", \"objective\", \"sources\", \"priority\"}}],\n\
           \"architect_strategy\": \"...\",\n\
           \"builder_tasks\": [{{\"id\", \"type\": \"builder\", \"objective\", \"dependencies\", \"priority\"}}],\n\
           \"validation_tasks\": [{{\"id\", \"type\": \"validator\", \"objective\"}}],\n\
           \"parallelization_strategy\": \"...\"\n}}\n\
         Task ids must be unique; dependencies must reference task ids and form no cycles."
    )
}

/// Single-task plan used when the planning call produced unusable JSON.
fn fallback_plan(user_request: &str) -> WorkflowPlan {
    WorkflowPlan {
        complexity: WorkflowComplexity::Simple,
        scout_tasks: Vec::new(),
        architect_strategy: "direct implementation".to_string(),
        builder_tasks: vec![SubagentTask::new(
            "build_all",
            SubagentTaskType::Builder,
            format!("Implement the full request: {user_request}"),
        )],
        validation_tasks: Vec::new(),
        parallelization_strategy: "sequential".to_string(),
    }
}

fn estimate_tokens(text: &str) -> u64 {
    (text.chars().count() as u64).div_ceil(4)
}

#[cfg(test)]
mod tests {
    use super::*;
    use foundry_client::PhaseConfigs;
    use foundry_providers::{Model, ModelPricing, Provider, ProviderRegistry};
    use foundry_utils::error::ProviderError;
    use foundry_utils::types::{Message, ProviderResponse};
    use std::collections::HashMap;

    /// Returns a canned response chosen by markers in the prompt.
    struct PlannerStub {
        plan_json: &'static str,
    }

    #[async_trait::async_trait]
    impl Provider for PlannerStub {
        fn name(&self) -> &'static str {
            "planner"
        }
        fn display_name(&self) -> &'static str {
            "Planner"
        }
        fn credential_env(&self) -> &'static str {
            "PLANNER_KEY"
        }
        fn is_configured(&self) -> bool {
            true
        }
        fn available_models(&self) -> Vec<Model> {
            vec![Model::new("planner-1", "Planner", 100_000, "test")]
        }
        async fn call(
            &self,
            messages: &[Message],
            model: &str,
            _max_tokens: u32,
            _temperature: f32,
        ) -> Result<ProviderResponse, ProviderError> {
            let prompt = messages.last().map(|m| m.content.as_str()).unwrap_or("");
            let reply = if prompt.contains("Decompose") {
                self.plan_json.to_string()
            } else {
                "condensed findings".to_string()
            };
            Ok(ProviderResponse::new(reply, model, 50, 25))
        }
        fn fallback_pricing(&self) -> HashMap<String, ModelPricing> {
            HashMap::new()
        }
    }

    fn lead(plan_json: &'static str) -> LeadOrchestrator {
        let mut registry = ProviderRegistry::new();
        registry.register(Arc::new(PlannerStub { plan_json }));
        let client = Arc::new(
            UnifiedClient::new(
                Arc::new(registry),
                PhaseConfigs::uniform("planner", "planner-1"),
            )
            .unwrap(),
        );
        LeadOrchestrator::new(client)
    }

    const GOOD_PLAN: &str = r#"```json
{"complexity": "Complex",
 "scout_tasks": [{"id": "s1", "type": "scout", "objective": "survey"}],
 "architect_strategy": "layered",
 "builder_tasks": [
   {"id": "b1", "type": "builder", "objective": "backend"},
   {"id": "b2", "type": "builder", "objective": "frontend", "dependencies": ["b1"]}
 ],
 "validation_tasks": [],
 "parallelization_strategy": "levels"}
```"#;

    #[tokio::test]
    async fn test_plan_parsed_from_fenced_json() {
        let lead = lead(GOOD_PLAN);
        let (plan, warnings) = lead.plan_workflow("build an app", "empty repo").await.unwrap();
        assert!(warnings.is_empty());
        assert_eq!(plan.complexity, WorkflowComplexity::Complex);
        assert_eq!(plan.builder_tasks[1].dependencies, vec!["b1"]);
    }

    #[tokio::test]
    async fn test_unparseable_plan_falls_back_with_warning() {
        let lead = lead("Sorry, I can't produce JSON today.");
        let (plan, warnings) = lead.plan_workflow("build an app", "").await.unwrap();
        assert_eq!(warnings.len(), 1);
        assert_eq!(plan.builder_tasks.len(), 1);
        assert!(plan.builder_tasks[0].objective.contains("build an app"));
    }

    #[tokio::test]
    async fn test_small_findings_skip_compression() {
        let lead = lead(GOOD_PLAN);
        let task = SubagentTask::new("s1", SubagentTaskType::Scout, "o");
        let mut result = SubagentResult::success(&task);
        result.findings = Some("short".to_string());

        let compressed = lead.compress_findings(&[result]).await.unwrap();
        assert_eq!(compressed.summary, "short");
        assert!((compressed.ratio - 1.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_large_findings_compressed() {
        let lead = lead(GOOD_PLAN);
        let task = SubagentTask::new("s1", SubagentTaskType::Scout, "o");
        let mut result = SubagentResult::success(&task);
        result.findings = Some("detail ".repeat(5_000));

        let compressed = lead.compress_findings(&[result]).await.unwrap();
        assert_eq!(compressed.summary, "condensed findings");
        assert!(compressed.ratio < 1.0);
        assert!(compressed.original_tokens > FINDINGS_SUMMARY_TOKENS);
    }

    #[tokio::test]
    async fn test_failed_scouts_excluded_from_findings() {
        let lead = lead(GOOD_PLAN);
        let task = SubagentTask::new("s1", SubagentTaskType::Scout, "o");
        let failed = SubagentResult::failure(&task, "dead");
        let mut ok = SubagentResult::success(&task);
        ok.findings = Some("alive".to_string());

        let compressed = lead.compress_findings(&[failed, ok]).await.unwrap();
        assert_eq!(compressed.raw, "alive");
    }
}
