//! Orchestration runtime
//!
//! The phase orchestrator drives Scout → Architect → Builder for one
//! session. In multi-agent mode the lead orchestrator plans a workflow of
//! subagent tasks, and the parallel coordinators execute them with bounded
//! concurrency over a dependency DAG. The self-healing loop closes the
//! cycle: validate, judge, synthesize fixes, rebuild.

mod builder_pool;
mod heal;
mod lead;
mod phase;
mod prompts;
mod scout_pool;
mod summary;

pub use builder_pool::{BuilderCoordinator, PhaseOutcome};
pub use heal::{HealReport, SelfHealingLoop};
pub use lead::{CompressedFindings, LeadOrchestrator};
pub use phase::{
    ApprovalGate, AutoApprove, PhaseOrchestrator, WorkflowOptions, WorkflowResult,
};
pub use prompts::{
    architect_prompt, builder_task_prompt, scout_prompt, split_architect_output,
    subagent_builder_prompt,
};
pub use scout_pool::{SCOUT_MAX_WORKERS, ScoutCoordinator};
pub use summary::ClientSummaryModel;
