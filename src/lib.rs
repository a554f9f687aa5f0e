//! context-foundry - A spec-first code-generation pipeline driven by LLMs
//!
//! A user supplies a project name and a natural-language task; the pipeline
//! produces a working repository by running three phases - Scout (research),
//! Architect (planning), Builder (implementation) - each delegated to LLM
//! calls whose outputs are parsed into artifacts.

pub mod cli;
pub mod config;
pub mod cost;
pub mod pricing;
pub mod session_log;

// Core components re-exported for external consumers
pub use foundry_blueprint::{BlueprintKind, BlueprintStore, Checkpoint, CheckpointStore};
pub use foundry_cache::{CacheEntry, CacheStats, ResponseCache};
pub use foundry_client::{CallRecord, CostRecorder, PhaseConfig, PhaseConfigs, UnifiedClient};
pub use foundry_context::{ContextManager, ContextMetrics, SmartCompactor};
pub use foundry_extraction::ArtifactExtractor;
pub use foundry_orchestrator::{
    BuilderCoordinator, LeadOrchestrator, PhaseOrchestrator, ScoutCoordinator, SelfHealingLoop,
    WorkflowOptions, WorkflowResult,
};
pub use foundry_providers::{Model, ModelPricing, Provider, ProviderRegistry};
pub use foundry_router::ModelRouter;
pub use foundry_state::BuildStateTracker;
pub use foundry_tasks::{SubagentResult, SubagentTask, WorkflowPlan};
pub use foundry_utils::error::FoundryError;
pub use foundry_utils::types::*;
pub use foundry_validation::{
    BuildValidator, JudgeScores, ReferenceValidator, RuntimeValidator, StructureValidator,
    Validator,
};
