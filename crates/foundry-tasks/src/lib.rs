//! Task model and scheduling
//!
//! Defines the subagent task vocabulary shared by the lead orchestrator and
//! the parallel coordinators, the forgiving `TASKS.md` grammar, and the
//! dependency-level scheduler with auto-scaled worker counts.

mod grammar;
mod graph;
mod model;

pub use grammar::{ParsedTask, ParsedTaskList, parse_tasks};
pub use graph::{LevelSchedule, auto_scale_workers, topological_levels};
pub use model::{
    SubagentResult, SubagentTask, SubagentTaskType, WorkflowPlan, strip_code_fence,
};
