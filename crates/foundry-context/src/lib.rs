//! Session context management
//!
//! Tracks token usage per session, scores tracked content by importance,
//! and compacts low-priority content — via an LLM summary when a smart
//! compactor is attached, or a greedy priority fallback otherwise — to keep
//! usage under the model window. State snapshots to disk for resume.

mod compactor;
mod item;
mod manager;

pub use compactor::{CompactionOutcome, Compactor, SmartCompactor, SummaryModel};
pub use item::{CRITICAL_THRESHOLD, ContentItem, ContentType, score_importance};
pub use manager::{
    COMPACTION_TARGET, COMPACTION_THRESHOLD, CRITICAL_THRESHOLD_PCT, CompactionReport,
    CompactionTrigger, ContextManager, ContextMetrics, DEFAULT_CONTEXT_WINDOW,
};
