//! Call observation for cost tracking and session logs

use chrono::{DateTime, Utc};
use foundry_utils::types::PhaseKind;
use serde::{Deserialize, Serialize};

/// One completed LLM interaction, as seen by the client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallRecord {
    /// Phase the call belonged to
    pub phase: PhaseKind,
    /// Provider that was addressed
    pub provider: String,
    /// Model that served (or originally served, for cache hits) the call
    pub model: String,
    /// Input tokens
    pub input_tokens: u64,
    /// Output tokens
    pub output_tokens: u64,
    /// Whether the response came from the cache
    pub cached: bool,
    /// When the interaction completed
    pub timestamp: DateTime<Utc>,
}

/// Sink for [`CallRecord`]s. The cost tracker and the session JSONL log both
/// implement this; implementations must be cheap and non-blocking since they
/// run on the call path.
pub trait CostRecorder: Send + Sync {
    fn record(&self, record: &CallRecord);
}
