//! Per-session context tracking and compaction
//!
//! Tracks token usage against the model window, scores tracked content, and
//! compacts when usage crosses the compaction threshold. Critical items
//! (importance ≥ 0.85) survive every compaction.

use crate::compactor::Compactor;
use crate::item::{ContentItem, ContentType};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use foundry_utils::atomic_write::{write_json_atomic, write_text_atomic};
use foundry_utils::paths::ensure_dir_all;
use foundry_utils::types::Role;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use tracing::{info, warn};

/// Default context window in tokens.
pub const DEFAULT_CONTEXT_WINDOW: u64 = 200_000;

/// Usage fraction at which compaction is requested.
pub const COMPACTION_THRESHOLD: f64 = 0.40;

/// Usage fraction at which the situation is critical.
pub const CRITICAL_THRESHOLD_PCT: f64 = 0.70;

/// Usage fraction the fallback compactor aims for.
pub const COMPACTION_TARGET: f64 = 0.25;

/// Checkpoint cadence in messages.
const CHECKPOINT_EVERY: u64 = 5;

/// Point-in-time usage metrics, computed on demand.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextMetrics {
    /// Tokens currently tracked
    pub total_tokens: u64,
    /// `total_tokens / context_window * 100`
    pub context_percentage: f64,
    /// Messages tracked so far
    pub message_count: u64,
    /// Compactions performed
    pub compaction_count: u64,
    /// Tokens reclaimed by the last compaction
    pub last_compaction_tokens: u64,
    /// When these metrics were computed
    pub timestamp: DateTime<Utc>,
}

/// Why compaction is being requested.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CompactionTrigger {
    /// Usage crossed the compaction threshold
    Recommended { percentage: f64 },
    /// Usage crossed the critical threshold; compact before the next call
    Critical { percentage: f64 },
}

/// Result of a compaction pass, for reporting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompactionReport {
    pub tokens_before: u64,
    pub tokens_after: u64,
    pub items_before: usize,
    pub items_after: usize,
    pub used_smart_compactor: bool,
}

/// Serialized snapshot written by [`ContextManager::checkpoint`].
#[derive(Debug, Serialize, Deserialize)]
struct Snapshot {
    session_id: String,
    context_window: u64,
    total_tokens: u64,
    message_count: u64,
    compaction_count: u64,
    last_compaction_tokens: u64,
    items: Vec<ContentItem>,
    metrics_history: Vec<ContextMetrics>,
    saved_at: DateTime<Utc>,
}

/// Pointer file naming the most recent checkpoint.
#[derive(Debug, Serialize, Deserialize)]
struct LatestPointer {
    path: String,
    saved_at: DateTime<Utc>,
}

/// Tracks one session's context usage.
pub struct ContextManager {
    session_id: String,
    context_window: u64,
    total_tokens: u64,
    message_count: u64,
    compaction_count: u64,
    last_compaction_tokens: u64,
    items: Vec<ContentItem>,
    metrics_history: Vec<ContextMetrics>,
    checkpoint_dir: PathBuf,
}

impl ContextManager {
    /// Create a manager for a session with the default window.
    #[must_use]
    pub fn new(session_id: impl Into<String>) -> Self {
        Self::with_window(session_id, DEFAULT_CONTEXT_WINDOW)
    }

    /// Create a manager with an explicit context window.
    #[must_use]
    pub fn with_window(session_id: impl Into<String>, context_window: u64) -> Self {
        let session_id = session_id.into();
        let checkpoint_dir = foundry_utils::paths::context_checkpoint_dir(&session_id);
        Self {
            session_id,
            context_window: context_window.max(1),
            total_tokens: 0,
            message_count: 0,
            compaction_count: 0,
            last_compaction_tokens: 0,
            items: Vec::new(),
            metrics_history: Vec::new(),
            checkpoint_dir,
        }
    }

    /// Redirect checkpoints (used by tests).
    #[must_use]
    pub fn with_checkpoint_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.checkpoint_dir = dir.into();
        self
    }

    /// Record one prompt/response exchange.
    ///
    /// Appends a user item and an assistant item, accumulates totals, and
    /// auto-checkpoints every few messages. Returns current metrics.
    pub fn track(
        &mut self,
        prompt: &str,
        response: &str,
        input_tokens: u64,
        output_tokens: u64,
        content_type: ContentType,
    ) -> ContextMetrics {
        self.items.push(ContentItem::new(
            prompt,
            Role::User,
            input_tokens,
            content_type,
        ));
        self.items.push(ContentItem::new(
            response,
            Role::Assistant,
            output_tokens,
            content_type,
        ));

        self.total_tokens += input_tokens + output_tokens;
        self.message_count += 2;

        if self.message_count % CHECKPOINT_EVERY == 0 {
            if let Err(e) = self.checkpoint() {
                warn!(error = %e, "auto-checkpoint failed");
            }
        }

        let metrics = self.metrics();
        self.metrics_history.push(metrics.clone());
        metrics
    }

    /// Current metrics, computed on demand.
    #[must_use]
    pub fn metrics(&self) -> ContextMetrics {
        ContextMetrics {
            total_tokens: self.total_tokens,
            context_percentage: self.total_tokens as f64 / self.context_window as f64 * 100.0,
            message_count: self.message_count,
            compaction_count: self.compaction_count,
            last_compaction_tokens: self.last_compaction_tokens,
            timestamp: Utc::now(),
        }
    }

    /// Items currently tracked.
    #[must_use]
    pub fn items(&self) -> &[ContentItem] {
        &self.items
    }

    /// Whether usage calls for compaction, and how urgently.
    #[must_use]
    pub fn should_compact(&self) -> Option<CompactionTrigger> {
        let fraction = self.total_tokens as f64 / self.context_window as f64;
        let percentage = fraction * 100.0;
        if fraction >= CRITICAL_THRESHOLD_PCT {
            Some(CompactionTrigger::Critical { percentage })
        } else if fraction >= COMPACTION_THRESHOLD {
            Some(CompactionTrigger::Recommended { percentage })
        } else {
            None
        }
    }

    /// Compact tracked content.
    ///
    /// With a compactor, delegates to it (critical items plus an LLM summary
    /// come back). Without one, falls back to greedy selection by descending
    /// importance until the token target, keeping critical items
    /// unconditionally. Updates counters, writes a summary artifact, and
    /// checkpoints.
    ///
    /// # Errors
    /// Propagates compactor failures; the fallback path only fails on
    /// checkpoint IO.
    pub async fn compact(&mut self, compactor: Option<&dyn Compactor>) -> Result<CompactionReport> {
        let tokens_before = self.total_tokens;
        let items_before = self.items.len();
        let metrics = self.metrics();

        let (retained, used_smart, summary_text) = match compactor {
            Some(compactor) => {
                let outcome = compactor.compact(&self.items, &metrics).await?;
                (outcome.retained_items, true, Some(outcome.summary))
            }
            None => (self.priority_fallback(), false, None),
        };

        self.items = retained;
        let tokens_after: u64 = self.items.iter().map(|i| i.token_estimate).sum();
        // A summary can in principle exceed what it replaced; never report
        // growth as reclaimed tokens.
        let tokens_after = tokens_after.min(tokens_before);
        self.total_tokens = tokens_after;
        self.compaction_count += 1;
        self.last_compaction_tokens = tokens_before - tokens_after;

        info!(
            session = %self.session_id,
            tokens_before,
            tokens_after,
            reclaimed = self.last_compaction_tokens,
            used_smart,
            "context compacted"
        );

        self.write_compaction_summary(tokens_before, tokens_after, summary_text.as_deref())?;
        self.checkpoint()?;

        Ok(CompactionReport {
            tokens_before,
            tokens_after,
            items_before,
            items_after: self.items.len(),
            used_smart_compactor: used_smart,
        })
    }

    /// Greedy fallback: keep items by descending importance until the token
    /// target, then keep any remaining critical items regardless.
    fn priority_fallback(&self) -> Vec<ContentItem> {
        let target = (self.context_window as f64 * COMPACTION_TARGET) as u64;

        let mut order: Vec<usize> = (0..self.items.len()).collect();
        order.sort_by(|&a, &b| {
            self.items[b]
                .importance_score
                .partial_cmp(&self.items[a].importance_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let mut kept = vec![false; self.items.len()];
        let mut token_sum = 0u64;
        for &idx in &order {
            let item = &self.items[idx];
            if token_sum < target || item.is_critical() {
                kept[idx] = true;
                token_sum += item.token_estimate;
            }
        }

        // Preserve original chronological order of the survivors
        self.items
            .iter()
            .zip(kept)
            .filter_map(|(item, keep)| keep.then(|| item.clone()))
            .collect()
    }

    fn write_compaction_summary(
        &self,
        before: u64,
        after: u64,
        summary: Option<&str>,
    ) -> Result<()> {
        let path = self
            .checkpoint_dir
            .join(format!("compaction_{:03}.md", self.compaction_count));
        let mut body = format!(
            "# Compaction {}\n\nSession: {}\nTokens: {} -> {} (reclaimed {})\nItems retained: {}\n",
            self.compaction_count,
            self.session_id,
            before,
            after,
            before - after,
            self.items.len(),
        );
        if let Some(summary) = summary {
            body.push_str("\n## Summary\n\n");
            body.push_str(summary);
            body.push('\n');
        }
        write_text_atomic(&path, &body).context("failed to write compaction summary")
    }

    /// Write a snapshot and update the `latest.json` pointer.
    ///
    /// # Errors
    /// Returns an error on IO failure.
    pub fn checkpoint(&self) -> Result<PathBuf> {
        ensure_dir_all(&self.checkpoint_dir).context("failed to create checkpoint dir")?;

        let snapshot = Snapshot {
            session_id: self.session_id.clone(),
            context_window: self.context_window,
            total_tokens: self.total_tokens,
            message_count: self.message_count,
            compaction_count: self.compaction_count,
            last_compaction_tokens: self.last_compaction_tokens,
            items: self.items.clone(),
            metrics_history: self.metrics_history.clone(),
            saved_at: Utc::now(),
        };

        let path = self.checkpoint_dir.join(format!(
            "context_{}.json",
            snapshot.saved_at.format("%Y%m%d_%H%M%S%.3f")
        ));
        write_json_atomic(&path, &snapshot)?;

        let pointer = LatestPointer {
            path: path.display().to_string(),
            saved_at: snapshot.saved_at,
        };
        write_json_atomic(&self.checkpoint_dir.join("latest.json"), &pointer)?;

        Ok(path)
    }

    /// Replace in-memory state with a snapshot.
    ///
    /// With `None`, follows the `latest.json` pointer. Returns `false` when
    /// no snapshot exists or it cannot be read.
    pub fn restore(&mut self, path: Option<&std::path::Path>) -> bool {
        let resolved: PathBuf = match path {
            Some(p) => p.to_path_buf(),
            None => {
                let pointer_path = self.checkpoint_dir.join("latest.json");
                let Ok(raw) = fs::read_to_string(&pointer_path) else {
                    return false;
                };
                let Ok(pointer) = serde_json::from_str::<LatestPointer>(&raw) else {
                    return false;
                };
                PathBuf::from(pointer.path)
            }
        };

        let Ok(raw) = fs::read_to_string(&resolved) else {
            return false;
        };
        let Ok(snapshot) = serde_json::from_str::<Snapshot>(&raw) else {
            return false;
        };

        self.session_id = snapshot.session_id;
        self.context_window = snapshot.context_window;
        self.total_tokens = snapshot.total_tokens;
        self.message_count = snapshot.message_count;
        self.compaction_count = snapshot.compaction_count;
        self.last_compaction_tokens = snapshot.last_compaction_tokens;
        self.items = snapshot.items;
        self.metrics_history = snapshot.metrics_history;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::CRITICAL_THRESHOLD;
    use tempfile::TempDir;

    fn manager(dir: &TempDir) -> ContextManager {
        ContextManager::with_window("test-session", 1_000)
            .with_checkpoint_dir(dir.path().join("ctx"))
    }

    #[test]
    fn test_track_accumulates_and_reports() {
        let dir = TempDir::new().unwrap();
        let mut mgr = manager(&dir);
        let metrics = mgr.track("q", "a", 100, 50, ContentType::General);
        assert_eq!(metrics.total_tokens, 150);
        assert_eq!(metrics.message_count, 2);
        assert!((metrics.context_percentage - 15.0).abs() < 1e-9);
        assert_eq!(mgr.items().len(), 2);
    }

    #[test]
    fn test_should_compact_thresholds() {
        let dir = TempDir::new().unwrap();
        let mut mgr = manager(&dir);
        assert!(mgr.should_compact().is_none());

        let _ = mgr.track("q", "a", 300, 150, ContentType::General);
        match mgr.should_compact() {
            Some(CompactionTrigger::Recommended { percentage }) => {
                assert!((percentage - 45.0).abs() < 1e-9);
            }
            other => panic!("expected Recommended, got {other:?}"),
        }

        let _ = mgr.track("q", "a", 200, 100, ContentType::General);
        assert!(matches!(
            mgr.should_compact(),
            Some(CompactionTrigger::Critical { .. })
        ));
    }

    #[tokio::test]
    async fn test_fallback_compaction_preserves_critical_and_shrinks() {
        let dir = TempDir::new().unwrap();
        let mut mgr = manager(&dir);

        // Decision content scores critical; general chatter does not
        let _ = mgr.track(
            "choose db",
            "decision: we must use sqlite",
            50,
            50,
            ContentType::Decision,
        );
        for _ in 0..5 {
            let _ = mgr.track("chatter", "noise", 80, 80, ContentType::General);
        }
        let before = mgr.metrics().total_tokens;
        let critical_count = mgr.items().iter().filter(|i| i.is_critical()).count();
        assert!(critical_count > 0);

        let report = mgr.compact(None).await.unwrap();
        assert!(report.tokens_after <= before);
        assert_eq!(report.tokens_after, mgr.metrics().total_tokens);
        assert_eq!(mgr.metrics().compaction_count, 1);

        let critical_after = mgr.items().iter().filter(|i| i.is_critical()).count();
        assert_eq!(critical_count, critical_after);

        // Summary artifact was written
        let summary = dir.path().join("ctx/compaction_001.md");
        assert!(summary.exists());
    }

    #[tokio::test]
    async fn test_smart_compaction_retains_summary() {
        use crate::compactor::{SmartCompactor, SummaryModel};
        use async_trait::async_trait;
        use std::sync::Arc;

        struct Stub;
        #[async_trait]
        impl SummaryModel for Stub {
            async fn summarize(&self, _t: &str, _m: u32) -> Result<String> {
                Ok("condensed".to_string())
            }
        }

        let dir = TempDir::new().unwrap();
        let mut mgr = manager(&dir);
        for _ in 0..4 {
            let _ = mgr.track("q", "a", 100, 100, ContentType::General);
        }

        let compactor = SmartCompactor::new(Arc::new(Stub));
        let report = mgr.compact(Some(&compactor)).await.unwrap();
        assert!(report.used_smart_compactor);
        assert!(mgr
            .items()
            .iter()
            .any(|i| i.content_type == ContentType::Summary
                && i.importance_score >= CRITICAL_THRESHOLD));
    }

    #[test]
    fn test_checkpoint_and_restore_roundtrip() {
        let dir = TempDir::new().unwrap();
        let mut mgr = manager(&dir);
        let _ = mgr.track("q", "a", 123, 45, ContentType::Code);
        mgr.checkpoint().unwrap();

        let mut restored = ContextManager::with_window("other", 999)
            .with_checkpoint_dir(dir.path().join("ctx"));
        assert!(restored.restore(None));
        assert_eq!(restored.metrics().total_tokens, 168);
        assert_eq!(restored.items().len(), 2);
    }

    #[test]
    fn test_restore_missing_returns_false() {
        let dir = TempDir::new().unwrap();
        let mut mgr = manager(&dir);
        assert!(!mgr.restore(None));
        assert!(!mgr.restore(Some(std::path::Path::new("/nonexistent.json"))));
    }
}
