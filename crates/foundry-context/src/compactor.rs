//! Intelligent compaction via an LLM summary
//!
//! The smart compactor partitions tracked items into critical and
//! compactable, renders the compactable subset as a transcript, and asks the
//! model for a structured summary under a bounded output budget. The summary
//! comes back as a single high-importance item alongside every critical item.

use crate::item::{ContentItem, ContentType};
use crate::manager::ContextMetrics;
use anyhow::{Context, Result};
use async_trait::async_trait;
use foundry_utils::types::Role;
use std::sync::Arc;
use tracing::info;

/// Minimal LLM surface the compactor needs. The unified client implements
/// this; tests supply a stub.
#[async_trait]
pub trait SummaryModel: Send + Sync {
    /// Summarize a transcript within `max_tokens` output tokens.
    async fn summarize(&self, transcript: &str, max_tokens: u32) -> Result<String>;
}

/// Result of a compaction pass.
#[derive(Debug, Clone)]
pub struct CompactionOutcome {
    /// Items to keep: every critical item plus one summary item
    pub retained_items: Vec<ContentItem>,
    /// Estimated token total after compaction
    pub estimated_tokens: u64,
    /// The generated summary text
    pub summary: String,
}

/// Strategy interface for [`crate::ContextManager::compact`].
#[async_trait]
pub trait Compactor: Send + Sync {
    /// Compact the given items in light of current metrics.
    async fn compact(
        &self,
        items: &[ContentItem],
        metrics: &ContextMetrics,
    ) -> Result<CompactionOutcome>;
}

/// LLM-backed compactor preserving decisions, patterns, errors, and progress.
pub struct SmartCompactor {
    model: Arc<dyn SummaryModel>,
    max_summary_tokens: u32,
}

impl SmartCompactor {
    /// Default output budget for the summary call.
    pub const DEFAULT_SUMMARY_TOKENS: u32 = 4_000;

    #[must_use]
    pub fn new(model: Arc<dyn SummaryModel>) -> Self {
        Self {
            model,
            max_summary_tokens: Self::DEFAULT_SUMMARY_TOKENS,
        }
    }

    /// Override the summary output budget (advisory floor of 500).
    #[must_use]
    pub fn with_max_summary_tokens(mut self, max_tokens: u32) -> Self {
        self.max_summary_tokens = max_tokens.max(500);
        self
    }

    /// Render compactable items as a transcript for the summary prompt.
    fn render_transcript(items: &[ContentItem]) -> String {
        let mut transcript = String::new();
        for item in items {
            let speaker = match item.role {
                Role::User => "USER",
                Role::Assistant => "ASSISTANT",
                Role::System => "SYSTEM",
            };
            transcript.push_str(&format!(
                "[{speaker} | {:?} | ~{} tokens]\n{}\n\n",
                item.content_type, item.token_estimate, item.content
            ));
        }
        transcript
    }

    fn summary_prompt(transcript: &str) -> String {
        format!(
            "Summarize this development session transcript. Preserve, with \
             specifics: architecture decisions, established patterns, the \
             current task context, critical errors and their resolutions, \
             implementation approaches, and overall progress. Omit \
             pleasantries and dead ends.\n\nTRANSCRIPT:\n{transcript}"
        )
    }
}

#[async_trait]
impl Compactor for SmartCompactor {
    async fn compact(
        &self,
        items: &[ContentItem],
        metrics: &ContextMetrics,
    ) -> Result<CompactionOutcome> {
        let (critical, compactable): (Vec<_>, Vec<_>) =
            items.iter().cloned().partition(ContentItem::is_critical);

        info!(
            critical = critical.len(),
            compactable = compactable.len(),
            total_tokens = metrics.total_tokens,
            "smart compaction"
        );

        let transcript = Self::render_transcript(&compactable);
        let summary = self
            .model
            .summarize(&Self::summary_prompt(&transcript), self.max_summary_tokens)
            .await
            .context("summary model call failed")?;

        let summary_tokens = (summary.chars().count() as u64).div_ceil(4);
        let mut summary_item =
            ContentItem::new(summary.clone(), Role::Assistant, summary_tokens, ContentType::Summary);
        // Summaries must outrank the critical threshold so they persist
        // through subsequent compactions.
        summary_item.importance_score = 0.95;

        let mut retained_items = critical;
        retained_items.push(summary_item);
        let estimated_tokens = retained_items.iter().map(|i| i.token_estimate).sum();

        Ok(CompactionOutcome {
            retained_items,
            estimated_tokens,
            summary,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::CRITICAL_THRESHOLD;

    struct StubModel;

    #[async_trait]
    impl SummaryModel for StubModel {
        async fn summarize(&self, _transcript: &str, _max_tokens: u32) -> Result<String> {
            Ok("Decisions: use sqlite. Progress: 3/5 tasks done.".to_string())
        }
    }

    fn metrics() -> ContextMetrics {
        ContextMetrics {
            total_tokens: 100_000,
            context_percentage: 50.0,
            message_count: 10,
            compaction_count: 0,
            last_compaction_tokens: 0,
            timestamp: chrono::Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_critical_items_always_retained() {
        let items = vec![
            ContentItem::new("we must use postgres", Role::Assistant, 50, ContentType::Decision),
            ContentItem::new("chatter", Role::User, 500, ContentType::General),
            ContentItem::new("more chatter", Role::User, 500, ContentType::General),
        ];
        let critical_before: Vec<_> = items.iter().filter(|i| i.is_critical()).cloned().collect();
        assert!(!critical_before.is_empty());

        let compactor = SmartCompactor::new(Arc::new(StubModel));
        let outcome = compactor.compact(&items, &metrics()).await.unwrap();

        for item in &critical_before {
            assert!(
                outcome
                    .retained_items
                    .iter()
                    .any(|r| r.content == item.content),
                "critical item dropped"
            );
        }
    }

    #[tokio::test]
    async fn test_summary_item_appended_with_high_importance() {
        let items = vec![ContentItem::new("x", Role::User, 10, ContentType::General)];
        let compactor = SmartCompactor::new(Arc::new(StubModel));
        let outcome = compactor.compact(&items, &metrics()).await.unwrap();

        let summary = outcome
            .retained_items
            .iter()
            .find(|i| i.content_type == ContentType::Summary)
            .expect("no summary item");
        assert!(summary.importance_score >= CRITICAL_THRESHOLD);
        assert!(summary.content.contains("sqlite"));
    }

    #[test]
    fn test_transcript_rendering_includes_roles() {
        let items = vec![
            ContentItem::new("question", Role::User, 5, ContentType::General),
            ContentItem::new("answer", Role::Assistant, 5, ContentType::Code),
        ];
        let transcript = SmartCompactor::render_transcript(&items);
        assert!(transcript.contains("USER"));
        assert!(transcript.contains("ASSISTANT"));
        assert!(transcript.contains("question"));
    }

    #[test]
    fn test_summary_budget_floor() {
        let compactor = SmartCompactor::new(Arc::new(StubModel)).with_max_summary_tokens(10);
        assert_eq!(compactor.max_summary_tokens, 500);
    }
}
