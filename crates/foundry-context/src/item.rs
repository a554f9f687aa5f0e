//! Tracked content items and importance scoring

use chrono::{DateTime, Utc};
use foundry_utils::types::Role;
use serde::{Deserialize, Serialize};

/// Importance threshold above which an item is critical and must survive
/// every compaction.
pub const CRITICAL_THRESHOLD: f64 = 0.85;

/// Classification of tracked content, driving the base importance score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Decision,
    Pattern,
    Error,
    Code,
    Summary,
    General,
}

impl ContentType {
    /// Base importance for this content type.
    #[must_use]
    pub const fn base_score(&self) -> f64 {
        match self {
            Self::Decision => 0.9,
            Self::Error => 0.85,
            Self::Pattern => 0.8,
            Self::Summary => 0.75,
            Self::Code => 0.7,
            Self::General => 0.5,
        }
    }
}

/// Terms that boost an item's importance when present.
const BOOST_KEYWORDS: &[&str] = &["critical", "must", "important", "security", "breaking"];

/// A unit of context tracked for a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentItem {
    /// The tracked text
    pub content: String,
    /// Which side of the conversation produced it
    pub role: Role,
    /// Importance in [0, 1]; assigned once at insertion
    pub importance_score: f64,
    /// Estimated tokens this item occupies
    pub token_estimate: u64,
    /// When the item was tracked
    pub timestamp: DateTime<Utc>,
    /// Content classification
    pub content_type: ContentType,
}

impl ContentItem {
    /// Create an item, computing its importance score from the content.
    #[must_use]
    pub fn new(
        content: impl Into<String>,
        role: Role,
        token_estimate: u64,
        content_type: ContentType,
    ) -> Self {
        let content = content.into();
        let importance_score = score_importance(&content, content_type);
        Self {
            content,
            role,
            importance_score,
            token_estimate,
            timestamp: Utc::now(),
            content_type,
        }
    }

    /// Whether this item must survive compaction.
    #[must_use]
    pub fn is_critical(&self) -> bool {
        self.importance_score >= CRITICAL_THRESHOLD
    }
}

/// Compute an importance score: base by content type, keyword boosts, length
/// penalty, clamped to [0, 1].
#[must_use]
pub fn score_importance(content: &str, content_type: ContentType) -> f64 {
    let mut score = content_type.base_score();

    let lowered = content.to_lowercase();
    for keyword in BOOST_KEYWORDS {
        if lowered.contains(keyword) {
            score += 0.05;
        }
    }

    // Very long items are cheaper to re-derive than to carry verbatim
    let len = content.chars().count();
    if len > 5_000 {
        score -= 0.2;
    } else if len > 2_000 {
        score -= 0.1;
    }

    score.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_scores_ordered() {
        assert!(ContentType::Decision.base_score() > ContentType::Pattern.base_score());
        assert!(ContentType::Pattern.base_score() > ContentType::General.base_score());
    }

    #[test]
    fn test_decision_is_critical_by_default() {
        let item = ContentItem::new("we will use sqlite", Role::Assistant, 10, ContentType::Decision);
        assert!(item.is_critical());
    }

    #[test]
    fn test_keyword_boost_raises_score() {
        let plain = score_importance("ordinary note", ContentType::General);
        let boosted = score_importance("this is critical and important", ContentType::General);
        assert!(boosted > plain);
    }

    #[test]
    fn test_length_penalty_lowers_score() {
        let short = score_importance("x", ContentType::Code);
        let long = score_importance(&"y".repeat(6_000), ContentType::Code);
        assert!(long < short);
    }

    #[test]
    fn test_score_clamped_to_unit_interval() {
        let maxed = score_importance(
            "critical must important security breaking",
            ContentType::Decision,
        );
        assert!(maxed <= 1.0);
        let floored = score_importance(&"z".repeat(10_000), ContentType::General);
        assert!(floored >= 0.0);
    }
}
