//! Session cost tracking
//!
//! Subscribes to the unified client's call records and aggregates token
//! usage and dollar cost per phase and per provider. Cache hits count toward
//! token usage (the context they occupy is real) but are billed at zero.

use crate::pricing::PricingDatabase;
use foundry_client::{CallRecord, CostRecorder};
use foundry_utils::types::PhaseKind;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Mutex;

/// Aggregated usage for one bucket (phase or provider).
#[derive(Debug, Clone, Default, Serialize)]
pub struct UsageBucket {
    pub calls: u64,
    pub cached_calls: u64,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cost_usd: f64,
}

/// Session cost summary.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CostSummary {
    pub by_phase: BTreeMap<String, UsageBucket>,
    pub by_provider: BTreeMap<String, UsageBucket>,
    pub total: UsageBucket,
}

/// Accumulates call records into a cost summary.
pub struct CostTracker {
    pricing: PricingDatabase,
    records: Mutex<Vec<CallRecord>>,
}

impl CostTracker {
    #[must_use]
    pub fn new(pricing: PricingDatabase) -> Self {
        Self {
            pricing,
            records: Mutex::new(Vec::new()),
        }
    }

    /// Dollar cost of one record; cached calls cost nothing.
    fn cost_of(&self, record: &CallRecord) -> f64 {
        if record.cached {
            return 0.0;
        }
        self.pricing
            .estimate(
                &record.provider,
                &record.model,
                record.input_tokens,
                record.output_tokens,
            )
            .unwrap_or(0.0)
    }

    /// Current summary across all recorded calls.
    #[must_use]
    pub fn summary(&self) -> CostSummary {
        let records = self.records.lock().expect("cost records poisoned");
        let mut summary = CostSummary::default();

        for record in records.iter() {
            let cost = self.cost_of(record);
            for bucket in [
                summary
                    .by_phase
                    .entry(record.phase.as_str().to_string())
                    .or_default(),
                summary
                    .by_provider
                    .entry(record.provider.clone())
                    .or_default(),
                &mut summary.total,
            ] {
                bucket.calls += 1;
                if record.cached {
                    bucket.cached_calls += 1;
                }
                bucket.input_tokens += record.input_tokens;
                bucket.output_tokens += record.output_tokens;
                bucket.cost_usd += cost;
            }
        }
        summary
    }

    /// Usage for one phase.
    #[must_use]
    pub fn phase_usage(&self, phase: PhaseKind) -> UsageBucket {
        self.summary()
            .by_phase
            .remove(phase.as_str())
            .unwrap_or_default()
    }
}

impl CostRecorder for CostTracker {
    fn record(&self, record: &CallRecord) {
        self.records
            .lock()
            .expect("cost records poisoned")
            .push(record.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use foundry_providers::ProviderRegistry;

    fn tracker() -> CostTracker {
        CostTracker::new(PricingDatabase::from_registry(
            &ProviderRegistry::with_default_providers(),
        ))
    }

    fn record(phase: PhaseKind, cached: bool) -> CallRecord {
        CallRecord {
            phase,
            provider: "anthropic".to_string(),
            model: "claude-sonnet-4-5".to_string(),
            input_tokens: 1_000_000,
            output_tokens: 0,
            cached,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_cost_aggregation_by_phase_and_provider() {
        let tracker = tracker();
        tracker.record(&record(PhaseKind::Scout, false));
        tracker.record(&record(PhaseKind::Builder, false));

        let summary = tracker.summary();
        assert_eq!(summary.total.calls, 2);
        // $3/M input for sonnet, two calls of 1M input
        assert!((summary.total.cost_usd - 6.0).abs() < 1e-9);
        assert!((summary.by_phase["scout"].cost_usd - 3.0).abs() < 1e-9);
        assert_eq!(summary.by_provider["anthropic"].calls, 2);
    }

    #[test]
    fn test_cached_calls_count_usage_but_not_cost() {
        let tracker = tracker();
        tracker.record(&record(PhaseKind::Scout, false));
        tracker.record(&record(PhaseKind::Scout, true));

        let usage = tracker.phase_usage(PhaseKind::Scout);
        assert_eq!(usage.calls, 2);
        assert_eq!(usage.cached_calls, 1);
        assert_eq!(usage.input_tokens, 2_000_000);
        // Only the uncached call is billed
        assert!((usage.cost_usd - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_unknown_model_costs_zero() {
        let tracker = tracker();
        let mut rec = record(PhaseKind::Architect, false);
        rec.model = "mystery-model".to_string();
        tracker.record(&rec);
        assert_eq!(tracker.summary().total.cost_usd, 0.0);
    }
}
