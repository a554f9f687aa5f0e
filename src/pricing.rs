//! Pricing database
//!
//! Embedded pricing rows per `(provider, model)`, falling back to each
//! provider's own `fallback_pricing()` when a pair has no row. Consulted for
//! estimates and reporting only; never on the request path.

use chrono::{Duration, Utc};
use foundry_providers::{ModelPricing, ProviderRegistry};
use std::collections::HashMap;
use tracing::debug;

/// Days after which pricing rows are considered stale when
/// `PRICING_AUTO_UPDATE` is on.
pub const DEFAULT_UPDATE_DAYS: i64 = 30;

/// Pricing lookup across all providers.
pub struct PricingDatabase {
    rows: HashMap<(String, String), ModelPricing>,
}

impl PricingDatabase {
    /// Build the database from every registered provider's fallback table.
    #[must_use]
    pub fn from_registry(registry: &ProviderRegistry) -> Self {
        let mut rows = HashMap::new();
        for provider in registry.providers() {
            for (model, pricing) in provider.fallback_pricing() {
                rows.insert((provider.name().to_string(), model), pricing);
            }
        }
        debug!(rows = rows.len(), "pricing database assembled");
        Self { rows }
    }

    /// Pricing for a `(provider, model)` pair.
    #[must_use]
    pub fn get(&self, provider: &str, model: &str) -> Option<&ModelPricing> {
        self.rows.get(&(provider.to_string(), model.to_string()))
    }

    /// Estimated dollar cost for a call; `None` when no pricing is known.
    #[must_use]
    pub fn estimate(
        &self,
        provider: &str,
        model: &str,
        input_tokens: u64,
        output_tokens: u64,
    ) -> Option<f64> {
        self.get(provider, model)
            .map(|p| p.cost(input_tokens, output_tokens))
    }

    /// All rows, sorted by provider then model, for listings.
    #[must_use]
    pub fn rows_sorted(&self) -> Vec<(&str, &str, &ModelPricing)> {
        let mut rows: Vec<_> = self
            .rows
            .iter()
            .map(|((provider, model), pricing)| (provider.as_str(), model.as_str(), pricing))
            .collect();
        rows.sort_by(|a, b| (a.0, a.1).cmp(&(b.0, b.1)));
        rows
    }

    /// Whether any row is older than the configured update window. The
    /// refresh itself is external; this only reports staleness when
    /// `PRICING_AUTO_UPDATE` is enabled.
    #[must_use]
    pub fn needs_update(&self) -> bool {
        let auto = std::env::var("PRICING_AUTO_UPDATE")
            .map(|v| !matches!(v.to_lowercase().as_str(), "" | "0" | "false" | "no"))
            .unwrap_or(false);
        if !auto {
            return false;
        }
        let days = std::env::var("PRICING_UPDATE_DAYS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_UPDATE_DAYS);
        let cutoff = Utc::now() - Duration::days(days);
        self.rows.values().any(|p| p.updated_at < cutoff)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn database() -> PricingDatabase {
        PricingDatabase::from_registry(&ProviderRegistry::with_default_providers())
    }

    #[test]
    fn test_every_catalog_model_has_pricing() {
        let registry = ProviderRegistry::with_default_providers();
        let db = PricingDatabase::from_registry(&registry);
        for provider in registry.providers() {
            for model in provider.available_models() {
                assert!(
                    db.get(provider.name(), &model.name).is_some(),
                    "no pricing for {}/{}",
                    provider.name(),
                    model.name
                );
            }
        }
    }

    #[test]
    fn test_estimate_math() {
        let db = database();
        // Anthropic Sonnet: $3/M in, $15/M out
        let cost = db
            .estimate("anthropic", "claude-sonnet-4-5", 1_000_000, 1_000_000)
            .unwrap();
        assert!((cost - 18.0).abs() < 1e-9);
    }

    #[test]
    fn test_unknown_pair_estimates_none() {
        let db = database();
        assert!(db.estimate("anthropic", "made-up-model", 100, 100).is_none());
        assert!(db.estimate("no-provider", "gpt-4o", 100, 100).is_none());
    }

    #[test]
    fn test_rows_sorted_stable() {
        let db = database();
        let rows = db.rows_sorted();
        assert!(!rows.is_empty());
        for pair in rows.windows(2) {
            assert!((pair[0].0, pair[0].1) <= (pair[1].0, pair[1].1));
        }
    }
}
