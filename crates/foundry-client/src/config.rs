//! Per-phase provider/model configuration

use foundry_providers::ProviderRegistry;
use foundry_utils::error::ConfigIssue;
use foundry_utils::types::PhaseKind;
use serde::{Deserialize, Serialize};

/// A `(provider, model)` pair for one phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseConfig {
    pub provider: String,
    pub model: String,
}

impl PhaseConfig {
    #[must_use]
    pub fn new(provider: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            model: model.into(),
        }
    }

    /// Read the `BUILDER_TASK_{n}_PROVIDER` / `BUILDER_TASK_{n}_MODEL`
    /// override for a builder task. Both variables must be set.
    #[must_use]
    pub fn builder_task_override(task_num: usize) -> Option<Self> {
        let provider = std::env::var(format!("BUILDER_TASK_{task_num}_PROVIDER")).ok()?;
        let model = std::env::var(format!("BUILDER_TASK_{task_num}_MODEL")).ok()?;
        if provider.is_empty() || model.is_empty() {
            return None;
        }
        Some(Self { provider, model })
    }
}

/// Configuration for all three phases.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseConfigs {
    pub scout: PhaseConfig,
    pub architect: PhaseConfig,
    pub builder: PhaseConfig,
}

impl PhaseConfigs {
    /// Same provider and model for every phase.
    #[must_use]
    pub fn uniform(provider: &str, model: &str) -> Self {
        Self {
            scout: PhaseConfig::new(provider, model),
            architect: PhaseConfig::new(provider, model),
            builder: PhaseConfig::new(provider, model),
        }
    }

    /// Layer `SCOUT_PROVIDER`/`SCOUT_MODEL` (and architect/builder
    /// equivalents) over a base configuration.
    #[must_use]
    pub fn from_env(base: Self) -> Self {
        fn layer(phase: &str, base: PhaseConfig) -> PhaseConfig {
            let provider = std::env::var(format!("{phase}_PROVIDER"))
                .ok()
                .filter(|v| !v.is_empty())
                .unwrap_or(base.provider);
            let model = std::env::var(format!("{phase}_MODEL"))
                .ok()
                .filter(|v| !v.is_empty())
                .unwrap_or(base.model);
            PhaseConfig { provider, model }
        }

        Self {
            scout: layer("SCOUT", base.scout),
            architect: layer("ARCHITECT", base.architect),
            builder: layer("BUILDER", base.builder),
        }
    }

    /// The configuration for one phase.
    #[must_use]
    pub fn for_phase(&self, phase: PhaseKind) -> &PhaseConfig {
        match phase {
            PhaseKind::Scout => &self.scout,
            PhaseKind::Architect => &self.architect,
            PhaseKind::Builder => &self.builder,
        }
    }

    /// Validate every pair against the registry.
    ///
    /// # Errors
    /// Returns the first failing pair's issue.
    pub fn validate(&self, registry: &ProviderRegistry) -> Result<(), ConfigIssue> {
        for phase in PhaseKind::all() {
            let config = self.for_phase(phase);
            registry.validate_config(&config.provider, &config.model)?;
        }
        Ok(())
    }
}

impl Default for PhaseConfigs {
    fn default() -> Self {
        Self {
            scout: PhaseConfig::new("anthropic", "claude-haiku-4-5"),
            architect: PhaseConfig::new("anthropic", "claude-opus-4-1"),
            builder: PhaseConfig::new("anthropic", "claude-sonnet-4-5"),
        }
    }
}
