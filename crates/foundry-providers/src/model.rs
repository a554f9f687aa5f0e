//! Model descriptors and pricing rows

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Provider-scoped model descriptor.
///
/// `(provider, name)` is unique within the registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Model {
    /// API identifier (e.g. "claude-sonnet-4-5")
    pub name: String,
    /// Human-readable name for listings
    pub display_name: String,
    /// Context window in tokens (positive)
    pub context_window: u64,
    /// Whether the model accepts image inputs
    pub supports_vision: bool,
    /// Whether the provider supports streaming for this model
    pub supports_streaming: bool,
    /// One-line description
    pub description: String,
}

impl Model {
    /// Create a model descriptor.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        display_name: impl Into<String>,
        context_window: u64,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            display_name: display_name.into(),
            context_window,
            supports_vision: false,
            supports_streaming: true,
            description: description.into(),
        }
    }

    /// Mark the model as vision-capable.
    #[must_use]
    pub const fn with_vision(mut self) -> Self {
        self.supports_vision = true;
        self
    }
}

/// Pricing row for a `(provider, model)` pair.
///
/// Consulted for cost estimates only, never on the request path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelPricing {
    /// Dollars per 1M input tokens
    pub input_cost_per_1m: f64,
    /// Dollars per 1M output tokens
    pub output_cost_per_1m: f64,
    /// Context window in tokens
    pub context_window: u64,
    /// When this row was last refreshed
    pub updated_at: DateTime<Utc>,
}

impl ModelPricing {
    /// Create a pricing row stamped now.
    #[must_use]
    pub fn new(input_cost_per_1m: f64, output_cost_per_1m: f64, context_window: u64) -> Self {
        Self {
            input_cost_per_1m,
            output_cost_per_1m,
            context_window,
            updated_at: Utc::now(),
        }
    }

    /// Dollar cost of a call with the given token counts.
    #[must_use]
    pub fn cost(&self, input_tokens: u64, output_tokens: u64) -> f64 {
        (input_tokens as f64 / 1_000_000.0) * self.input_cost_per_1m
            + (output_tokens as f64 / 1_000_000.0) * self.output_cost_per_1m
    }
}
