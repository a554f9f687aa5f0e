//! LLM provider backends and registry
//!
//! Every provider implements the [`Provider`] trait, letting the unified
//! client route a phase call to any backend without knowing transport
//! details. Providers register into an explicit [`ProviderRegistry`] at
//! startup; providers without credentials stay listed but report
//! `is_configured() == false`, and [`ProviderRegistry::validate_config`]
//! rejects them for actual use.

mod anthropic;
mod cloudflare;
mod gemini;
mod http;
mod model;
mod openai_compat;
mod registry;

pub use anthropic::AnthropicProvider;
pub use cloudflare::CloudflareProvider;
pub use gemini::GeminiProvider;
pub use http::HttpClient;
pub use model::{Model, ModelPricing};
pub use openai_compat::OpenAiCompatProvider;
pub use registry::ProviderRegistry;

use async_trait::async_trait;
use foundry_utils::error::ProviderError;
use foundry_utils::types::{Message, ProviderResponse};
use std::collections::HashMap;
use std::time::Duration;

/// Default per-call timeout. Planning and build calls can run for minutes.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(300);

/// Capability surface every LLM provider exposes.
///
/// `call` is blocking from the caller's perspective: it does not return until
/// the provider has produced a complete response or failed. Providers must
/// tolerate concurrent calls.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Stable identifier used in configuration ("anthropic", "openai", ...)
    fn name(&self) -> &'static str;

    /// Human-readable name for listings
    fn display_name(&self) -> &'static str;

    /// Environment variable holding this provider's credential
    fn credential_env(&self) -> &'static str;

    /// Whether a credential is present in the environment.
    fn is_configured(&self) -> bool {
        std::env::var(self.credential_env()).is_ok_and(|v| !v.is_empty())
    }

    /// Models this provider can serve.
    fn available_models(&self) -> Vec<Model>;

    /// Whether `name` is a model this provider can serve.
    fn validate_model(&self, name: &str) -> bool {
        self.available_models().iter().any(|m| m.name == name)
    }

    /// Invoke the model with an ordered conversation.
    ///
    /// # Errors
    /// Returns `ProviderError`; transient variants have already been retried
    /// by the HTTP layer, so callers treat any error as final.
    async fn call(
        &self,
        messages: &[Message],
        model: &str,
        max_tokens: u32,
        temperature: f32,
    ) -> Result<ProviderResponse, ProviderError>;

    /// Pricing rows used when the pricing database has no entry.
    fn fallback_pricing(&self) -> HashMap<String, ModelPricing>;
}

/// Read an API key from the environment at call time.
///
/// Keys are never stored in provider structs so that a key exported after
/// registry construction is still picked up.
pub(crate) fn api_key_from_env(
    provider: &str,
    credential_env: &str,
) -> Result<String, ProviderError> {
    std::env::var(credential_env)
        .ok()
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ProviderError::Auth {
            provider: provider.to_string(),
            reason: format!("credential environment variable {credential_env} is not set"),
        })
}

/// Rough token estimate for providers that do not report usage.
///
/// Four characters per token is the conventional approximation; exact counts
/// arrive from providers that report usage.
#[must_use]
pub(crate) fn estimate_tokens(text: &str) -> u64 {
    (text.chars().count() as u64).div_ceil(4)
}
