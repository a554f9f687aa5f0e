//! Provider registry
//!
//! The registry is built once at startup and read-mostly afterwards.
//! `(provider, model.name)` pairs are unique across the enumeration.

use crate::{
    AnthropicProvider, CloudflareProvider, GeminiProvider, OpenAiCompatProvider, Provider,
};
use foundry_utils::error::ConfigIssue;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Enumerates LLM providers and validates `(provider, model)` pairs.
pub struct ProviderRegistry {
    providers: BTreeMap<&'static str, Arc<dyn Provider>>,
}

impl ProviderRegistry {
    /// Empty registry; use [`Self::register`] to populate.
    #[must_use]
    pub fn new() -> Self {
        Self {
            providers: BTreeMap::new(),
        }
    }

    /// Registry with every built-in provider registered.
    #[must_use]
    pub fn with_default_providers() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(AnthropicProvider::new()));
        registry.register(Arc::new(OpenAiCompatProvider::openai()));
        registry.register(Arc::new(GeminiProvider::new()));
        registry.register(Arc::new(OpenAiCompatProvider::groq()));
        registry.register(Arc::new(OpenAiCompatProvider::mistral()));
        registry.register(Arc::new(OpenAiCompatProvider::fireworks()));
        registry.register(Arc::new(CloudflareProvider::new()));
        registry.register(Arc::new(OpenAiCompatProvider::github()));
        registry.register(Arc::new(OpenAiCompatProvider::zai()));
        registry
    }

    /// Register a provider. A later registration under the same name wins.
    pub fn register(&mut self, provider: Arc<dyn Provider>) {
        self.providers.insert(provider.name(), provider);
    }

    /// Look up a provider by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<dyn Provider>> {
        self.providers.get(name).cloned()
    }

    /// Names of all registered providers, sorted.
    #[must_use]
    pub fn provider_names(&self) -> Vec<&'static str> {
        self.providers.keys().copied().collect()
    }

    /// All registered providers, sorted by name.
    #[must_use]
    pub fn providers(&self) -> Vec<Arc<dyn Provider>> {
        self.providers.values().cloned().collect()
    }

    /// Providers that currently hold credentials.
    #[must_use]
    pub fn configured_providers(&self) -> Vec<Arc<dyn Provider>> {
        self.providers
            .values()
            .filter(|p| p.is_configured())
            .cloned()
            .collect()
    }

    /// Validate that `provider` exists, is configured, and serves `model`.
    ///
    /// # Errors
    /// - `ConfigIssue::UnknownProvider` when no provider has that name
    /// - `ConfigIssue::Unconfigured` when its credential is absent
    /// - `ConfigIssue::UnknownModel` when the model is not in its catalog
    pub fn validate_config(&self, provider: &str, model: &str) -> Result<(), ConfigIssue> {
        let p = self
            .get(provider)
            .ok_or_else(|| ConfigIssue::UnknownProvider(provider.to_string()))?;

        if !p.is_configured() {
            return Err(ConfigIssue::Unconfigured {
                provider: provider.to_string(),
                credential_env: p.credential_env().to_string(),
            });
        }

        if !p.validate_model(model) {
            return Err(ConfigIssue::UnknownModel {
                provider: provider.to_string(),
                model: model.to_string(),
            });
        }

        Ok(())
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::with_default_providers()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_default_registry_enumerates_all_providers() {
        let registry = ProviderRegistry::with_default_providers();
        let names = registry.provider_names();
        for expected in [
            "anthropic",
            "cloudflare",
            "fireworks",
            "gemini",
            "github",
            "groq",
            "mistral",
            "openai",
            "zai",
        ] {
            assert!(names.contains(&expected), "missing provider {expected}");
        }
    }

    #[test]
    fn test_unknown_provider_rejected() {
        let registry = ProviderRegistry::with_default_providers();
        let err = registry
            .validate_config("not-a-provider", "some-model")
            .unwrap_err();
        assert!(matches!(err, ConfigIssue::UnknownProvider(_)));
    }

    #[test]
    #[serial]
    fn test_unconfigured_provider_rejected() {
        // SAFETY: serialized test; variable removed before and restored never
        // (tests that need it set their own).
        unsafe {
            std::env::remove_var("ANTHROPIC_API_KEY");
        }
        let registry = ProviderRegistry::with_default_providers();
        let err = registry
            .validate_config("anthropic", "claude-sonnet-4-5")
            .unwrap_err();
        assert!(matches!(err, ConfigIssue::Unconfigured { .. }));
    }

    #[test]
    #[serial]
    fn test_unknown_model_rejected() {
        // SAFETY: serialized test; set then removed within this test.
        unsafe {
            std::env::set_var("ANTHROPIC_API_KEY", "test-key");
        }
        let registry = ProviderRegistry::with_default_providers();
        let err = registry
            .validate_config("anthropic", "not-a-model")
            .unwrap_err();
        assert!(matches!(err, ConfigIssue::UnknownModel { .. }));
        unsafe {
            std::env::remove_var("ANTHROPIC_API_KEY");
        }
    }

    #[test]
    #[serial]
    fn test_valid_pair_accepted() {
        // SAFETY: serialized test; set then removed within this test.
        unsafe {
            std::env::set_var("ANTHROPIC_API_KEY", "test-key");
        }
        let registry = ProviderRegistry::with_default_providers();
        assert!(registry
            .validate_config("anthropic", "claude-sonnet-4-5")
            .is_ok());
        unsafe {
            std::env::remove_var("ANTHROPIC_API_KEY");
        }
    }

    #[test]
    fn test_model_names_unique_within_provider() {
        let registry = ProviderRegistry::with_default_providers();
        for provider in registry.providers() {
            let models = provider.available_models();
            let mut names: Vec<_> = models.iter().map(|m| m.name.as_str()).collect();
            names.sort_unstable();
            let before = names.len();
            names.dedup();
            assert_eq!(before, names.len(), "duplicate model in {}", provider.name());
        }
    }
}
