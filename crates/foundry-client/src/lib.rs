//! Unified LLM client
//!
//! Routes each phase call to its configured provider, consulting the model
//! router, the response cache, and per-task environment overrides along the
//! way. Per-phase conversation histories are independent and resettable;
//! token totals and cache counters are updated atomically so concurrent
//! builder workers can share one client.

mod config;
mod record;

pub use config::{PhaseConfig, PhaseConfigs};
pub use record::{CallRecord, CostRecorder};

use chrono::Utc;
use foundry_cache::{CacheEntry, ResponseCache};
use foundry_providers::ProviderRegistry;
use foundry_router::{ModelRouter, TaskAttributes};
use foundry_utils::error::FoundryError;
use foundry_utils::types::{Message, PhaseKind, ProviderResponse};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

/// Default completion budget per call.
pub const DEFAULT_MAX_TOKENS: u32 = 8_192;

/// Default sampling temperature.
pub const DEFAULT_TEMPERATURE: f32 = 0.7;

/// Provider-agnostic client for the three pipeline phases.
pub struct UnifiedClient {
    registry: Arc<ProviderRegistry>,
    configs: PhaseConfigs,
    cache: Option<Arc<ResponseCache>>,
    router: Option<Arc<ModelRouter>>,
    recorder: Option<Arc<dyn CostRecorder>>,
    histories: Mutex<HashMap<PhaseKind, Vec<Message>>>,
    total_input_tokens: AtomicU64,
    total_output_tokens: AtomicU64,
    max_tokens: u32,
    temperature: f32,
}

impl std::fmt::Debug for UnifiedClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnifiedClient")
            .field("configs", &self.configs)
            .field("has_cache", &self.cache.is_some())
            .field("has_router", &self.router.is_some())
            .field("has_recorder", &self.recorder.is_some())
            .field(
                "total_input_tokens",
                &self.total_input_tokens.load(Ordering::Relaxed),
            )
            .field(
                "total_output_tokens",
                &self.total_output_tokens.load(Ordering::Relaxed),
            )
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .finish()
    }
}

impl UnifiedClient {
    /// Create a client, validating every phase's `(provider, model)` pair
    /// against the registry once.
    ///
    /// # Errors
    /// Returns `FoundryError::Config` naming the first invalid pair.
    pub fn new(registry: Arc<ProviderRegistry>, configs: PhaseConfigs) -> Result<Self, FoundryError> {
        configs.validate(&registry)?;
        Ok(Self {
            registry,
            configs,
            cache: None,
            router: None,
            recorder: None,
            histories: Mutex::new(HashMap::new()),
            total_input_tokens: AtomicU64::new(0),
            total_output_tokens: AtomicU64::new(0),
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
        })
    }

    /// Attach a response cache.
    #[must_use]
    pub fn with_cache(mut self, cache: Arc<ResponseCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Attach a model router.
    #[must_use]
    pub fn with_router(mut self, router: Arc<ModelRouter>) -> Self {
        self.router = Some(router);
        self
    }

    /// Attach a cost/observability sink.
    #[must_use]
    pub fn with_recorder(mut self, recorder: Arc<dyn CostRecorder>) -> Self {
        self.recorder = Some(recorder);
        self
    }

    /// Override generation parameters.
    #[must_use]
    pub fn with_generation_params(mut self, max_tokens: u32, temperature: f32) -> Self {
        self.max_tokens = max_tokens;
        self.temperature = temperature;
        self
    }

    /// Run a scout (research) call.
    ///
    /// # Errors
    /// Propagates configuration and provider failures.
    pub async fn scout(&self, prompt: &str) -> Result<ProviderResponse, FoundryError> {
        self.call_with_config(PhaseKind::Scout, prompt, None).await
    }

    /// Run an architect (planning) call.
    ///
    /// # Errors
    /// Propagates configuration and provider failures.
    pub async fn architect(&self, prompt: &str) -> Result<ProviderResponse, FoundryError> {
        self.call_with_config(PhaseKind::Architect, prompt, None).await
    }

    /// Run a builder (implementation) call, optionally for a numbered task
    /// so `BUILDER_TASK_{n}_PROVIDER` / `BUILDER_TASK_{n}_MODEL` overrides
    /// apply.
    ///
    /// # Errors
    /// Propagates configuration and provider failures.
    pub async fn builder(
        &self,
        prompt: &str,
        task_num: Option<usize>,
    ) -> Result<ProviderResponse, FoundryError> {
        self.call_with_config(PhaseKind::Builder, prompt, task_num).await
    }

    /// Core call path shared by all phases.
    ///
    /// Resolution order for the model: per-task override (bypasses routing),
    /// then router suggestion, then the phase's configured model. The cache
    /// key covers the resolved model, the prompt, and the history as it
    /// stood before this prompt.
    async fn call_with_config(
        &self,
        phase: PhaseKind,
        prompt: &str,
        task_num: Option<usize>,
    ) -> Result<ProviderResponse, FoundryError> {
        let base = self.configs.for_phase(phase);
        let (provider_name, model) = self.resolve_target(phase, prompt, task_num, base);

        // History as of before this prompt; the key must not include the
        // prompt twice.
        let prior_history = {
            let histories = self.histories.lock().expect("history lock poisoned");
            histories.get(&phase).cloned().unwrap_or_default()
        };

        let cache_key = self.cache.as_ref().and_then(|_| {
            match ResponseCache::cache_key(&model, prompt, &prior_history) {
                Ok(key) => Some(key),
                Err(e) => {
                    warn!(error = %e, "cache key computation failed; skipping cache");
                    None
                }
            }
        });

        self.append_history(phase, Message::user(prompt));

        if let (Some(cache), Some(key)) = (self.cache.as_ref(), cache_key.as_deref()) {
            if let Some(entry) = cache.get(key) {
                debug!(phase = %phase, model = %entry.model, "cache hit");
                self.append_history(phase, Message::assistant(entry.content.clone()));
                self.add_totals(entry.input_tokens, entry.output_tokens);
                self.record(phase, &provider_name, &entry.model, entry.input_tokens, entry.output_tokens, true);
                return Ok(ProviderResponse::new(
                    entry.content,
                    entry.model,
                    entry.input_tokens,
                    entry.output_tokens,
                ));
            }
        }

        let provider = self
            .registry
            .get(&provider_name)
            .ok_or_else(|| foundry_utils::error::ConfigIssue::UnknownProvider(provider_name.clone()))
            .map_err(FoundryError::Config)?;

        let messages = {
            let histories = self.histories.lock().expect("history lock poisoned");
            histories.get(&phase).cloned().unwrap_or_default()
        };

        info!(phase = %phase, provider = %provider_name, model = %model, "provider call");
        let response = provider
            .call(&messages, &model, self.max_tokens, self.temperature)
            .await
            .map_err(FoundryError::Provider)?;

        if let (Some(cache), Some(key)) = (self.cache.as_ref(), cache_key.as_deref()) {
            let entry = CacheEntry {
                content: response.content.clone(),
                input_tokens: response.input_tokens,
                output_tokens: response.output_tokens,
                model: response.model.clone(),
                timestamp: Utc::now(),
            };
            if let Err(e) = cache.put(key, &entry) {
                warn!(error = %e, "cache write failed; continuing");
            }
        }

        self.append_history(phase, Message::assistant(response.content.clone()));
        self.add_totals(response.input_tokens, response.output_tokens);
        self.record(
            phase,
            &provider_name,
            &response.model,
            response.input_tokens,
            response.output_tokens,
            false,
        );

        Ok(response)
    }

    /// Run a self-contained call that neither reads nor writes the shared
    /// phase history.
    ///
    /// Parallel subagent workers use this: each worker's prompt is complete
    /// in itself, so histories stay on the orchestrator's thread and never
    /// become shared mutable state across workers. Caching, routing,
    /// per-task overrides, totals, and cost recording all apply exactly as
    /// in the history-bearing path (the cache key simply sees an empty
    /// history).
    ///
    /// # Errors
    /// Propagates configuration and provider failures.
    pub async fn call_detached(
        &self,
        phase: PhaseKind,
        prompt: &str,
        task_num: Option<usize>,
    ) -> Result<ProviderResponse, FoundryError> {
        let base = self.configs.for_phase(phase);
        let (provider_name, model) = self.resolve_target(phase, prompt, task_num, base);

        let cache_key = match ResponseCache::cache_key(&model, prompt, &[]) {
            Ok(key) => Some(key),
            Err(e) => {
                warn!(error = %e, "cache key computation failed; skipping cache");
                None
            }
        };

        if let (Some(cache), Some(key)) = (self.cache.as_ref(), cache_key.as_deref()) {
            if let Some(entry) = cache.get(key) {
                debug!(phase = %phase, model = %entry.model, "cache hit (detached)");
                self.add_totals(entry.input_tokens, entry.output_tokens);
                self.record(phase, &provider_name, &entry.model, entry.input_tokens, entry.output_tokens, true);
                return Ok(ProviderResponse::new(
                    entry.content,
                    entry.model,
                    entry.input_tokens,
                    entry.output_tokens,
                ));
            }
        }

        let provider = self
            .registry
            .get(&provider_name)
            .ok_or_else(|| foundry_utils::error::ConfigIssue::UnknownProvider(provider_name.clone()))
            .map_err(FoundryError::Config)?;

        let messages = [Message::user(prompt)];
        info!(phase = %phase, provider = %provider_name, model = %model, "provider call (detached)");
        let response = provider
            .call(&messages, &model, self.max_tokens, self.temperature)
            .await
            .map_err(FoundryError::Provider)?;

        if let (Some(cache), Some(key)) = (self.cache.as_ref(), cache_key.as_deref()) {
            let entry = CacheEntry {
                content: response.content.clone(),
                input_tokens: response.input_tokens,
                output_tokens: response.output_tokens,
                model: response.model.clone(),
                timestamp: Utc::now(),
            };
            if let Err(e) = cache.put(key, &entry) {
                warn!(error = %e, "cache write failed; continuing");
            }
        }

        self.add_totals(response.input_tokens, response.output_tokens);
        self.record(
            phase,
            &provider_name,
            &response.model,
            response.input_tokens,
            response.output_tokens,
            false,
        );

        Ok(response)
    }

    /// Resolve the provider and model for a call.
    fn resolve_target(
        &self,
        phase: PhaseKind,
        prompt: &str,
        task_num: Option<usize>,
        base: &PhaseConfig,
    ) -> (String, String) {
        if phase == PhaseKind::Builder {
            if let Some(n) = task_num {
                if let Some(override_config) = PhaseConfig::builder_task_override(n) {
                    info!(task = n, provider = %override_config.provider, model = %override_config.model,
                        "per-task override active; routing bypassed");
                    return (override_config.provider, override_config.model);
                }
            }
        }

        if let Some(router) = self.router.as_ref() {
            let decision = router.route(&TaskAttributes {
                phase: Some(phase),
                objective: prompt,
                ..Default::default()
            });
            if decision.model != base.model {
                info!(phase = %phase, score = decision.score, model = %decision.model,
                    "router overrode configured model for this call");
            }
            return (base.provider.clone(), decision.model);
        }

        (base.provider.clone(), base.model.clone())
    }

    fn append_history(&self, phase: PhaseKind, message: Message) {
        let mut histories = self.histories.lock().expect("history lock poisoned");
        histories.entry(phase).or_default().push(message);
    }

    fn add_totals(&self, input: u64, output: u64) {
        self.total_input_tokens.fetch_add(input, Ordering::Relaxed);
        self.total_output_tokens.fetch_add(output, Ordering::Relaxed);
    }

    fn record(
        &self,
        phase: PhaseKind,
        provider: &str,
        model: &str,
        input_tokens: u64,
        output_tokens: u64,
        cached: bool,
    ) {
        if let Some(recorder) = self.recorder.as_ref() {
            recorder.record(&CallRecord {
                phase,
                provider: provider.to_string(),
                model: model.to_string(),
                input_tokens,
                output_tokens,
                cached,
                timestamp: Utc::now(),
            });
        }
    }

    /// Clear one phase's history, or all of them.
    pub fn reset_history(&self, phase: Option<PhaseKind>) {
        let mut histories = self.histories.lock().expect("history lock poisoned");
        match phase {
            Some(phase) => {
                histories.remove(&phase);
            }
            None => histories.clear(),
        }
    }

    /// Snapshot a phase's history.
    #[must_use]
    pub fn history(&self, phase: PhaseKind) -> Vec<Message> {
        self.histories
            .lock()
            .expect("history lock poisoned")
            .get(&phase)
            .cloned()
            .unwrap_or_default()
    }

    /// Running token totals `(input, output)` across all calls, cache hits
    /// included.
    #[must_use]
    pub fn token_totals(&self) -> (u64, u64) {
        (
            self.total_input_tokens.load(Ordering::Relaxed),
            self.total_output_tokens.load(Ordering::Relaxed),
        )
    }

    /// The registry this client routes through.
    #[must_use]
    pub fn registry(&self) -> &Arc<ProviderRegistry> {
        &self.registry
    }

    /// The phase configuration this client was built with.
    #[must_use]
    pub fn configs(&self) -> &PhaseConfigs {
        &self.configs
    }
}
