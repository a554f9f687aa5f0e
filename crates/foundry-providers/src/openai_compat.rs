//! OpenAI-compatible chat-completions backend
//!
//! OpenAI, Groq, Mistral, Fireworks, GitHub Models, and Z.AI all speak the
//! same chat-completions wire format, differing only in endpoint, credential
//! variable, and catalog. One parameterized backend serves them all; the
//! constructors below bake in each provider's particulars.

use crate::http::HttpClient;
use crate::{DEFAULT_CALL_TIMEOUT, Model, ModelPricing, Provider, api_key_from_env};
use async_trait::async_trait;
use foundry_utils::error::ProviderError;
use foundry_utils::types::{Message, ProviderResponse, Role};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

/// A provider speaking the OpenAI chat-completions protocol.
pub struct OpenAiCompatProvider {
    name: &'static str,
    display_name: &'static str,
    credential_env: &'static str,
    base_url: String,
    models: Vec<Model>,
    pricing: HashMap<String, ModelPricing>,
    client: HttpClient,
}

impl OpenAiCompatProvider {
    fn build(
        name: &'static str,
        display_name: &'static str,
        credential_env: &'static str,
        base_url: impl Into<String>,
        models: Vec<Model>,
        pricing: HashMap<String, ModelPricing>,
    ) -> Self {
        Self {
            name,
            display_name,
            credential_env,
            base_url: base_url.into(),
            models,
            pricing,
            client: HttpClient::new(DEFAULT_CALL_TIMEOUT)
                .expect("default TLS backend must initialize"),
        }
    }

    /// OpenAI proper.
    #[must_use]
    pub fn openai() -> Self {
        Self::build(
            "openai",
            "OpenAI",
            "OPENAI_API_KEY",
            "https://api.openai.com/v1/chat/completions",
            vec![
                Model::new("gpt-4o", "GPT-4o", 128_000, "General-purpose flagship").with_vision(),
                Model::new("gpt-4o-mini", "GPT-4o mini", 128_000, "Fast and inexpensive")
                    .with_vision(),
                Model::new("o3-mini", "o3-mini", 200_000, "Reasoning model for hard problems"),
            ],
            HashMap::from([
                ("gpt-4o".to_string(), ModelPricing::new(2.5, 10.0, 128_000)),
                (
                    "gpt-4o-mini".to_string(),
                    ModelPricing::new(0.15, 0.6, 128_000),
                ),
                ("o3-mini".to_string(), ModelPricing::new(1.1, 4.4, 200_000)),
            ]),
        )
    }

    /// Groq's hosted open models.
    #[must_use]
    pub fn groq() -> Self {
        Self::build(
            "groq",
            "Groq",
            "GROQ_API_KEY",
            "https://api.groq.com/openai/v1/chat/completions",
            vec![
                Model::new(
                    "llama-3.3-70b-versatile",
                    "Llama 3.3 70B",
                    128_000,
                    "Fast open-weights model",
                ),
                Model::new(
                    "llama-3.1-8b-instant",
                    "Llama 3.1 8B",
                    128_000,
                    "Very fast small model",
                ),
            ],
            HashMap::from([
                (
                    "llama-3.3-70b-versatile".to_string(),
                    ModelPricing::new(0.59, 0.79, 128_000),
                ),
                (
                    "llama-3.1-8b-instant".to_string(),
                    ModelPricing::new(0.05, 0.08, 128_000),
                ),
            ]),
        )
    }

    /// Mistral's La Plateforme.
    #[must_use]
    pub fn mistral() -> Self {
        Self::build(
            "mistral",
            "Mistral AI",
            "MISTRAL_API_KEY",
            "https://api.mistral.ai/v1/chat/completions",
            vec![
                Model::new(
                    "mistral-large-latest",
                    "Mistral Large",
                    128_000,
                    "Flagship reasoning model",
                ),
                Model::new(
                    "mistral-small-latest",
                    "Mistral Small",
                    32_000,
                    "Cost-efficient small model",
                ),
            ],
            HashMap::from([
                (
                    "mistral-large-latest".to_string(),
                    ModelPricing::new(2.0, 6.0, 128_000),
                ),
                (
                    "mistral-small-latest".to_string(),
                    ModelPricing::new(0.2, 0.6, 32_000),
                ),
            ]),
        )
    }

    /// Fireworks AI serverless inference.
    #[must_use]
    pub fn fireworks() -> Self {
        Self::build(
            "fireworks",
            "Fireworks AI",
            "FIREWORKS_API_KEY",
            "https://api.fireworks.ai/inference/v1/chat/completions",
            vec![Model::new(
                "accounts/fireworks/models/llama-v3p1-70b-instruct",
                "Llama 3.1 70B (Fireworks)",
                128_000,
                "Hosted open-weights model",
            )],
            HashMap::from([(
                "accounts/fireworks/models/llama-v3p1-70b-instruct".to_string(),
                ModelPricing::new(0.9, 0.9, 128_000),
            )]),
        )
    }

    /// GitHub Models (Azure-hosted inference, GitHub token auth).
    #[must_use]
    pub fn github() -> Self {
        Self::build(
            "github",
            "GitHub Models",
            "GITHUB_TOKEN",
            "https://models.inference.ai.azure.com/chat/completions",
            vec![
                Model::new("gpt-4o", "GPT-4o (GitHub)", 128_000, "Free-tier hosted GPT-4o")
                    .with_vision(),
                Model::new(
                    "gpt-4o-mini",
                    "GPT-4o mini (GitHub)",
                    128_000,
                    "Free-tier hosted GPT-4o mini",
                ),
            ],
            HashMap::from([
                ("gpt-4o".to_string(), ModelPricing::new(0.0, 0.0, 128_000)),
                (
                    "gpt-4o-mini".to_string(),
                    ModelPricing::new(0.0, 0.0, 128_000),
                ),
            ]),
        )
    }

    /// Z.AI's GLM models.
    #[must_use]
    pub fn zai() -> Self {
        Self::build(
            "zai",
            "Z.AI",
            "ZAI_API_KEY",
            "https://api.z.ai/api/paas/v4/chat/completions",
            vec![
                Model::new("glm-4.6", "GLM-4.6", 200_000, "Flagship GLM coding model"),
                Model::new("glm-4.5-air", "GLM-4.5 Air", 128_000, "Lightweight GLM model"),
            ],
            HashMap::from([
                ("glm-4.6".to_string(), ModelPricing::new(0.6, 2.2, 200_000)),
                (
                    "glm-4.5-air".to_string(),
                    ModelPricing::new(0.2, 1.1, 128_000),
                ),
            ]),
        )
    }

    fn convert_messages(messages: &[Message]) -> Vec<WireMessage> {
        messages
            .iter()
            .map(|m| WireMessage {
                role: match m.role {
                    Role::System => "system",
                    Role::User => "user",
                    Role::Assistant => "assistant",
                },
                content: m.content.clone(),
            })
            .collect()
    }
}

#[async_trait]
impl Provider for OpenAiCompatProvider {
    fn name(&self) -> &'static str {
        self.name
    }

    fn display_name(&self) -> &'static str {
        self.display_name
    }

    fn credential_env(&self) -> &'static str {
        self.credential_env
    }

    fn available_models(&self) -> Vec<Model> {
        self.models.clone()
    }

    async fn call(
        &self,
        messages: &[Message],
        model: &str,
        max_tokens: u32,
        temperature: f32,
    ) -> Result<ProviderResponse, ProviderError> {
        let api_key = api_key_from_env(self.name, self.credential_env)?;

        debug!(provider = self.name, model, max_tokens, "invoking chat completions");

        let body = ChatRequest {
            model,
            messages: Self::convert_messages(messages),
            max_tokens,
            temperature,
        };

        let request = self
            .client
            .inner()
            .post(&self.base_url)
            .bearer_auth(api_key)
            .header("content-type", "application/json")
            .json(&body);

        let response = self.client.execute_with_retry(request, self.name).await?;

        let parsed: ChatResponse =
            response
                .json()
                .await
                .map_err(|e| ProviderError::MalformedResponse {
                    provider: self.name.to_string(),
                    reason: e.to_string(),
                })?;

        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::MalformedResponse {
                provider: self.name.to_string(),
                reason: "response contained no choices".to_string(),
            })?;

        let (input_tokens, output_tokens) = parsed
            .usage
            .map_or((0, 0), |u| (u.prompt_tokens, u.completion_tokens));

        let model_used = if parsed.model.is_empty() {
            model.to_string()
        } else {
            parsed.model
        };

        let mut result = ProviderResponse::new(
            choice.message.content.unwrap_or_default(),
            model_used,
            input_tokens,
            output_tokens,
        );
        if let Some(reason) = choice.finish_reason {
            result = result.with_finish_reason(reason);
        }
        Ok(result)
    }

    fn fallback_pricing(&self) -> HashMap<String, ModelPricing> {
        self.pricing.clone()
    }
}

#[derive(Debug, Serialize)]
struct WireMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    model: String,
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    prompt_tokens: u64,
    completion_tokens: u64,
}
