//! Anthropic Messages API backend

use crate::http::HttpClient;
use crate::{DEFAULT_CALL_TIMEOUT, Model, ModelPricing, Provider, api_key_from_env};
use async_trait::async_trait;
use foundry_utils::error::ProviderError;
use foundry_utils::types::{Message, ProviderResponse, Role};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

const BASE_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Backend for Anthropic's Messages API.
pub struct AnthropicProvider {
    client: HttpClient,
    base_url: String,
}

impl AnthropicProvider {
    /// Create the backend with the default endpoint and timeout.
    #[must_use]
    pub fn new() -> Self {
        Self::with_base_url(BASE_URL)
    }

    /// Create the backend against a custom endpoint (used by tests).
    #[must_use]
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            client: HttpClient::new(DEFAULT_CALL_TIMEOUT)
                .expect("default TLS backend must initialize"),
            base_url: base_url.into(),
        }
    }

    /// Split system messages out of the conversation; Anthropic takes the
    /// system prompt as a dedicated field.
    fn convert_messages(messages: &[Message]) -> (Option<String>, Vec<WireMessage>) {
        let mut system_prompt: Option<String> = None;
        let mut wire = Vec::new();

        for msg in messages {
            match msg.role {
                Role::System => {
                    if let Some(existing) = system_prompt.as_mut() {
                        existing.push_str("\n\n");
                        existing.push_str(&msg.content);
                    } else {
                        system_prompt = Some(msg.content.clone());
                    }
                }
                Role::User => wire.push(WireMessage {
                    role: "user",
                    content: msg.content.clone(),
                }),
                Role::Assistant => wire.push(WireMessage {
                    role: "assistant",
                    content: msg.content.clone(),
                }),
            }
        }

        (system_prompt, wire)
    }
}

impl Default for AnthropicProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Provider for AnthropicProvider {
    fn name(&self) -> &'static str {
        "anthropic"
    }

    fn display_name(&self) -> &'static str {
        "Anthropic"
    }

    fn credential_env(&self) -> &'static str {
        "ANTHROPIC_API_KEY"
    }

    fn available_models(&self) -> Vec<Model> {
        vec![
            Model::new(
                "claude-sonnet-4-5",
                "Claude Sonnet 4.5",
                200_000,
                "Balanced model for coding and planning",
            )
            .with_vision(),
            Model::new(
                "claude-opus-4-1",
                "Claude Opus 4.1",
                200_000,
                "Strongest model for complex architecture work",
            )
            .with_vision(),
            Model::new(
                "claude-haiku-4-5",
                "Claude Haiku 4.5",
                200_000,
                "Fast, inexpensive model for simple tasks",
            )
            .with_vision(),
        ]
    }

    async fn call(
        &self,
        messages: &[Message],
        model: &str,
        max_tokens: u32,
        temperature: f32,
    ) -> Result<ProviderResponse, ProviderError> {
        let api_key = api_key_from_env(self.name(), self.credential_env())?;
        let (system, wire_messages) = Self::convert_messages(messages);

        debug!(provider = "anthropic", model, max_tokens, "invoking Messages API");

        let body = MessagesRequest {
            model,
            messages: wire_messages,
            max_tokens,
            temperature,
            system,
        };

        let request = self
            .client
            .inner()
            .post(&self.base_url)
            .header("x-api-key", api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&body);

        let response = self.client.execute_with_retry(request, self.name()).await?;

        let parsed: MessagesResponse =
            response
                .json()
                .await
                .map_err(|e| ProviderError::MalformedResponse {
                    provider: self.name().to_string(),
                    reason: e.to_string(),
                })?;

        let content: String = parsed
            .content
            .iter()
            .filter(|block| block.block_type == "text")
            .filter_map(|block| block.text.as_deref())
            .collect();

        if content.is_empty() {
            return Err(ProviderError::MalformedResponse {
                provider: self.name().to_string(),
                reason: "response contained no text blocks".to_string(),
            });
        }

        let (input_tokens, output_tokens) = parsed
            .usage
            .map_or((0, 0), |u| (u.input_tokens, u.output_tokens));

        let mut result = ProviderResponse::new(content, parsed.model, input_tokens, output_tokens);
        if let Some(reason) = parsed.stop_reason {
            result = result.with_finish_reason(reason);
        }
        Ok(result)
    }

    fn fallback_pricing(&self) -> HashMap<String, ModelPricing> {
        HashMap::from([
            (
                "claude-sonnet-4-5".to_string(),
                ModelPricing::new(3.0, 15.0, 200_000),
            ),
            (
                "claude-opus-4-1".to_string(),
                ModelPricing::new(15.0, 75.0, 200_000),
            ),
            (
                "claude-haiku-4-5".to_string(),
                ModelPricing::new(1.0, 5.0, 200_000),
            ),
        ])
    }
}

#[derive(Debug, Serialize)]
struct WireMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage>,
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    model: String,
    content: Vec<ContentBlock>,
    usage: Option<Usage>,
    stop_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    block_type: String,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    input_tokens: u64,
    output_tokens: u64,
}
