//! Google Gemini backend (generateContent API)

use crate::http::HttpClient;
use crate::{DEFAULT_CALL_TIMEOUT, Model, ModelPricing, Provider, api_key_from_env};
use async_trait::async_trait;
use foundry_utils::error::ProviderError;
use foundry_utils::types::{Message, ProviderResponse, Role};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

const BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Backend for Google's Gemini `generateContent` endpoint.
pub struct GeminiProvider {
    client: HttpClient,
    base_url: String,
}

impl GeminiProvider {
    #[must_use]
    pub fn new() -> Self {
        Self {
            client: HttpClient::new(DEFAULT_CALL_TIMEOUT)
                .expect("default TLS backend must initialize"),
            base_url: BASE_URL.to_string(),
        }
    }

    /// Gemini has no system role in `contents`; system messages become a
    /// `systemInstruction`, assistant turns use the "model" role.
    fn convert_messages(messages: &[Message]) -> (Option<SystemInstruction>, Vec<Content>) {
        let mut system_parts: Vec<Part> = Vec::new();
        let mut contents = Vec::new();

        for msg in messages {
            match msg.role {
                Role::System => system_parts.push(Part {
                    text: msg.content.clone(),
                }),
                Role::User => contents.push(Content {
                    role: "user",
                    parts: vec![Part {
                        text: msg.content.clone(),
                    }],
                }),
                Role::Assistant => contents.push(Content {
                    role: "model",
                    parts: vec![Part {
                        text: msg.content.clone(),
                    }],
                }),
            }
        }

        let system = if system_parts.is_empty() {
            None
        } else {
            Some(SystemInstruction {
                parts: system_parts,
            })
        };
        (system, contents)
    }
}

impl Default for GeminiProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Provider for GeminiProvider {
    fn name(&self) -> &'static str {
        "gemini"
    }

    fn display_name(&self) -> &'static str {
        "Google Gemini"
    }

    fn credential_env(&self) -> &'static str {
        "GOOGLE_API_KEY"
    }

    fn available_models(&self) -> Vec<Model> {
        vec![
            Model::new(
                "gemini-2.5-pro",
                "Gemini 2.5 Pro",
                1_000_000,
                "Long-context flagship model",
            )
            .with_vision(),
            Model::new(
                "gemini-2.0-flash",
                "Gemini 2.0 Flash",
                1_000_000,
                "Fast general-purpose model",
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
        let (system_instruction, contents) = Self::convert_messages(messages);

        debug!(provider = "gemini", model, max_tokens, "invoking generateContent");

        let body = GenerateRequest {
            contents,
            system_instruction,
            generation_config: GenerationConfig {
                max_output_tokens: max_tokens,
                temperature,
            },
        };

        let url = format!("{}/{}:generateContent", self.base_url, model);
        let request = self
            .client
            .inner()
            .post(&url)
            .header("x-goog-api-key", api_key)
            .header("content-type", "application/json")
            .json(&body);

        let response = self.client.execute_with_retry(request, self.name()).await?;

        let parsed: GenerateResponse =
            response
                .json()
                .await
                .map_err(|e| ProviderError::MalformedResponse {
                    provider: self.name().to_string(),
                    reason: e.to_string(),
                })?;

        let candidate = parsed
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::MalformedResponse {
                provider: self.name().to_string(),
                reason: "response contained no candidates".to_string(),
            })?;

        let content: String = candidate
            .content
            .parts
            .iter()
            .map(|p| p.text.as_str())
            .collect();

        let (input_tokens, output_tokens) = parsed.usage_metadata.map_or((0, 0), |u| {
            (u.prompt_token_count, u.candidates_token_count)
        });

        let mut result = ProviderResponse::new(content, model, input_tokens, output_tokens);
        if let Some(reason) = candidate.finish_reason {
            result = result.with_finish_reason(reason);
        }
        Ok(result)
    }

    fn fallback_pricing(&self) -> HashMap<String, ModelPricing> {
        HashMap::from([
            (
                "gemini-2.5-pro".to_string(),
                ModelPricing::new(1.25, 10.0, 1_000_000),
            ),
            (
                "gemini-2.0-flash".to_string(),
                ModelPricing::new(0.1, 0.4, 1_000_000),
            ),
        ])
    }
}

#[derive(Debug, Serialize)]
struct Part {
    text: String,
}

#[derive(Debug, Serialize)]
struct Content {
    role: &'static str,
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
struct SystemInstruction {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    max_output_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<SystemInstruction>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    candidates: Vec<Candidate>,
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: CandidateContent,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u64,
    #[serde(default)]
    candidates_token_count: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_convert_messages_roles_and_system() {
        let (system, contents) = GeminiProvider::convert_messages(&[
            Message::system("rules"),
            Message::user("q"),
            Message::assistant("a"),
        ]);
        assert!(system.is_some());
        assert_eq!(contents.len(), 2);
        assert_eq!(contents[0].role, "user");
        assert_eq!(contents[1].role, "model");
    }

    #[test]
    fn test_response_parsing() {
        let json = r#"{
            "candidates": [{
                "content": {"parts": [{"text": "ans"}], "role": "model"},
                "finishReason": "STOP"
            }],
            "usageMetadata": {"promptTokenCount": 7, "candidatesTokenCount": 2}
        }"#;
        let parsed: GenerateResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.candidates[0].content.parts[0].text, "ans");
        assert_eq!(parsed.usage_metadata.unwrap().prompt_token_count, 7);
    }
}
