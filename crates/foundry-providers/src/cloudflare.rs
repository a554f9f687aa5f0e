//! Cloudflare Workers AI backend
//!
//! Cloudflare needs two credentials: an API token and an account id. The
//! account id is part of the URL, so `is_configured` requires both.

use crate::http::HttpClient;
use crate::{DEFAULT_CALL_TIMEOUT, Model, ModelPricing, Provider, api_key_from_env, estimate_tokens};
use async_trait::async_trait;
use foundry_utils::error::ProviderError;
use foundry_utils::types::{Message, ProviderResponse, Role};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

const ACCOUNT_ENV: &str = "CLOUDFLARE_ACCOUNT_ID";

/// Backend for Cloudflare Workers AI.
pub struct CloudflareProvider {
    client: HttpClient,
}

impl CloudflareProvider {
    #[must_use]
    pub fn new() -> Self {
        Self {
            client: HttpClient::new(DEFAULT_CALL_TIMEOUT)
                .expect("default TLS backend must initialize"),
        }
    }

    fn account_id() -> Result<String, ProviderError> {
        std::env::var(ACCOUNT_ENV)
            .ok()
            .filter(|v| !v.is_empty())
            .ok_or_else(|| ProviderError::Auth {
                provider: "cloudflare".to_string(),
                reason: format!("credential environment variable {ACCOUNT_ENV} is not set"),
            })
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

impl Default for CloudflareProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Provider for CloudflareProvider {
    fn name(&self) -> &'static str {
        "cloudflare"
    }

    fn display_name(&self) -> &'static str {
        "Cloudflare Workers AI"
    }

    fn credential_env(&self) -> &'static str {
        "CLOUDFLARE_API_KEY"
    }

    fn is_configured(&self) -> bool {
        let has_key = std::env::var(self.credential_env()).is_ok_and(|v| !v.is_empty());
        let has_account = std::env::var(ACCOUNT_ENV).is_ok_and(|v| !v.is_empty());
        has_key && has_account
    }

    fn available_models(&self) -> Vec<Model> {
        vec![
            Model::new(
                "@cf/meta/llama-3.1-8b-instruct",
                "Llama 3.1 8B (Workers AI)",
                128_000,
                "Edge-hosted small model",
            ),
            Model::new(
                "@cf/meta/llama-3.3-70b-instruct-fp8-fast",
                "Llama 3.3 70B (Workers AI)",
                128_000,
                "Edge-hosted large model",
            ),
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
        let account_id = Self::account_id()?;

        debug!(provider = "cloudflare", model, "invoking Workers AI");

        let url = format!(
            "https://api.cloudflare.com/client/v4/accounts/{account_id}/ai/run/{model}"
        );

        let body = RunRequest {
            messages: Self::convert_messages(messages),
            max_tokens,
            temperature,
        };

        let request = self
            .client
            .inner()
            .post(&url)
            .bearer_auth(api_key)
            .header("content-type", "application/json")
            .json(&body);

        let response = self.client.execute_with_retry(request, self.name()).await?;

        let parsed: RunResponse =
            response
                .json()
                .await
                .map_err(|e| ProviderError::MalformedResponse {
                    provider: self.name().to_string(),
                    reason: e.to_string(),
                })?;

        if !parsed.success {
            let errors = parsed
                .errors
                .iter()
                .map(|e| e.message.as_str())
                .collect::<Vec<_>>()
                .join("; ");
            return Err(ProviderError::BadRequest {
                provider: self.name().to_string(),
                status: 200,
                body: errors,
            });
        }

        let content = parsed
            .result
            .and_then(|r| r.response)
            .ok_or_else(|| ProviderError::MalformedResponse {
                provider: self.name().to_string(),
                reason: "result.response missing".to_string(),
            })?;

        // Workers AI does not report usage; estimate from text lengths.
        let prompt_text: String = messages.iter().map(|m| m.content.as_str()).collect();
        let input_tokens = estimate_tokens(&prompt_text);
        let output_tokens = estimate_tokens(&content);

        Ok(ProviderResponse::new(content, model, input_tokens, output_tokens))
    }

    fn fallback_pricing(&self) -> HashMap<String, ModelPricing> {
        HashMap::from([
            (
                "@cf/meta/llama-3.1-8b-instruct".to_string(),
                ModelPricing::new(0.03, 0.2, 128_000),
            ),
            (
                "@cf/meta/llama-3.3-70b-instruct-fp8-fast".to_string(),
                ModelPricing::new(0.29, 2.25, 128_000),
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
struct RunRequest {
    messages: Vec<WireMessage>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct RunResponse {
    success: bool,
    #[serde(default)]
    errors: Vec<ApiError>,
    result: Option<RunResult>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct RunResult {
    response: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_response_parsing_success() {
        let json = r#"{"success": true, "result": {"response": "hi"}}"#;
        let parsed: RunResponse = serde_json::from_str(json).unwrap();
        assert!(parsed.success);
        assert_eq!(parsed.result.unwrap().response.as_deref(), Some("hi"));
    }

    #[test]
    fn test_response_parsing_error() {
        let json = r#"{"success": false, "errors": [{"message": "no such model"}]}"#;
        let parsed: RunResponse = serde_json::from_str(json).unwrap();
        assert!(!parsed.success);
        assert_eq!(parsed.errors[0].message, "no such model");
    }

    #[test]
    #[serial]
    fn test_requires_both_credentials() {
        let provider = CloudflareProvider::new();
        // SAFETY: serialized test; variables restored to absent at the end.
        unsafe {
            std::env::remove_var("CLOUDFLARE_API_KEY");
            std::env::remove_var("CLOUDFLARE_ACCOUNT_ID");
        }
        assert!(!provider.is_configured());

        unsafe {
            std::env::set_var("CLOUDFLARE_API_KEY", "k");
        }
        assert!(!provider.is_configured());

        unsafe {
            std::env::set_var("CLOUDFLARE_ACCOUNT_ID", "a");
        }
        assert!(provider.is_configured());

        unsafe {
            std::env::remove_var("CLOUDFLARE_API_KEY");
            std::env::remove_var("CLOUDFLARE_ACCOUNT_ID");
        }
    }
}
