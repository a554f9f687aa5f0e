//! Shared HTTP execution with bounded retry
//!
//! All HTTP backends funnel their requests through [`HttpClient`]. Transient
//! failures (429, 5xx, transport errors, timeouts) are retried with capped
//! exponential backoff; permanent failures (auth, bad request) propagate on
//! the first attempt. Retries live here and nowhere else.

use foundry_utils::error::ProviderError;
use std::time::Duration;
use tracing::{debug, warn};

/// Maximum attempts per logical request (1 initial + 2 retries).
pub const MAX_ATTEMPTS: u32 = 3;

/// Base delay for exponential backoff.
const BASE_BACKOFF: Duration = Duration::from_millis(500);

/// Thin wrapper over `reqwest::Client` adding the retry policy.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: reqwest::Client,
}

impl HttpClient {
    /// Construct a client with the given per-request timeout.
    ///
    /// # Errors
    /// Returns `ProviderError::Transport` if the TLS backend cannot be
    /// initialized.
    pub fn new(timeout: Duration) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::Transport {
                provider: "http".to_string(),
                reason: e.to_string(),
            })?;
        Ok(Self { client })
    }

    /// Access the underlying client for request building.
    #[must_use]
    pub fn inner(&self) -> &reqwest::Client {
        &self.client
    }

    /// Execute a request, retrying transient failures with backoff.
    ///
    /// The builder is cloned per attempt; builders carrying streams cannot be
    /// cloned and fail with a transport error.
    ///
    /// # Errors
    /// - Permanent errors (401/403/4xx) on the first occurrence
    /// - `ProviderError::RetriesExhausted` after [`MAX_ATTEMPTS`] transient failures
    pub async fn execute_with_retry(
        &self,
        request: reqwest::RequestBuilder,
        provider: &str,
    ) -> Result<reqwest::Response, ProviderError> {
        let mut last_error: Option<ProviderError> = None;

        for attempt in 0..MAX_ATTEMPTS {
            if attempt > 0 {
                let delay = BASE_BACKOFF * 2u32.pow(attempt - 1);
                debug!(provider, attempt, delay_ms = delay.as_millis() as u64, "retrying after backoff");
                tokio::time::sleep(delay).await;
            }

            let req = request.try_clone().ok_or_else(|| ProviderError::Transport {
                provider: provider.to_string(),
                reason: "request body is not cloneable for retry".to_string(),
            })?;

            match req.send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return Ok(response);
                    }

                    let error = Self::classify_status(provider, status, response).await;
                    if error.is_retriable() {
                        warn!(provider, status = status.as_u16(), attempt, "transient HTTP error");
                        last_error = Some(error);
                    } else {
                        return Err(error);
                    }
                }
                Err(e) => {
                    let error = if e.is_timeout() {
                        ProviderError::Timeout {
                            provider: provider.to_string(),
                            timeout_secs: 0,
                        }
                    } else {
                        ProviderError::Transport {
                            provider: provider.to_string(),
                            reason: e.to_string(),
                        }
                    };
                    warn!(provider, attempt, error = %error, "transport failure");
                    last_error = Some(error);
                }
            }
        }

        let last = last_error.expect("loop ran at least once");
        Err(ProviderError::RetriesExhausted {
            provider: provider.to_string(),
            attempts: MAX_ATTEMPTS,
            last_error: last.to_string(),
        })
    }

    /// Map a non-success HTTP status to a `ProviderError`.
    async fn classify_status(
        provider: &str,
        status: reqwest::StatusCode,
        response: reqwest::Response,
    ) -> ProviderError {
        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok());
        let body = response.text().await.unwrap_or_default();
        let body_tail: String = body.chars().take(512).collect();

        match status.as_u16() {
            429 => ProviderError::RateLimited {
                provider: provider.to_string(),
                retry_after_secs: retry_after,
            },
            401 | 403 => ProviderError::Auth {
                provider: provider.to_string(),
                reason: body_tail,
            },
            s if s >= 500 => ProviderError::ServerError {
                provider: provider.to_string(),
                status: s,
                body: body_tail,
            },
            s => ProviderError::BadRequest {
                provider: provider.to_string(),
                status: s,
                body: body_tail,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_construction() {
        let client = HttpClient::new(Duration::from_secs(300));
        assert!(client.is_ok());
    }

    #[test]
    fn test_backoff_schedule_is_bounded() {
        // 500ms, 1000ms; total under 2s of sleeping across MAX_ATTEMPTS
        let total: u64 = (1..MAX_ATTEMPTS)
            .map(|a| (BASE_BACKOFF * 2u32.pow(a - 1)).as_millis() as u64)
            .sum();
        assert_eq!(total, 1500);
    }
}
