use std::path::PathBuf;
use thiserror::Error;

/// Library-level error type for context-foundry operations.
///
/// Errors are organized into categories matching the propagation policy:
///
/// | Category | Policy |
/// |----------|--------|
/// | `Config` | Fatal for the affected phase, surfaced at startup |
/// | `Provider` | Retried when transient, otherwise fails the phase |
/// | `Cache` | Always recovered: log and proceed as if absent |
/// | `Artifact` | Path escapes are hard rejects; empty output is a warning |
/// | `Validation` | Drives the self-heal loop |
/// | `Serialization` | Fatal |
///
/// Library code returns `FoundryError` and does NOT call `process::exit`;
/// the CLI maps errors to exit codes via [`crate::exit_codes`].
#[derive(Error, Debug)]
pub enum FoundryError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigIssue),

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Artifact error: {0}")]
    Artifact(#[from] ArtifactError),

    #[error("Validation failed: {issue_count} issue(s) in {stage}")]
    ValidationFailed {
        stage: String,
        issues: Vec<String>,
        issue_count: usize,
    },

    #[error("Checkpoint error: {0}")]
    Checkpoint(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Configuration validation outcomes for a `(provider, model)` pair.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigIssue {
    #[error("Unknown provider '{0}'")]
    UnknownProvider(String),

    #[error("Provider '{provider}' is not configured: set {credential_env}")]
    Unconfigured {
        provider: String,
        credential_env: String,
    },

    #[error("Unknown model '{model}' for provider '{provider}'")]
    UnknownModel { provider: String, model: String },

    #[error("Invalid configuration value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("Configuration file error at {path}: {reason}")]
    FileError { path: String, reason: String },
}

/// Errors surfaced by provider backends.
///
/// [`ProviderError::is_retriable`] decides whether the call layer may retry
/// with backoff; retries never happen anywhere else.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Rate limited by {provider}")]
    RateLimited {
        provider: String,
        retry_after_secs: Option<u64>,
    },

    #[error("Request to {provider} timed out after {timeout_secs}s")]
    Timeout {
        provider: String,
        timeout_secs: u64,
    },

    #[error("Transport failure talking to {provider}: {reason}")]
    Transport { provider: String, reason: String },

    #[error("{provider} returned server error {status}: {body}")]
    ServerError {
        provider: String,
        status: u16,
        body: String,
    },

    #[error("Authentication with {provider} failed: {reason}")]
    Auth { provider: String, reason: String },

    #[error("{provider} rejected the request ({status}): {body}")]
    BadRequest {
        provider: String,
        status: u16,
        body: String,
    },

    #[error("{provider} response could not be parsed: {reason}")]
    MalformedResponse { provider: String, reason: String },

    #[error("Retries exhausted for {provider} after {attempts} attempts: {last_error}")]
    RetriesExhausted {
        provider: String,
        attempts: u32,
        last_error: String,
    },
}

impl ProviderError {
    /// Whether the call layer may retry this error with backoff.
    ///
    /// Rate limits, timeouts, transport failures, and 5xx responses are
    /// transient; auth and bad-request errors are permanent.
    #[must_use]
    pub const fn is_retriable(&self) -> bool {
        matches!(
            self,
            Self::RateLimited { .. }
                | Self::Timeout { .. }
                | Self::Transport { .. }
                | Self::ServerError { .. }
        )
    }

    /// Provider name the error originated from.
    #[must_use]
    pub fn provider(&self) -> &str {
        match self {
            Self::RateLimited { provider, .. }
            | Self::Timeout { provider, .. }
            | Self::Transport { provider, .. }
            | Self::ServerError { provider, .. }
            | Self::Auth { provider, .. }
            | Self::BadRequest { provider, .. }
            | Self::MalformedResponse { provider, .. }
            | Self::RetriesExhausted { provider, .. } => provider,
        }
    }
}

/// Response-cache failures. Always recoverable: callers log and fall through
/// to the provider as if the cache were absent.
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Failed to read cache entry {key}: {reason}")]
    ReadFailed { key: String, reason: String },

    #[error("Failed to write cache entry {key}: {reason}")]
    WriteFailed { key: String, reason: String },

    #[error("Cache entry {key} is corrupted: {reason}")]
    Corrupted { key: String, reason: String },

    #[error("Cache directory unavailable: {0}")]
    DirectoryUnavailable(String),
}

/// Artifact extraction failures and rejections.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ArtifactError {
    #[error("Path escapes the project root: {0}")]
    PathEscape(PathBuf),

    #[error("Failed to write {path}: {reason}")]
    WriteFailed { path: String, reason: String },
}

/// A recorded, non-fatal parse problem (architect output, task grammar).
///
/// Parse failures never abort the pipeline; the forgiving fallback runs and
/// the warning is carried in the phase result so tests can assert on it.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ParseWarning {
    /// Which parser produced the warning
    pub source: String,
    /// Human-readable description of what fell back
    pub message: String,
}

impl ParseWarning {
    #[must_use]
    pub fn new(source: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            message: message.into(),
        }
    }
}
