use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifies the three LLM-backed phases of the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PhaseKind {
    Scout,
    Architect,
    Builder,
}

impl PhaseKind {
    /// Returns the string representation of the phase
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Scout => "scout",
            Self::Architect => "architect",
            Self::Builder => "builder",
        }
    }

    /// All phases in pipeline order
    #[must_use]
    pub const fn all() -> [Self; 3] {
        [Self::Scout, Self::Architect, Self::Builder]
    }
}

impl std::fmt::Display for PhaseKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Workflow phases as recorded in checkpoints, a superset of [`PhaseKind`]
/// that also covers planning and validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkflowPhase {
    Planning,
    Scout,
    Architect,
    Builder,
    Validation,
    Complete,
}

impl WorkflowPhase {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Planning => "planning",
            Self::Scout => "scout",
            Self::Architect => "architect",
            Self::Builder => "builder",
            Self::Validation => "validation",
            Self::Complete => "complete",
        }
    }

    /// The phase a resumed workflow should enter after this one completed.
    #[must_use]
    pub const fn next(&self) -> Self {
        match self {
            Self::Planning => Self::Scout,
            Self::Scout => Self::Architect,
            Self::Architect => Self::Builder,
            Self::Builder => Self::Validation,
            Self::Validation | Self::Complete => Self::Complete,
        }
    }

    /// Parse a phase name as stored in checkpoint files.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "planning" => Some(Self::Planning),
            "scout" => Some(Self::Scout),
            "architect" => Some(Self::Architect),
            "builder" => Some(Self::Builder),
            "validation" => Some(Self::Validation),
            "complete" => Some(Self::Complete),
            _ => None,
        }
    }
}

impl std::fmt::Display for WorkflowPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Role of a message in a conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System-level instructions
    System,
    /// User input
    User,
    /// Assistant response
    Assistant,
}

/// A single message in a per-phase conversation history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Role of the message sender
    pub role: Role,
    /// Content of the message (plain UTF-8 text)
    pub content: String,
}

impl Message {
    /// Create a new message
    #[must_use]
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    /// Create a system message
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    /// Create a user message
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Create an assistant message
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// Normalized return of any LLM call, regardless of provider.
///
/// Immutable once produced; `total_tokens` is always `input + output`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderResponse {
    /// Response text
    pub content: String,
    /// Model that actually served the request
    pub model: String,
    /// Input tokens consumed
    pub input_tokens: u64,
    /// Output tokens generated
    pub output_tokens: u64,
    /// Sum of input and output tokens
    pub total_tokens: u64,
    /// Provider-reported finish reason ("stop", "length", ...)
    pub finish_reason: Option<String>,
}

impl ProviderResponse {
    /// Create a response, computing `total_tokens` from the parts.
    #[must_use]
    pub fn new(
        content: impl Into<String>,
        model: impl Into<String>,
        input_tokens: u64,
        output_tokens: u64,
    ) -> Self {
        Self {
            content: content.into(),
            model: model.into(),
            input_tokens,
            output_tokens,
            total_tokens: input_tokens + output_tokens,
            finish_reason: None,
        }
    }

    /// Attach a finish reason
    #[must_use]
    pub fn with_finish_reason(mut self, reason: impl Into<String>) -> Self {
        self.finish_reason = Some(reason.into());
        self
    }
}

/// Build mode driving prompt composition and git commit prefixes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildMode {
    /// Fresh project from scratch
    New,
    /// Repair an existing project
    Fix,
    /// Extend an existing project
    Enhance,
}

impl BuildMode {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Fix => "fix",
            Self::Enhance => "enhance",
        }
    }

    /// Conventional-commit prefix for commits created in this mode.
    #[must_use]
    pub const fn commit_prefix(&self) -> &'static str {
        match self {
            Self::New => "feat:",
            Self::Fix => "fix:",
            Self::Enhance => "feat:",
        }
    }
}

impl std::fmt::Display for BuildMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Overall complexity of a planned workflow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkflowComplexity {
    Simple,
    Medium,
    Complex,
}

impl WorkflowComplexity {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Simple => "Simple",
            Self::Medium => "Medium",
            Self::Complex => "Complex",
        }
    }

    /// Parse the capitalized form used in workflow-plan JSON.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Simple" | "simple" => Some(Self::Simple),
            "Medium" | "medium" => Some(Self::Medium),
            "Complex" | "complex" => Some(Self::Complex),
            _ => None,
        }
    }
}

/// Terminal state of a workflow run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkflowStatus {
    Success,
    Aborted,
    Error,
    Incomplete,
}

impl WorkflowStatus {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Aborted => "aborted",
            Self::Error => "error",
            Self::Incomplete => "incomplete",
        }
    }
}

/// Session identifier: `{project}_{timestamp}`.
///
/// Sessions own per-phase histories and name the blueprint history directory
/// and checkpoint files for one orchestrator invocation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    /// Mint a session id for a project at the current instant.
    #[must_use]
    pub fn mint(project: &str) -> Self {
        Self::mint_at(project, Utc::now())
    }

    /// Mint a session id with an explicit timestamp (deterministic in tests).
    #[must_use]
    pub fn mint_at(project: &str, at: DateTime<Utc>) -> Self {
        Self(format!("{}_{}", project, at.format("%Y%m%d_%H%M%S")))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_phase_kind_roundtrip() {
        for phase in PhaseKind::all() {
            let json = serde_json::to_string(&phase).unwrap();
            let back: PhaseKind = serde_json::from_str(&json).unwrap();
            assert_eq!(phase, back);
        }
    }

    #[test]
    fn test_workflow_phase_next_map() {
        assert_eq!(WorkflowPhase::Planning.next(), WorkflowPhase::Scout);
        assert_eq!(WorkflowPhase::Scout.next(), WorkflowPhase::Architect);
        assert_eq!(WorkflowPhase::Architect.next(), WorkflowPhase::Builder);
        assert_eq!(WorkflowPhase::Builder.next(), WorkflowPhase::Validation);
        assert_eq!(WorkflowPhase::Validation.next(), WorkflowPhase::Complete);
        assert_eq!(WorkflowPhase::Complete.next(), WorkflowPhase::Complete);
    }

    #[test]
    fn test_workflow_phase_parse_inverse_of_as_str() {
        for phase in [
            WorkflowPhase::Planning,
            WorkflowPhase::Scout,
            WorkflowPhase::Architect,
            WorkflowPhase::Builder,
            WorkflowPhase::Validation,
            WorkflowPhase::Complete,
        ] {
            assert_eq!(WorkflowPhase::parse(phase.as_str()), Some(phase));
        }
        assert_eq!(WorkflowPhase::parse("bogus"), None);
    }

    #[test]
    fn test_provider_response_totals() {
        let resp = ProviderResponse::new("hi", "model-x", 100, 25);
        assert_eq!(resp.total_tokens, 125);
        assert!(resp.finish_reason.is_none());

        let resp = resp.with_finish_reason("stop");
        assert_eq!(resp.finish_reason.as_deref(), Some("stop"));
    }

    #[test]
    fn test_session_id_format() {
        let at = Utc.with_ymd_and_hms(2025, 3, 14, 15, 9, 26).unwrap();
        let id = SessionId::mint_at("todo-app", at);
        assert_eq!(id.as_str(), "todo-app_20250314_150926");
    }

    #[test]
    fn test_commit_prefix_by_mode() {
        assert_eq!(BuildMode::New.commit_prefix(), "feat:");
        assert_eq!(BuildMode::Fix.commit_prefix(), "fix:");
        assert_eq!(BuildMode::Enhance.commit_prefix(), "feat:");
    }
}
