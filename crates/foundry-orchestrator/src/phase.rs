//! Single-agent phase orchestrator
//!
//! Drives Scout → Architect → Builder synchronously for one session.
//! Phase outputs persist as blueprints, state checkpoints at every phase
//! boundary, and approval gates interpose after scout and architect when the
//! run is not autonomous. Fix-mode sessions can resume a prior session's
//! task list, filtered to requested task numbers.

use crate::prompts;
use anyhow::Context;
use chrono::Utc;
use foundry_blueprint::{BlueprintKind, BlueprintStore, CheckpointStore};
use foundry_client::UnifiedClient;
use foundry_extraction::ArtifactExtractor;
use foundry_state::BuildStateTracker;
use foundry_tasks::{ParsedTask, parse_tasks};
use foundry_utils::atomic_write::write_text_atomic;
use foundry_utils::error::ParseWarning;
use foundry_utils::types::{BuildMode, PhaseKind, SessionId, WorkflowPhase, WorkflowStatus};
use serde::Serialize;
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

/// Decides whether a non-autonomous run proceeds past a phase boundary.
pub trait ApprovalGate: Send + Sync {
    /// Approve or reject continuing after `phase`, given a preview of its
    /// output.
    fn approve(&self, phase: &str, preview: &str) -> bool;
}

/// Gate that approves everything (autonomous runs).
pub struct AutoApprove;

impl ApprovalGate for AutoApprove {
    fn approve(&self, _phase: &str, _preview: &str) -> bool {
        true
    }
}

/// Options for one workflow run.
#[derive(Clone)]
pub struct WorkflowOptions {
    pub mode: BuildMode,
    /// Skip approval gates entirely
    pub autonomous: bool,
    /// Create a git commit after each builder task
    pub git_commits: bool,
    /// Session id whose task list a fix run resumes
    pub resume_session: Option<String>,
    /// 1-based task numbers to re-run on resume
    pub resume_tasks: Option<Vec<usize>>,
    /// Root for checkpoint storage; defaults to `checkpoints/sessions/`
    pub checkpoint_root: Option<PathBuf>,
}

impl Default for WorkflowOptions {
    fn default() -> Self {
        Self {
            mode: BuildMode::New,
            autonomous: true,
            git_commits: false,
            resume_session: None,
            resume_tasks: None,
            checkpoint_root: None,
        }
    }
}

/// Structured result of a workflow run.
#[derive(Debug)]
pub struct WorkflowResult {
    pub status: WorkflowStatus,
    pub session_id: SessionId,
    /// Triggering error on failure
    pub error: Option<String>,
    /// Files written under the project root, in creation order
    pub files_written: Vec<String>,
    /// Parse warnings accumulated across phases
    pub warnings: Vec<ParseWarning>,
    pub tasks_completed: usize,
    pub tasks_total: usize,
}

/// Outcome of the builder loop, possibly partial.
struct BuilderLoopOutcome {
    files_written: Vec<String>,
    warnings: Vec<ParseWarning>,
    completed: usize,
    total: usize,
    error: Option<String>,
}

/// Drives the three phases for one session.
pub struct PhaseOrchestrator {
    client: Arc<UnifiedClient>,
    project_dir: PathBuf,
    project_name: String,
    options: WorkflowOptions,
    session: SessionId,
    blueprints: BlueprintStore,
    checkpoints: CheckpointStore,
    gate: Arc<dyn ApprovalGate>,
}

impl PhaseOrchestrator {
    /// Create an orchestrator for a project directory.
    ///
    /// # Errors
    /// Returns an error if the blueprint or checkpoint stores cannot be
    /// opened.
    pub fn new(
        client: Arc<UnifiedClient>,
        project_dir: impl Into<PathBuf>,
        project_name: impl Into<String>,
        options: WorkflowOptions,
    ) -> anyhow::Result<Self> {
        let project_dir = project_dir.into();
        let project_name = project_name.into();
        let session = SessionId::mint(&project_name);

        let blueprints = BlueprintStore::open(&project_dir, &project_name)?;
        let checkpoints = match &options.checkpoint_root {
            Some(root) => CheckpointStore::open_at(root.join(session.as_str()))?,
            None => CheckpointStore::open(session.as_str())?,
        };

        Ok(Self {
            client,
            project_dir,
            project_name,
            options,
            session,
            blueprints,
            checkpoints,
            gate: Arc::new(AutoApprove),
        })
    }

    /// Replace the approval gate (interactive runs).
    #[must_use]
    pub fn with_gate(mut self, gate: Arc<dyn ApprovalGate>) -> Self {
        self.gate = gate;
        self
    }

    /// Use a caller-minted session id instead of the auto-minted one, so
    /// logs opened before construction share the id. Reopens the checkpoint
    /// store under the new id.
    ///
    /// # Errors
    /// Returns an error if the checkpoint store cannot be reopened.
    pub fn with_session(mut self, session: SessionId) -> anyhow::Result<Self> {
        self.checkpoints = match &self.options.checkpoint_root {
            Some(root) => CheckpointStore::open_at(root.join(session.as_str()))?,
            None => CheckpointStore::open(session.as_str())?,
        };
        self.session = session;
        Ok(self)
    }

    /// This run's session id.
    #[must_use]
    pub fn session_id(&self) -> &SessionId {
        &self.session
    }

    /// Run the full workflow for a task description.
    pub async fn run(&self, task: &str) -> WorkflowResult {
        let result = self.run_inner(task).await;
        let result = match result {
            Ok(result) => result,
            Err(e) => WorkflowResult {
                status: WorkflowStatus::Error,
                session_id: self.session.clone(),
                error: Some(e.to_string()),
                files_written: Vec::new(),
                warnings: Vec::new(),
                tasks_completed: 0,
                tasks_total: 0,
            },
        };

        if let Err(e) =
            self.blueprints
                .record_session(&self.session, self.options.mode, task, result.status)
        {
            warn!(error = %e, "failed to record session in manifest");
        }
        result
    }

    async fn run_inner(&self, task: &str) -> anyhow::Result<WorkflowResult> {
        if self.options.resume_session.is_some() {
            return self.run_resume(task).await;
        }

        let mut warnings = Vec::new();

        // Scout
        let prior = self.prior_blueprint_context();
        let scout_prompt =
            prompts::scout_prompt(&self.project_name, task, self.options.mode, prior.as_deref());
        let research = self
            .client
            .scout(&scout_prompt)
            .await
            .map_err(anyhow::Error::from)
            .context("scout phase failed")?;

        self.blueprints
            .save_canonical(BlueprintKind::Research, &research.content)?;
        let stamped = self.blueprints.dir().join(format!(
            "RESEARCH_{}.md",
            Utc::now().format("%Y%m%d_%H%M%S")
        ));
        write_text_atomic(&stamped, &research.content)?;
        self.checkpoint(WorkflowPhase::Scout, json!({"task": task}));

        if !self.approved("scout", &research.content) {
            return Ok(self.aborted_result("scout rejected at approval gate"));
        }

        // Architect
        let architect_prompt =
            prompts::architect_prompt(&self.project_name, task, &research.content);
        let response = self
            .client
            .architect(&architect_prompt)
            .await
            .map_err(anyhow::Error::from)
            .context("architect phase failed")?;

        let (spec, plan, tasks_md, split_warnings) =
            prompts::split_architect_output(&response.content);
        warnings.extend(split_warnings);

        self.blueprints.save_canonical(BlueprintKind::Spec, &spec)?;
        self.blueprints.save_canonical(BlueprintKind::Plan, &plan)?;
        self.blueprints.save_canonical(BlueprintKind::Tasks, &tasks_md)?;
        if let Some(yaml) = spec_yaml(&self.project_name, &spec) {
            self.blueprints.save_canonical(BlueprintKind::SpecYaml, &yaml)?;
        }
        self.checkpoint(WorkflowPhase::Architect, json!({"task": task}));

        if !self.approved("architect", &spec) {
            return Ok(self.aborted_result("architect rejected at approval gate"));
        }

        // Builder
        let parsed = parse_tasks(&tasks_md);
        warnings.extend(parsed.warnings.clone());
        let outcome = self.run_builder_loop(&parsed.tasks).await;
        warnings.extend(outcome.warnings);
        self.checkpoint(
            WorkflowPhase::Builder,
            json!({
                "task": task,
                "tasks_completed": outcome.completed,
                "tasks_total": outcome.total,
            }),
        );

        let status = match &outcome.error {
            None => WorkflowStatus::Success,
            Some(_) => WorkflowStatus::Incomplete,
        };

        Ok(WorkflowResult {
            status,
            session_id: self.session.clone(),
            error: outcome.error,
            files_written: outcome.files_written,
            warnings,
            tasks_completed: outcome.completed,
            tasks_total: outcome.total,
        })
    }

    /// Resume a prior session's task list, filtered to requested numbers.
    async fn run_resume(&self, task: &str) -> anyhow::Result<WorkflowResult> {
        let resume_session = self
            .options
            .resume_session
            .as_deref()
            .expect("resume path requires a session");
        let requested = self.options.resume_tasks.clone().unwrap_or_default();

        let tasks_md = self
            .resume_tasks_source(resume_session)
            .with_context(|| format!("no task list found for session {resume_session}"))?;
        let parsed = parse_tasks(&tasks_md);
        let mut warnings = parsed.warnings.clone();

        let total_available = parsed.tasks.len();
        let mut selected: Vec<ParsedTask> = Vec::new();
        for number in &requested {
            match parsed.tasks.iter().find(|t| t.number == *number) {
                Some(task) => selected.push(task.clone()),
                None => {
                    warn!(task = number, total_available, "resume task out of range; skipping");
                    warnings.push(ParseWarning::new(
                        "resume",
                        format!("task {number} is out of range (1..={total_available}); skipped"),
                    ));
                }
            }
        }

        info!(
            session = resume_session,
            requested = requested.len(),
            selected = selected.len(),
            "resuming builder for selected tasks"
        );

        let outcome = self.run_builder_loop(&selected).await;
        warnings.extend(outcome.warnings);
        self.checkpoint(
            WorkflowPhase::Builder,
            json!({
                "task": task,
                "resumed_from": resume_session,
                "tasks_completed": outcome.completed,
            }),
        );

        let status = match (&outcome.error, outcome.completed) {
            (None, _) => WorkflowStatus::Success,
            (Some(_), 0) => WorkflowStatus::Error,
            (Some(_), _) => WorkflowStatus::Incomplete,
        };

        Ok(WorkflowResult {
            status,
            session_id: self.session.clone(),
            error: outcome.error,
            files_written: outcome.files_written,
            warnings,
            tasks_completed: outcome.completed,
            tasks_total: outcome.total,
        })
    }

    /// The task list a resume run builds from: the named session's history
    /// copy when present, the canonical `TASKS.md` otherwise.
    fn resume_tasks_source(&self, resume_session: &str) -> Option<String> {
        let history_root = self.blueprints.dir().join("history");
        if let Ok(entries) = std::fs::read_dir(&history_root) {
            for entry in entries.flatten() {
                let name = entry.file_name();
                let name = name.to_string_lossy().to_string();
                if name.ends_with(resume_session) {
                    let candidate = entry.path().join(BlueprintKind::Tasks.file_name());
                    if let Ok(content) = std::fs::read_to_string(candidate) {
                        return Some(content);
                    }
                }
            }
        }
        self.blueprints.read_canonical(BlueprintKind::Tasks)
    }

    /// Execute parsed tasks sequentially: reset history, prompt, extract,
    /// track, record progress, optionally commit.
    async fn run_builder_loop(&self, tasks: &[ParsedTask]) -> BuilderLoopOutcome {
        let extractor = ArtifactExtractor::new(&self.project_dir, &self.project_name);
        let mut tracker = BuildStateTracker::load(&self.project_dir);
        let mut files_created: Vec<String> = Vec::new();
        let mut warnings = Vec::new();
        let mut completed = 0;
        let mut error = None;

        for task in tasks {
            // Each task is self-contained
            self.client.reset_history(Some(PhaseKind::Builder));

            let prompt = prompts::builder_task_prompt(&self.project_name, task, &files_created);
            let response = match self.client.builder(&prompt, Some(task.number)).await {
                Ok(response) => response,
                Err(e) => {
                    error = Some(format!("builder task {} failed: {e}", task.number));
                    break;
                }
            };

            let report = match extractor.extract(&response.content) {
                Ok(report) => report,
                Err(e) => {
                    error = Some(format!("extraction for task {} failed: {e}", task.number));
                    break;
                }
            };
            for warning in &report.warnings {
                warnings.push(ParseWarning::new(
                    "extraction",
                    format!("task {}: {warning}", task.number),
                ));
            }

            for written in &report.written {
                let dependencies: Vec<String> = task
                    .files
                    .iter()
                    .filter(|f| *f != &written.relpath && files_created.contains(f))
                    .cloned()
                    .collect();
                if let Err(e) =
                    tracker.track_file(&written.relpath, &format!("task_{}", task.number), dependencies)
                {
                    warn!(file = %written.relpath, error = %e, "failed to track file");
                }
                files_created.push(written.relpath.clone());
            }

            completed += 1;
            self.write_progress(completed, tasks.len(), task);
            if self.options.git_commits {
                self.commit_task(task).await;
            }
        }

        if let Err(e) = tracker.finish_build() {
            warn!(error = %e, "failed to persist build state");
        }

        BuilderLoopOutcome {
            files_written: files_created,
            warnings,
            completed,
            total: tasks.len(),
            error,
        }
    }

    fn write_progress(&self, completed: usize, total: usize, last: &ParsedTask) {
        let body = format!(
            "# Build Progress\n\nSession: {}\nCompleted {completed}/{total} tasks\nLast task: Task {}{}\nUpdated: {}\n",
            self.session,
            last.number,
            if last.title.is_empty() {
                String::new()
            } else {
                format!(" — {}", last.title.trim_start_matches(':').trim())
            },
            Utc::now().to_rfc3339(),
        );
        let path = self.blueprints.dir().join("PROGRESS.md");
        if let Err(e) = write_text_atomic(&path, &body) {
            warn!(error = %e, "failed to write progress file");
        }
    }

    /// Best-effort git commit for a completed task. Git failures never abort
    /// the build.
    async fn commit_task(&self, task: &ParsedTask) {
        let message = format!(
            "{} task {}{}",
            self.options.mode.commit_prefix(),
            task.number,
            if task.title.is_empty() {
                String::new()
            } else {
                format!(":{}", task.title.trim_start_matches(':'))
            }
        );

        for args in [
            vec!["add".to_string(), "-A".to_string()],
            vec!["commit".to_string(), "-m".to_string(), message.clone()],
        ] {
            let result = tokio::process::Command::new("git")
                .args(&args)
                .current_dir(&self.project_dir)
                .output()
                .await;
            match result {
                Ok(output) if output.status.success() => {}
                Ok(output) => {
                    warn!(
                        args = ?args,
                        code = output.status.code(),
                        "git command failed; continuing"
                    );
                    return;
                }
                Err(e) => {
                    warn!(error = %e, "git unavailable; continuing");
                    return;
                }
            }
        }
        info!(message = %message, "committed task");
    }

    fn prior_blueprint_context(&self) -> Option<String> {
        if self.options.mode == BuildMode::New || !self.blueprints.is_populated() {
            return None;
        }
        let mut context = String::new();
        for kind in [BlueprintKind::Spec, BlueprintKind::Plan, BlueprintKind::Tasks] {
            if let Some(content) = self.blueprints.read_canonical(kind) {
                context.push_str(&format!("## {}\n\n{content}\n\n", kind.file_name()));
            }
        }
        (!context.is_empty()).then_some(context)
    }

    fn approved(&self, phase: &str, preview: &str) -> bool {
        if self.options.autonomous {
            return true;
        }
        let approved = self.gate.approve(phase, preview);
        if !approved {
            info!(phase, "run aborted at approval gate");
        }
        approved
    }

    fn aborted_result(&self, reason: &str) -> WorkflowResult {
        WorkflowResult {
            status: WorkflowStatus::Aborted,
            session_id: self.session.clone(),
            error: Some(reason.to_string()),
            files_written: Vec::new(),
            warnings: Vec::new(),
            tasks_completed: 0,
            tasks_total: 0,
        }
    }

    fn checkpoint(&self, phase: WorkflowPhase, state: serde_json::Value) {
        if let Err(e) = self.checkpoints.save(phase, state) {
            warn!(phase = %phase, error = %e, "checkpoint write failed");
        }
    }
}

/// Derive a minimal `SPEC.yaml` from the markdown spec: title plus any
/// HTTP endpoints it declares. Returns `None` when nothing structured can
/// be extracted.
fn spec_yaml(project: &str, spec_md: &str) -> Option<String> {
    #[derive(Serialize)]
    struct SpecYaml<'a> {
        project: &'a str,
        title: String,
        endpoints: Vec<String>,
    }

    let title = spec_md
        .lines()
        .find(|l| l.starts_with('#'))
        .map(|l| l.trim_start_matches('#').trim_start_matches(':').trim().to_string())
        .unwrap_or_else(|| project.to_string());

    let endpoint_re =
        regex::Regex::new(r"(?m)\b(GET|POST|PUT|PATCH|DELETE)\s+(/[^\s`,)]*)").ok()?;
    let mut endpoints: Vec<String> = endpoint_re
        .captures_iter(spec_md)
        .map(|caps| format!("{} {}", &caps[1], &caps[2]))
        .collect();
    endpoints.sort();
    endpoints.dedup();

    serde_yaml::to_string(&SpecYaml {
        project,
        title,
        endpoints,
    })
    .ok()
}
