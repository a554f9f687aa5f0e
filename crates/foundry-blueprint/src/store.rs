//! Blueprint directory management

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use foundry_utils::atomic_write::{write_json_atomic, write_text_atomic};
use foundry_utils::paths::ensure_dir_all;
use foundry_utils::types::{BuildMode, SessionId, WorkflowStatus};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// The canonical blueprint files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlueprintKind {
    Research,
    Spec,
    SpecYaml,
    Plan,
    Tasks,
}

impl BlueprintKind {
    /// Canonical file name for this blueprint.
    #[must_use]
    pub const fn file_name(&self) -> &'static str {
        match self {
            Self::Research => "RESEARCH.md",
            Self::Spec => "SPEC.md",
            Self::SpecYaml => "SPEC.yaml",
            Self::Plan => "PLAN.md",
            Self::Tasks => "TASKS.md",
        }
    }

    /// All kinds, in pipeline order.
    #[must_use]
    pub const fn all() -> [Self; 5] {
        [Self::Research, Self::Spec, Self::SpecYaml, Self::Plan, Self::Tasks]
    }
}

/// One session recorded in the manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionEntry {
    pub timestamp: DateTime<Utc>,
    /// Build mode ("new", "fix", "enhance")
    #[serde(rename = "type")]
    pub session_type: String,
    /// Task description the session ran with
    pub task: String,
    /// Terminal status of the session
    pub status: String,
    /// Whether the session completed all phases
    pub completed: bool,
    /// Relative path of the session's history directory
    pub history_path: String,
}

/// `manifest.json` schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    pub project: String,
    pub created: DateTime<Utc>,
    #[serde(default)]
    pub sessions: Vec<SessionEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_research: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_spec: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_plan: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_tasks: Option<String>,
}

/// Manages a project's `.context-foundry/` directory.
#[derive(Debug)]
pub struct BlueprintStore {
    dir: PathBuf,
    project: String,
}

impl BlueprintStore {
    /// Open (creating if needed) the blueprint store for a project.
    ///
    /// # Errors
    /// Returns an error if the directory cannot be created.
    pub fn open(project_dir: &Path, project: impl Into<String>) -> Result<Self> {
        let dir = foundry_utils::paths::blueprint_dir(project_dir);
        ensure_dir_all(&dir).context("failed to create blueprint directory")?;
        Ok(Self {
            dir,
            project: project.into(),
        })
    }

    /// Blueprint directory path.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Whether prior blueprints exist (drives fix/enhance prompt context).
    #[must_use]
    pub fn is_populated(&self) -> bool {
        [BlueprintKind::Spec, BlueprintKind::Plan, BlueprintKind::Tasks]
            .iter()
            .any(|kind| self.dir.join(kind.file_name()).exists())
    }

    /// Overwrite a canonical blueprint file.
    ///
    /// # Errors
    /// Returns an error on write failure.
    pub fn save_canonical(&self, kind: BlueprintKind, content: &str) -> Result<PathBuf> {
        let path = self.dir.join(kind.file_name());
        write_text_atomic(&path, content)
            .with_context(|| format!("failed to write {}", kind.file_name()))?;
        Ok(path)
    }

    /// Read a canonical blueprint file, if present.
    #[must_use]
    pub fn read_canonical(&self, kind: BlueprintKind) -> Option<String> {
        fs::read_to_string(self.dir.join(kind.file_name())).ok()
    }

    /// Copy the current canonical files into this session's history
    /// directory and append a manifest entry.
    ///
    /// # Errors
    /// Returns an error on copy or manifest-write failure.
    pub fn record_session(
        &self,
        session: &SessionId,
        mode: BuildMode,
        task: &str,
        status: WorkflowStatus,
    ) -> Result<()> {
        let history_rel = format!("history/{}_{}", mode.as_str(), session.as_str());
        let history_dir = self.dir.join(&history_rel);
        ensure_dir_all(&history_dir).context("failed to create history directory")?;

        for kind in BlueprintKind::all() {
            let source = self.dir.join(kind.file_name());
            if source.exists() {
                fs::copy(&source, history_dir.join(kind.file_name()))
                    .with_context(|| format!("failed to copy {} into history", kind.file_name()))?;
            }
        }

        let mut manifest = self.load_manifest();
        manifest.sessions.push(SessionEntry {
            timestamp: Utc::now(),
            session_type: mode.as_str().to_string(),
            task: task.to_string(),
            status: status.as_str().to_string(),
            completed: status == WorkflowStatus::Success,
            history_path: history_rel,
        });
        manifest.current_research = self.canonical_ref(BlueprintKind::Research);
        manifest.current_spec = self.canonical_ref(BlueprintKind::Spec);
        manifest.current_plan = self.canonical_ref(BlueprintKind::Plan);
        manifest.current_tasks = self.canonical_ref(BlueprintKind::Tasks);

        self.save_manifest(&manifest)?;
        info!(session = %session, mode = %mode, "session recorded in manifest");
        Ok(())
    }

    fn canonical_ref(&self, kind: BlueprintKind) -> Option<String> {
        self.dir
            .join(kind.file_name())
            .exists()
            .then(|| kind.file_name().to_string())
    }

    /// Load the manifest, or an empty one for a new project.
    #[must_use]
    pub fn load_manifest(&self) -> Manifest {
        fs::read_to_string(self.dir.join("manifest.json"))
            .ok()
            .and_then(|raw| serde_json::from_str(&raw).ok())
            .unwrap_or_else(|| Manifest {
                project: self.project.clone(),
                created: Utc::now(),
                sessions: Vec::new(),
                current_research: None,
                current_spec: None,
                current_plan: None,
                current_tasks: None,
            })
    }

    /// Persist the manifest.
    ///
    /// # Errors
    /// Returns an error on write failure.
    pub fn save_manifest(&self, manifest: &Manifest) -> Result<()> {
        write_json_atomic(&self.dir.join("manifest.json"), manifest)
            .context("failed to write manifest")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store(dir: &TempDir) -> BlueprintStore {
        BlueprintStore::open(dir.path(), "demo").unwrap()
    }

    #[test]
    fn test_canonical_roundtrip_and_overwrite() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);

        store.save_canonical(BlueprintKind::Spec, "spec v1").unwrap();
        assert_eq!(store.read_canonical(BlueprintKind::Spec).unwrap(), "spec v1");

        store.save_canonical(BlueprintKind::Spec, "spec v2").unwrap();
        assert_eq!(store.read_canonical(BlueprintKind::Spec).unwrap(), "spec v2");
    }

    #[test]
    fn test_is_populated_after_spec_written() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        assert!(!store.is_populated());
        store.save_canonical(BlueprintKind::Tasks, "### Task 1").unwrap();
        assert!(store.is_populated());
    }

    #[test]
    fn test_record_session_copies_history_and_updates_manifest() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        store.save_canonical(BlueprintKind::Research, "notes").unwrap();
        store.save_canonical(BlueprintKind::Spec, "the spec").unwrap();

        let session = SessionId("demo_20250101_120000".to_string());
        store
            .record_session(&session, BuildMode::New, "build a todo app", WorkflowStatus::Success)
            .unwrap();

        let history = dir
            .path()
            .join(".context-foundry/history/new_demo_20250101_120000");
        assert!(history.join("RESEARCH.md").exists());
        assert!(history.join("SPEC.md").exists());
        assert!(!history.join("TASKS.md").exists());

        let manifest = store.load_manifest();
        assert_eq!(manifest.sessions.len(), 1);
        let entry = &manifest.sessions[0];
        assert_eq!(entry.session_type, "new");
        assert!(entry.completed);
        assert_eq!(manifest.current_spec.as_deref(), Some("SPEC.md"));
        assert!(manifest.current_tasks.is_none());
    }

    #[test]
    fn test_history_is_append_only_across_sessions() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        store.save_canonical(BlueprintKind::Spec, "v1").unwrap();

        let s1 = SessionId("demo_1".to_string());
        store
            .record_session(&s1, BuildMode::New, "t", WorkflowStatus::Success)
            .unwrap();

        store.save_canonical(BlueprintKind::Spec, "v2").unwrap();
        let s2 = SessionId("demo_2".to_string());
        store
            .record_session(&s2, BuildMode::Fix, "t2", WorkflowStatus::Incomplete)
            .unwrap();

        let manifest = store.load_manifest();
        assert_eq!(manifest.sessions.len(), 2);
        assert!(!manifest.sessions[1].completed);

        // Both history copies exist, with the content of their time
        let h1 = dir.path().join(".context-foundry/history/new_demo_1/SPEC.md");
        let h2 = dir.path().join(".context-foundry/history/fix_demo_2/SPEC.md");
        assert_eq!(fs::read_to_string(h1).unwrap(), "v1");
        assert_eq!(fs::read_to_string(h2).unwrap(), "v2");
    }
}
