//! Workflow checkpoints
//!
//! One JSON per completed phase under the session's checkpoint directory,
//! named `{phase}_{timestamp}.json`, plus a `latest.json` pointer. Loading
//! "latest" returns the newest snapshot; loading by phase returns the newest
//! for that phase. Resume derives the next phase from the fixed map
//! planning → scout → architect → builder → validation → complete.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use foundry_utils::atomic_write::write_json_atomic;
use foundry_utils::paths::ensure_dir_all;
use foundry_utils::types::WorkflowPhase;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// A phase checkpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Phase that completed
    pub phase: WorkflowPhase,
    /// When the checkpoint was written
    pub timestamp: DateTime<Utc>,
    /// Arbitrary workflow state
    pub state: serde_json::Value,
}

impl Checkpoint {
    /// Phase a resume should enter given this checkpoint.
    #[must_use]
    pub const fn next_phase(&self) -> WorkflowPhase {
        self.phase.next()
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct LatestPointer {
    path: String,
    phase: WorkflowPhase,
    timestamp: DateTime<Utc>,
}

/// Per-session checkpoint storage.
#[derive(Debug)]
pub struct CheckpointStore {
    dir: PathBuf,
}

impl CheckpointStore {
    /// Open the checkpoint store for a session under the default layout
    /// (`checkpoints/sessions/{session_id}/`).
    ///
    /// # Errors
    /// Returns an error if the directory cannot be created.
    pub fn open(session_id: &str) -> Result<Self> {
        Self::open_at(foundry_utils::paths::session_checkpoint_dir().join(session_id))
    }

    /// Open a checkpoint store rooted at an explicit directory.
    ///
    /// # Errors
    /// Returns an error if the directory cannot be created.
    pub fn open_at(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        ensure_dir_all(&dir).context("failed to create checkpoint directory")?;
        Ok(Self { dir })
    }

    /// Directory this store writes into.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write a checkpoint for a phase and update `latest.json`.
    ///
    /// # Errors
    /// Returns an error on write failure.
    pub fn save(&self, phase: WorkflowPhase, state: serde_json::Value) -> Result<PathBuf> {
        let checkpoint = Checkpoint {
            phase,
            timestamp: Utc::now(),
            state,
        };
        let path = self.dir.join(format!(
            "{}_{}.json",
            phase.as_str(),
            checkpoint.timestamp.format("%Y%m%d_%H%M%S%.3f")
        ));
        write_json_atomic(&path, &checkpoint)?;

        let pointer = LatestPointer {
            path: path.display().to_string(),
            phase,
            timestamp: checkpoint.timestamp,
        };
        write_json_atomic(&self.dir.join("latest.json"), &pointer)?;

        debug!(phase = %phase, path = %path.display(), "checkpoint written");
        Ok(path)
    }

    /// Most recent checkpoint across all phases.
    #[must_use]
    pub fn load_latest(&self) -> Option<Checkpoint> {
        let raw = fs::read_to_string(self.dir.join("latest.json")).ok()?;
        let pointer: LatestPointer = serde_json::from_str(&raw).ok()?;
        Self::read_checkpoint(Path::new(&pointer.path))
            .or_else(|| self.scan_latest(None))
    }

    /// Most recent checkpoint for one phase.
    #[must_use]
    pub fn load_phase(&self, phase: WorkflowPhase) -> Option<Checkpoint> {
        self.scan_latest(Some(phase))
    }

    /// Scan the directory for the newest checkpoint, optionally filtered by
    /// phase. Timestamped names sort lexicographically by recency.
    fn scan_latest(&self, phase: Option<WorkflowPhase>) -> Option<Checkpoint> {
        let mut candidates: Vec<PathBuf> = fs::read_dir(&self.dir)
            .ok()?
            .flatten()
            .map(|e| e.path())
            .filter(|p| {
                let Some(name) = p.file_name().and_then(|n| n.to_str()) else {
                    return false;
                };
                if name == "latest.json" || !name.ends_with(".json") {
                    return false;
                }
                match phase {
                    Some(phase) => name.starts_with(&format!("{}_", phase.as_str())),
                    None => true,
                }
            })
            .collect();
        candidates.sort();
        candidates
            .into_iter()
            .rev()
            .find_map(|p| Self::read_checkpoint(&p))
    }

    fn read_checkpoint(path: &Path) -> Option<Checkpoint> {
        let raw = fs::read_to_string(path).ok()?;
        serde_json::from_str(&raw).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_save_and_load_latest() {
        let dir = TempDir::new().unwrap();
        let store = CheckpointStore::open_at(dir.path()).unwrap();

        store.save(WorkflowPhase::Scout, json!({"step": 1})).unwrap();
        store.save(WorkflowPhase::Architect, json!({"step": 2})).unwrap();

        let latest = store.load_latest().unwrap();
        assert_eq!(latest.phase, WorkflowPhase::Architect);
        assert_eq!(latest.state["step"], 2);
        assert_eq!(latest.next_phase(), WorkflowPhase::Builder);
    }

    #[test]
    fn test_load_phase_returns_newest_for_that_phase() {
        let dir = TempDir::new().unwrap();
        let store = CheckpointStore::open_at(dir.path()).unwrap();

        store.save(WorkflowPhase::Builder, json!({"tasks_done": 1})).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(5));
        store.save(WorkflowPhase::Builder, json!({"tasks_done": 2})).unwrap();
        store.save(WorkflowPhase::Validation, json!({})).unwrap();

        let builder = store.load_phase(WorkflowPhase::Builder).unwrap();
        assert_eq!(builder.state["tasks_done"], 2);
    }

    #[test]
    fn test_empty_store_has_no_checkpoints() {
        let dir = TempDir::new().unwrap();
        let store = CheckpointStore::open_at(dir.path()).unwrap();
        assert!(store.load_latest().is_none());
        assert!(store.load_phase(WorkflowPhase::Scout).is_none());
    }

    #[test]
    fn test_resume_map_terminates() {
        let dir = TempDir::new().unwrap();
        let store = CheckpointStore::open_at(dir.path()).unwrap();
        store.save(WorkflowPhase::Validation, json!({})).unwrap();
        let latest = store.load_latest().unwrap();
        assert_eq!(latest.next_phase(), WorkflowPhase::Complete);
        assert_eq!(WorkflowPhase::Complete.next(), WorkflowPhase::Complete);
    }
}
