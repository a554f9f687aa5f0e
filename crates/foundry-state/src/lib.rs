//! Build state tracking for incremental rebuilds
//!
//! Maintains SHA-256 hashes and file↔task mappings per project so the
//! builder coordinator can rebuild only what changed. A file is "unchanged"
//! iff its stored hash matches the bytes on disk. The state file is
//! rewritten wholesale after builder completion; it has exactly one writer.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use foundry_utils::atomic_write::write_json_atomic;
use foundry_utils::canonical::sha256_file;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Source extensions that count as buildable project files.
pub const SOURCE_EXTENSIONS: &[&str] = &["py", "js", "ts", "tsx", "jsx", "css", "html"];

/// Directories never scanned for untracked sources.
const IGNORED_DIRS: &[&str] = &[".context-foundry", ".git", "node_modules", "dist", "build"];

/// Per-file record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileRecord {
    /// SHA-256 of the file bytes at last build
    pub hash: String,
    /// When the file was last built
    pub last_built: DateTime<Utc>,
    /// Relative paths this file depends on
    pub dependencies: Vec<String>,
    /// Task that created the file
    pub created_by_task: String,
}

/// Serialized build state.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BuildState {
    /// relpath → record
    pub files: BTreeMap<String, FileRecord>,
    /// task id → relpaths it created
    pub task_file_mapping: BTreeMap<String, Vec<String>>,
    /// Completion time of the last build, if any
    pub last_build: Option<DateTime<Utc>>,
}

/// Why a rebuild is needed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RebuildReason {
    /// No build has been recorded yet
    FirstBuild,
    /// A tracked file changed or disappeared
    FileChanged(String),
    /// A source file exists that is not tracked
    UntrackedSource(String),
}

impl std::fmt::Display for RebuildReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::FirstBuild => write!(f, "no previous build recorded"),
            Self::FileChanged(path) => write!(f, "changed: {path}"),
            Self::UntrackedSource(path) => write!(f, "untracked source: {path}"),
        }
    }
}

/// Tracks build state for one project directory.
#[derive(Debug)]
pub struct BuildStateTracker {
    project_dir: PathBuf,
    state_path: PathBuf,
    state: BuildState,
}

impl BuildStateTracker {
    /// Load (or initialize) the tracker for a project.
    ///
    /// A missing or unreadable state file yields empty state; the next save
    /// rewrites it.
    #[must_use]
    pub fn load(project_dir: impl Into<PathBuf>) -> Self {
        let project_dir = project_dir.into();
        let state_path = foundry_utils::paths::build_state_file(&project_dir);
        let state = std::fs::read_to_string(&state_path)
            .ok()
            .and_then(|raw| serde_json::from_str(&raw).ok())
            .unwrap_or_default();
        Self {
            project_dir,
            state_path,
            state,
        }
    }

    /// Current in-memory state.
    #[must_use]
    pub fn state(&self) -> &BuildState {
        &self.state
    }

    /// Record a file produced by a task, hashing current disk content.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read for hashing.
    pub fn track_file(
        &mut self,
        relpath: &str,
        task_id: &str,
        dependencies: Vec<String>,
    ) -> Result<()> {
        let abs = self.project_dir.join(relpath);
        let hash = sha256_file(&abs)
            .with_context(|| format!("failed to hash {relpath} for build state"))?;

        self.state.files.insert(
            relpath.to_string(),
            FileRecord {
                hash,
                last_built: Utc::now(),
                dependencies,
                created_by_task: task_id.to_string(),
            },
        );

        let files = self
            .state
            .task_file_mapping
            .entry(task_id.to_string())
            .or_default();
        if !files.iter().any(|f| f == relpath) {
            files.push(relpath.to_string());
        }

        Ok(())
    }

    /// Mark the build complete and persist state wholesale.
    ///
    /// # Errors
    /// Returns an error on write failure.
    pub fn finish_build(&mut self) -> Result<()> {
        self.state.last_build = Some(Utc::now());
        self.save()
    }

    /// Persist the current state atomically.
    ///
    /// # Errors
    /// Returns an error on write failure.
    pub fn save(&self) -> Result<()> {
        write_json_atomic(&self.state_path, &self.state).context("failed to write build state")
    }

    /// Tracked files whose on-disk content no longer matches the stored
    /// hash, including files that disappeared.
    #[must_use]
    pub fn changed_files(&self) -> Vec<String> {
        let mut changed = Vec::new();
        for (relpath, record) in &self.state.files {
            let abs = self.project_dir.join(relpath);
            match sha256_file(&abs) {
                Ok(hash) if hash == record.hash => {}
                _ => changed.push(relpath.clone()),
            }
        }
        changed
    }

    /// Transitive closure of `changed` over the reverse dependency graph:
    /// every file that lists a changed file (directly or transitively) among
    /// its dependencies, plus the changed files themselves.
    #[must_use]
    pub fn affected_files(&self, changed: &[String]) -> BTreeSet<String> {
        // reverse edges: dependency → dependents
        let mut dependents: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
        for (path, record) in &self.state.files {
            for dep in &record.dependencies {
                dependents.entry(dep.as_str()).or_default().push(path);
            }
        }

        let mut affected: BTreeSet<String> = changed.iter().cloned().collect();
        let mut queue: VecDeque<String> = changed.iter().cloned().collect();
        while let Some(current) = queue.pop_front() {
            if let Some(children) = dependents.get(current.as_str()) {
                for &child in children {
                    if affected.insert(child.to_string()) {
                        queue.push_back(child.to_string());
                    }
                }
            }
        }
        affected
    }

    /// Map affected files back to the tasks that created them.
    #[must_use]
    pub fn affected_tasks(&self, changed: &[String]) -> BTreeSet<String> {
        self.affected_files(changed)
            .iter()
            .filter_map(|path| self.state.files.get(path))
            .map(|record| record.created_by_task.clone())
            .collect()
    }

    /// Whether the next build needs to do work, and why.
    ///
    /// True on the first build, when any tracked file changed, or when an
    /// untracked file with a recognized source extension exists.
    #[must_use]
    pub fn should_rebuild(&self) -> (bool, Vec<RebuildReason>) {
        let mut reasons = Vec::new();

        if self.state.last_build.is_none() {
            reasons.push(RebuildReason::FirstBuild);
        }

        for changed in self.changed_files() {
            reasons.push(RebuildReason::FileChanged(changed));
        }

        for untracked in self.untracked_sources() {
            reasons.push(RebuildReason::UntrackedSource(untracked));
        }

        (!reasons.is_empty(), reasons)
    }

    /// Source files on disk that are not in the tracked set.
    #[must_use]
    pub fn untracked_sources(&self) -> Vec<String> {
        let mut found = Vec::new();
        let mut stack = vec![self.project_dir.clone()];
        while let Some(dir) = stack.pop() {
            let Ok(entries) = std::fs::read_dir(&dir) else {
                continue;
            };
            for entry in entries.flatten() {
                let path = entry.path();
                let name = entry.file_name();
                let name = name.to_string_lossy();
                if path.is_dir() {
                    if !IGNORED_DIRS.contains(&name.as_ref()) {
                        stack.push(path);
                    }
                    continue;
                }
                if !Self::is_source_file(&path) {
                    continue;
                }
                if let Ok(rel) = path.strip_prefix(&self.project_dir) {
                    let rel = rel.to_string_lossy().replace('\\', "/");
                    if !self.state.files.contains_key(&rel) {
                        debug!(file = %rel, "untracked source file");
                        found.push(rel);
                    }
                }
            }
        }
        found.sort();
        found
    }

    fn is_source_file(path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| SOURCE_EXTENSIONS.contains(&ext))
    }

    /// Reset state entirely, forcing a full next build.
    ///
    /// # Errors
    /// Returns an error on write failure.
    pub fn clear(&mut self) -> Result<()> {
        self.state = BuildState::default();
        self.save()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write(project: &Path, rel: &str, content: &str) {
        let path = project.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_first_build_requires_rebuild() {
        let dir = TempDir::new().unwrap();
        let tracker = BuildStateTracker::load(dir.path());
        let (rebuild, reasons) = tracker.should_rebuild();
        assert!(rebuild);
        assert!(reasons.contains(&RebuildReason::FirstBuild));
    }

    #[test]
    fn test_no_changes_no_rebuild() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "x.py", "print('x')");
        write(dir.path(), "y.py", "print('y')");

        let mut tracker = BuildStateTracker::load(dir.path());
        tracker.track_file("x.py", "task_1", vec![]).unwrap();
        tracker.track_file("y.py", "task_2", vec!["x.py".into()]).unwrap();
        tracker.finish_build().unwrap();

        let (rebuild, reasons) = tracker.should_rebuild();
        assert!(!rebuild, "unexpected reasons: {reasons:?}");
        assert!(tracker.changed_files().is_empty());
    }

    #[test]
    fn test_edit_triggers_change_and_affected_closure() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "x.py", "v1");
        write(dir.path(), "y.py", "uses x");
        write(dir.path(), "z.py", "uses y");

        let mut tracker = BuildStateTracker::load(dir.path());
        tracker.track_file("x.py", "task_x", vec![]).unwrap();
        tracker.track_file("y.py", "task_y", vec!["x.py".into()]).unwrap();
        tracker.track_file("z.py", "task_z", vec!["y.py".into()]).unwrap();
        tracker.finish_build().unwrap();

        write(dir.path(), "x.py", "v2");

        let changed = tracker.changed_files();
        assert_eq!(changed, vec!["x.py".to_string()]);

        let affected = tracker.affected_files(&changed);
        assert!(affected.contains("x.py"));
        assert!(affected.contains("y.py"), "direct dependent missing");
        assert!(affected.contains("z.py"), "transitive dependent missing");

        let tasks = tracker.affected_tasks(&changed);
        assert_eq!(
            tasks,
            ["task_x", "task_y", "task_z"]
                .into_iter()
                .map(String::from)
                .collect()
        );
    }

    #[test]
    fn test_missing_file_counts_as_changed() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "a.js", "x");
        let mut tracker = BuildStateTracker::load(dir.path());
        tracker.track_file("a.js", "t", vec![]).unwrap();
        tracker.finish_build().unwrap();

        fs::remove_file(dir.path().join("a.js")).unwrap();
        assert_eq!(tracker.changed_files(), vec!["a.js".to_string()]);
    }

    #[test]
    fn test_untracked_source_detected() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "a.py", "x");
        let mut tracker = BuildStateTracker::load(dir.path());
        tracker.track_file("a.py", "t", vec![]).unwrap();
        tracker.finish_build().unwrap();

        write(dir.path(), "new.ts", "fresh");
        write(dir.path(), "notes.txt", "ignored extension");
        write(dir.path(), "node_modules/dep.js", "ignored dir");

        let untracked = tracker.untracked_sources();
        assert_eq!(untracked, vec!["new.ts".to_string()]);

        let (rebuild, reasons) = tracker.should_rebuild();
        assert!(rebuild);
        assert!(reasons.contains(&RebuildReason::UntrackedSource("new.ts".into())));
    }

    #[test]
    fn test_state_persists_across_loads() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "f.css", "body {}");
        {
            let mut tracker = BuildStateTracker::load(dir.path());
            tracker.track_file("f.css", "task_9", vec![]).unwrap();
            tracker.finish_build().unwrap();
        }
        let tracker = BuildStateTracker::load(dir.path());
        assert!(tracker.state().files.contains_key("f.css"));
        assert_eq!(
            tracker.state().task_file_mapping.get("task_9").unwrap(),
            &vec!["f.css".to_string()]
        );
        assert!(tracker.state().last_build.is_some());
    }

    #[test]
    fn test_clear_forces_full_rebuild() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "f.html", "<html>");
        let mut tracker = BuildStateTracker::load(dir.path());
        tracker.track_file("f.html", "t", vec![]).unwrap();
        tracker.finish_build().unwrap();

        tracker.clear().unwrap();
        let (rebuild, reasons) = tracker.should_rebuild();
        assert!(rebuild);
        assert!(reasons.contains(&RebuildReason::FirstBuild));
    }
}
