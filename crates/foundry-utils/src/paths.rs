//! Directory layout helpers
//!
//! On-disk layout:
//! - `~/.context-foundry/cache/llm_responses/` — shared response cache
//! - `{project}/.context-foundry/` — blueprints and build state
//! - `checkpoints/sessions/`, `checkpoints/context/{session}/` — checkpoints
//! - `logs/{session}/` — per-session JSONL logs

use camino::Utf8PathBuf;
use std::cell::RefCell;
use std::path::{Path, PathBuf};

// Thread-local override used only in tests to avoid process-global env races.
thread_local! {
    static THREAD_HOME: RefCell<Option<Utf8PathBuf>> = const { RefCell::new(None) };
}

/// Name of the per-project hidden context directory.
pub const CONTEXT_DIR_NAME: &str = ".context-foundry";

/// User-level foundry home: `~/.context-foundry`.
#[must_use]
pub fn foundry_home() -> PathBuf {
    if let Some(home) = THREAD_HOME.with(|h| h.borrow().clone()) {
        return home.into_std_path_buf();
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(CONTEXT_DIR_NAME)
}

/// Shared response-cache directory: `~/.context-foundry/cache/llm_responses`.
#[must_use]
pub fn response_cache_dir() -> PathBuf {
    foundry_home().join("cache").join("llm_responses")
}

/// Per-project blueprint directory: `{project}/.context-foundry`.
#[must_use]
pub fn blueprint_dir(project_dir: &Path) -> PathBuf {
    project_dir.join(CONTEXT_DIR_NAME)
}

/// Build-state file: `{project}/.context-foundry/build_state.json`.
#[must_use]
pub fn build_state_file(project_dir: &Path) -> PathBuf {
    blueprint_dir(project_dir).join("build_state.json")
}

/// Workflow checkpoint directory for a session, relative to the working dir.
#[must_use]
pub fn session_checkpoint_dir() -> PathBuf {
    PathBuf::from("checkpoints").join("sessions")
}

/// Context-manager checkpoint directory for a session.
#[must_use]
pub fn context_checkpoint_dir(session_id: &str) -> PathBuf {
    PathBuf::from("checkpoints").join("context").join(session_id)
}

/// Per-session log directory: `logs/{session}`.
#[must_use]
pub fn session_log_dir(session_id: &str) -> PathBuf {
    PathBuf::from("logs").join(session_id)
}

/// Ensure a directory exists, tolerating concurrent creation.
///
/// # Errors
/// Returns the underlying IO error for anything other than `AlreadyExists`.
pub fn ensure_dir_all(path: &Path) -> std::io::Result<()> {
    match std::fs::create_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Ok(()),
        Err(e) => Err(e),
    }
}

/// Point `foundry_home()` at an isolated directory for the current thread.
///
/// Returns a guard; the override is removed when it drops. Tests use this
/// instead of mutating `HOME`.
#[must_use]
pub fn with_isolated_home(dir: &Path) -> IsolatedHomeGuard {
    let utf8 = Utf8PathBuf::from_path_buf(dir.to_path_buf())
        .unwrap_or_else(|p| Utf8PathBuf::from(p.display().to_string()));
    THREAD_HOME.with(|h| *h.borrow_mut() = Some(utf8));
    IsolatedHomeGuard { _private: () }
}

/// Guard returned by [`with_isolated_home`].
pub struct IsolatedHomeGuard {
    _private: (),
}

impl Drop for IsolatedHomeGuard {
    fn drop(&mut self) {
        THREAD_HOME.with(|h| *h.borrow_mut() = None);
    }
}
