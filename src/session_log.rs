//! Session JSONL log
//!
//! One JSON object per LLM interaction appended to
//! `logs/{session}/session.jsonl`. Logging is best effort: IO failures are
//! reported once and never fail a call.

use foundry_client::{CallRecord, CostRecorder};
use foundry_utils::paths::ensure_dir_all;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::warn;

/// Appends call records as JSON lines.
pub struct SessionLog {
    path: PathBuf,
    file: Mutex<Option<std::fs::File>>,
}

impl SessionLog {
    /// Open (creating) the log for a session id under `logs/`.
    #[must_use]
    pub fn open(session_id: &str) -> Self {
        Self::open_at(foundry_utils::paths::session_log_dir(session_id).join("session.jsonl"))
    }

    /// Open a log at an explicit path.
    #[must_use]
    pub fn open_at(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let file = path
            .parent()
            .map(ensure_dir_all)
            .transpose()
            .ok()
            .flatten()
            .and_then(|()| {
                std::fs::OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(&path)
                    .ok()
            });
        if file.is_none() {
            warn!(path = %path.display(), "session log unavailable; interactions will not be logged");
        }
        Self {
            path,
            file: Mutex::new(file),
        }
    }

    /// Path this log writes to.
    #[must_use]
    pub fn path(&self) -> &PathBuf {
        &self.path
    }
}

impl CostRecorder for SessionLog {
    fn record(&self, record: &CallRecord) {
        let Ok(line) = serde_json::to_string(record) else {
            return;
        };
        let mut guard = self.file.lock().expect("session log poisoned");
        if let Some(file) = guard.as_mut() {
            if writeln!(file, "{line}").is_err() {
                warn!(path = %self.path.display(), "session log write failed; disabling log");
                *guard = None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use foundry_utils::types::PhaseKind;
    use tempfile::TempDir;

    fn record(phase: PhaseKind) -> CallRecord {
        CallRecord {
            phase,
            provider: "anthropic".to_string(),
            model: "claude-haiku-4-5".to_string(),
            input_tokens: 10,
            output_tokens: 5,
            cached: false,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_records_append_as_json_lines() {
        let dir = TempDir::new().unwrap();
        let log = SessionLog::open_at(dir.path().join("logs/session.jsonl"));
        log.record(&record(PhaseKind::Scout));
        log.record(&record(PhaseKind::Builder));

        let content = std::fs::read_to_string(log.path()).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["phase"], "scout");
        assert_eq!(first["input_tokens"], 10);
    }

    #[test]
    fn test_unwritable_path_degrades_silently() {
        let log = SessionLog::open_at("/nonexistent-root/never/session.jsonl");
        // Must not panic
        log.record(&record(PhaseKind::Scout));
    }
}
