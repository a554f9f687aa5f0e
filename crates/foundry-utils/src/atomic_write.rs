//! Atomic file operations
//!
//! State files (build state, checkpoints, manifests, cache entries) are
//! written via temp file + fsync + rename so readers never observe a torn
//! write. Text content is normalized to LF line endings.

use anyhow::{Context, Result};
use std::fs;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

/// Atomically write text content to a file.
///
/// Line endings are normalized to LF before writing. Parent directories are
/// created as needed.
///
/// # Errors
/// Returns an error if the temp file cannot be created, written, synced, or
/// renamed over the target.
pub fn write_text_atomic(path: &Path, content: &str) -> Result<()> {
    let normalized = normalize_line_endings(content);
    write_bytes_atomic(path, normalized.as_bytes())
}

/// Atomically write raw bytes to a file.
///
/// # Errors
/// Returns an error if the temp file cannot be created, written, synced, or
/// renamed over the target.
pub fn write_bytes_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create parent directory {}", parent.display()))?;
    }

    let temp_dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut temp_file = NamedTempFile::new_in(temp_dir)
        .with_context(|| format!("failed to create temp file in {}", temp_dir.display()))?;

    temp_file
        .write_all(bytes)
        .context("failed to write temp file")?;
    temp_file
        .as_file()
        .sync_all()
        .context("failed to fsync temp file")?;

    temp_file
        .persist(path)
        .with_context(|| format!("failed to atomically replace {}", path.display()))?;

    Ok(())
}

/// Serialize a value as pretty JSON and write it atomically.
///
/// # Errors
/// Returns an error on serialization or write failure.
pub fn write_json_atomic<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("failed to serialize JSON")?;
    write_text_atomic(path, &json)
}

/// Normalize CRLF and bare CR to LF.
#[must_use]
pub fn normalize_line_endings(content: &str) -> String {
    content.replace("\r\n", "\n").replace('\r', "\n")
}
