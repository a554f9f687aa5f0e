//! Artifact extraction from builder output
//!
//! Builder responses interleave prose with `FILE: path` headers followed by
//! fenced code blocks. The extractor parses those into files under a
//! sandboxed project root. The project root is the only permitted write
//! target: any path that resolves outside it is rejected and recorded, never
//! written.

mod parser;
mod paths;

pub use parser::{ParsedFile, parse_response};
pub use paths::normalize_relpath;

use anyhow::{Context, Result};
use foundry_utils::error::ArtifactError;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// One file written by the extractor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenFile {
    /// Path relative to the project root
    pub relpath: String,
    /// Whether the path classifies as a test file
    pub is_test: bool,
}

/// A rejected file and why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedFile {
    pub raw_path: String,
    pub reason: String,
}

/// Outcome of one extraction pass.
#[derive(Debug, Clone, Default)]
pub struct ExtractionReport {
    /// Files written, in response order
    pub written: Vec<WrittenFile>,
    /// Files rejected (path escapes, IO failures)
    pub skipped: Vec<SkippedFile>,
    /// Non-fatal observations (zero files, tests only)
    pub warnings: Vec<String>,
}

impl ExtractionReport {
    /// Count of non-test files written.
    #[must_use]
    pub fn implementation_count(&self) -> usize {
        self.written.iter().filter(|f| !f.is_test).count()
    }

    /// Count of test files written.
    #[must_use]
    pub fn test_count(&self) -> usize {
        self.written.iter().filter(|f| f.is_test).count()
    }
}

/// Parses builder responses and writes files under the project root.
#[derive(Debug, Clone)]
pub struct ArtifactExtractor {
    project_root: PathBuf,
    project_name: String,
}

static REACT_APP_VAR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"%REACT_APP_([A-Za-z0-9_]+)%").expect("static regex"));

impl ArtifactExtractor {
    /// Create an extractor sandboxed to `project_root`.
    #[must_use]
    pub fn new(project_root: impl Into<PathBuf>, project_name: impl Into<String>) -> Self {
        Self {
            project_root: project_root.into(),
            project_name: project_name.into(),
        }
    }

    /// Extract all files from a builder response and write them to disk.
    ///
    /// Path escapes are recorded and skipped; IO failures on one file do not
    /// stop the rest. Returns the report with counts and warnings.
    ///
    /// # Errors
    /// Returns an error only if the project root itself cannot be created.
    pub fn extract(&self, response: &str) -> Result<ExtractionReport> {
        std::fs::create_dir_all(&self.project_root).with_context(|| {
            format!("failed to create project root {}", self.project_root.display())
        })?;

        let mut report = ExtractionReport::default();

        for parsed in parse_response(response) {
            let relpath = match self.sandbox_path(&parsed.raw_path) {
                Ok(rel) => rel,
                Err(e) => {
                    warn!(path = %parsed.raw_path, error = %e, "rejected extracted path");
                    report.skipped.push(SkippedFile {
                        raw_path: parsed.raw_path.clone(),
                        reason: e.to_string(),
                    });
                    continue;
                }
            };

            let content = substitute_placeholders(&parsed.content);
            let target = self.project_root.join(&relpath);

            if let Some(parent) = target.parent() {
                if let Err(e) = std::fs::create_dir_all(parent) {
                    report.skipped.push(SkippedFile {
                        raw_path: parsed.raw_path.clone(),
                        reason: format!("failed to create parent directory: {e}"),
                    });
                    continue;
                }
            }

            match std::fs::write(&target, &content) {
                Ok(()) => {
                    let is_test = is_test_path(&relpath);
                    info!(path = %relpath, is_test, "extracted file");
                    report.written.push(WrittenFile { relpath, is_test });
                }
                Err(e) => {
                    report.skipped.push(SkippedFile {
                        raw_path: parsed.raw_path.clone(),
                        reason: format!("write failed: {e}"),
                    });
                }
            }
        }

        if report.written.is_empty() {
            report
                .warnings
                .push("no files were extracted from the builder response".to_string());
        } else if report.implementation_count() == 0 {
            report
                .warnings
                .push("only test files were extracted; no implementation files".to_string());
        }

        Ok(report)
    }

    /// Normalize a raw path and confirm it stays under the project root.
    ///
    /// # Errors
    /// Returns `ArtifactError::PathEscape` for paths that resolve outside
    /// the root.
    pub fn sandbox_path(&self, raw: &str) -> Result<String, ArtifactError> {
        let rel = normalize_relpath(raw, &self.project_name)?;

        // Lexical containment check; targets may not exist yet so
        // canonicalize is unavailable.
        let joined = self.project_root.join(&rel);
        if !joined.starts_with(&self.project_root) {
            return Err(ArtifactError::PathEscape(PathBuf::from(raw)));
        }
        Ok(rel)
    }
}

/// Replace `%PUBLIC_URL%` with the empty string and `%REACT_APP_<NAME>%`
/// with the corresponding environment value (empty when unset).
#[must_use]
pub fn substitute_placeholders(content: &str) -> String {
    let without_public = content.replace("%PUBLIC_URL%", "");
    REACT_APP_VAR
        .replace_all(&without_public, |caps: &regex::Captures<'_>| {
            std::env::var(format!("REACT_APP_{}", &caps[1])).unwrap_or_default()
        })
        .into_owned()
}

/// Whether a relative path counts as a test file: any segment named
/// `tests`, or a file name containing `test`.
#[must_use]
pub fn is_test_path(relpath: &str) -> bool {
    let lowered = relpath.to_lowercase();
    lowered
        .split('/')
        .any(|segment| segment == "tests" || segment == "test" || segment.contains("test"))
}
