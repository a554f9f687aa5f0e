//! Static reference validation
//!
//! For every `.html` file: `<link href>` and `<script src>` targets that are
//! not absolute URLs must resolve to files actually present. For every
//! non-test `.js` file: relative `import ... from '...'` targets must
//! resolve to a created file, appending `.js` when the specifier has no
//! extension.

use crate::{ValidationIssue, ValidationOutcome, Validator};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};

static LINK_HREF: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"<link[^>]*\bhref\s*=\s*["']([^"']+)["']"#).expect("static regex"));

static SCRIPT_SRC: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"<script[^>]*\bsrc\s*=\s*["']([^"']+)["']"#).expect("static regex"));

static JS_IMPORT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?m)^\s*import\s+(?:[^'"]+\s+from\s+)?["']([^"']+)["']"#).expect("static regex")
});

/// Validates intra-project references in HTML and JS files.
#[derive(Debug, Default)]
pub struct ReferenceValidator;

impl ReferenceValidator {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn is_external(target: &str) -> bool {
        target.starts_with("http://")
            || target.starts_with("https://")
            || target.starts_with("//")
            || target.starts_with("data:")
            || target.starts_with('#')
            || target.starts_with("mailto:")
    }

    /// Resolve an HTML reference against the file's directory, or the
    /// project root for root-absolute targets.
    fn resolve_html_target(html_dir: &Path, project_root: &Path, target: &str) -> PathBuf {
        let clean = target.split(['?', '#']).next().unwrap_or(target);
        if let Some(rooted) = clean.strip_prefix('/') {
            project_root.join(rooted)
        } else {
            html_dir.join(clean)
        }
    }

    /// Resolve a relative JS import; bare specifiers (packages) are skipped
    /// by the caller.
    fn resolve_js_import(js_dir: &Path, specifier: &str) -> PathBuf {
        let mut path = js_dir.join(specifier);
        if path.extension().is_none() {
            path.set_extension("js");
        }
        path
    }

    fn collect_files(root: &Path, extension: &str) -> Vec<PathBuf> {
        let mut found = Vec::new();
        let mut stack = vec![root.to_path_buf()];
        while let Some(dir) = stack.pop() {
            let Ok(entries) = std::fs::read_dir(&dir) else {
                continue;
            };
            for entry in entries.flatten() {
                let path = entry.path();
                let name = entry.file_name();
                let name = name.to_string_lossy();
                if path.is_dir() {
                    if name != "node_modules" && !name.starts_with('.') {
                        stack.push(path);
                    }
                } else if path.extension().and_then(|e| e.to_str()) == Some(extension) {
                    found.push(path);
                }
            }
        }
        found.sort();
        found
    }
}

#[async_trait]
impl Validator for ReferenceValidator {
    fn name(&self) -> &'static str {
        "reference"
    }

    async fn validate(&self, project_root: &Path) -> ValidationOutcome {
        let mut issues = Vec::new();

        for html_path in Self::collect_files(project_root, "html") {
            let Ok(content) = std::fs::read_to_string(&html_path) else {
                continue;
            };
            let html_dir = html_path.parent().unwrap_or(project_root);

            for caps in LINK_HREF.captures_iter(&content).chain(SCRIPT_SRC.captures_iter(&content)) {
                let target = &caps[1];
                if Self::is_external(target) || target.is_empty() {
                    continue;
                }
                let resolved = Self::resolve_html_target(html_dir, project_root, target);
                if !resolved.exists() {
                    issues.push(ValidationIssue::new(format!(
                        "{} references missing file: {}",
                        html_path.strip_prefix(project_root).unwrap_or(&html_path).display(),
                        target
                    )));
                }
            }
        }

        for js_path in Self::collect_files(project_root, "js") {
            let rel = js_path
                .strip_prefix(project_root)
                .unwrap_or(&js_path)
                .to_string_lossy()
                .to_string();
            if is_test_file(&rel) {
                continue;
            }
            let Ok(content) = std::fs::read_to_string(&js_path) else {
                continue;
            };
            let js_dir = js_path.parent().unwrap_or(project_root);

            for caps in JS_IMPORT.captures_iter(&content) {
                let specifier = &caps[1];
                if !specifier.starts_with("./") && !specifier.starts_with("../") {
                    continue;
                }
                let resolved = Self::resolve_js_import(js_dir, specifier);
                if !resolved.exists() {
                    issues.push(ValidationIssue::new(format!(
                        "{rel} imports missing module: {specifier}"
                    )));
                }
            }
        }

        if issues.is_empty() {
            ValidationOutcome::pass()
        } else {
            ValidationOutcome::fail(issues)
        }
    }
}

/// Test-file classification matching the extractor's convention.
fn is_test_file(relpath: &str) -> bool {
    let lowered = relpath.to_lowercase();
    lowered
        .split('/')
        .any(|segment| segment == "tests" || segment == "test" || segment.contains("test"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    #[tokio::test]
    async fn test_resolving_references_pass() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "index.html",
            r#"<link href="styles.css"><script src="app.js"></script>"#);
        write(dir.path(), "styles.css", "body {}");
        write(dir.path(), "app.js", "import './util.js';\nimport react from 'react';\n");
        write(dir.path(), "util.js", "export {};");

        let outcome = ReferenceValidator::new().validate(dir.path()).await;
        assert!(outcome.passed, "issues: {:?}", outcome.issues);
    }

    #[tokio::test]
    async fn test_missing_css_reported() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "index.html", r#"<link href="missing.css">"#);

        let outcome = ReferenceValidator::new().validate(dir.path()).await;
        assert!(!outcome.passed);
        assert!(outcome.issues[0].message.contains("missing.css"));
    }

    #[tokio::test]
    async fn test_extensionless_import_resolves_with_js_appended() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "app.js", "import helper from './helper';\n");
        write(dir.path(), "helper.js", "export default 1;");

        let outcome = ReferenceValidator::new().validate(dir.path()).await;
        assert!(outcome.passed, "issues: {:?}", outcome.issues);
    }

    #[tokio::test]
    async fn test_missing_relative_import_reported() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "src/app.js", "import x from './gone';\n");

        let outcome = ReferenceValidator::new().validate(dir.path()).await;
        assert!(!outcome.passed);
        assert!(outcome.issues[0].message.contains("./gone"));
    }

    #[tokio::test]
    async fn test_external_and_package_references_skipped() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "index.html",
            r#"<link href="https://cdn.example/x.css"><script src="//cdn.example/y.js"></script>"#);
        write(dir.path(), "app.js", "import react from 'react';\n");

        let outcome = ReferenceValidator::new().validate(dir.path()).await;
        assert!(outcome.passed);
    }

    #[tokio::test]
    async fn test_test_js_files_exempt_from_import_checks() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "tests/app.test.js", "import x from './missing';\n");

        let outcome = ReferenceValidator::new().validate(dir.path()).await;
        assert!(outcome.passed);
    }

    #[tokio::test]
    async fn test_root_absolute_href_resolves_from_project_root() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "pages/about.html", r#"<link href="/shared.css">"#);
        write(dir.path(), "shared.css", "");

        let outcome = ReferenceValidator::new().validate(dir.path()).await;
        assert!(outcome.passed, "issues: {:?}", outcome.issues);
    }
}
