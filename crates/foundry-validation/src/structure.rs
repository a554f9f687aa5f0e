//! Project structure validation
//!
//! Framework-specific layout rules, keyed off `package.json`:
//! react-scripts projects need `public/index.html` and `src/index.js` (and a
//! stray `src/index.html` is flagged), Vite projects need a root
//! `index.html`, and Tailwind projects warn when the config files are
//! missing.

use crate::{ValidationIssue, ValidationOutcome, Validator};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

/// Detected project flavor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectType {
    ReactScripts,
    Vite,
    Node,
    Static,
}

#[derive(Debug, Default, Deserialize)]
struct PackageJson {
    #[serde(default)]
    dependencies: BTreeMap<String, String>,
    #[serde(default, rename = "devDependencies")]
    dev_dependencies: BTreeMap<String, String>,
}

impl PackageJson {
    fn has_dependency(&self, name: &str) -> bool {
        self.dependencies.contains_key(name) || self.dev_dependencies.contains_key(name)
    }
}

fn read_package_json(project_root: &Path) -> Option<PackageJson> {
    let raw = std::fs::read_to_string(project_root.join("package.json")).ok()?;
    serde_json::from_str(&raw).ok()
}

/// Classify a project from its files.
#[must_use]
pub fn detect_project_type(project_root: &Path) -> ProjectType {
    match read_package_json(project_root) {
        Some(pkg) if pkg.has_dependency("react-scripts") => ProjectType::ReactScripts,
        Some(pkg) if pkg.has_dependency("vite") => ProjectType::Vite,
        Some(_) => ProjectType::Node,
        None => ProjectType::Static,
    }
}

/// Validates framework-expected file layout.
#[derive(Debug, Default)]
pub struct StructureValidator;

impl StructureValidator {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Validator for StructureValidator {
    fn name(&self) -> &'static str {
        "structure"
    }

    async fn validate(&self, project_root: &Path) -> ValidationOutcome {
        let Some(pkg) = read_package_json(project_root) else {
            // Static projects have no structural contract to check
            return ValidationOutcome::pass();
        };

        let mut issues = Vec::new();
        let mut warnings = Vec::new();

        if pkg.has_dependency("react-scripts") {
            if !project_root.join("public/index.html").exists() {
                issues.push(ValidationIssue::new(
                    "react-scripts project is missing public/index.html",
                ));
            }
            if !project_root.join("src/index.js").exists() {
                issues.push(ValidationIssue::new(
                    "react-scripts project is missing src/index.js",
                ));
            }
            if project_root.join("src/index.html").exists() {
                issues.push(ValidationIssue::new(
                    "react-scripts project has a stray src/index.html; the HTML shell belongs in public/",
                ));
            }
        } else if pkg.has_dependency("vite") && !project_root.join("index.html").exists() {
            issues.push(ValidationIssue::new("vite project is missing a root index.html"));
        }

        if pkg.has_dependency("tailwindcss") {
            if !project_root.join("tailwind.config.js").exists() {
                warnings.push("tailwindcss is declared but tailwind.config.js is missing".to_string());
            }
            if !project_root.join("postcss.config.js").exists() {
                warnings.push("tailwindcss is declared but postcss.config.js is missing".to_string());
            }
        }

        ValidationOutcome {
            passed: issues.is_empty(),
            issues,
            warnings,
        }
    }
}
