//! Opt-in build validation
//!
//! Runs `npm install` and, when a build script exists, `npm run build` with
//! explicit per-command timeouts. Common module-not-found errors are parsed
//! out of the output so fix tasks can name the missing module exactly.

use crate::{ValidationIssue, ValidationOutcome, Validator};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;
use std::time::Duration;
use tokio::process::Command;
use tracing::{info, warn};

/// Per-command timeout for install and build.
pub const COMMAND_TIMEOUT: Duration = Duration::from_secs(180);

static MODULE_NOT_FOUND: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?:Cannot find module '([^']+)'|Module not found: Error: Can't resolve '([^']+)')"#,
    )
    .expect("static regex")
});

/// Runs the project's install and build commands.
#[derive(Debug, Default)]
pub struct BuildValidator;

impl BuildValidator {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Extract missing-module names from build output.
    #[must_use]
    pub fn parse_missing_modules(output: &str) -> Vec<String> {
        MODULE_NOT_FOUND
            .captures_iter(output)
            .filter_map(|caps| {
                caps.get(1)
                    .or_else(|| caps.get(2))
                    .map(|m| m.as_str().to_string())
            })
            .collect()
    }

    fn has_build_script(project_root: &Path) -> bool {
        std::fs::read_to_string(project_root.join("package.json"))
            .ok()
            .and_then(|raw| serde_json::from_str::<serde_json::Value>(&raw).ok())
            .and_then(|pkg| pkg.get("scripts")?.get("build").cloned())
            .is_some()
    }

    async fn run_command(
        project_root: &Path,
        program: &str,
        args: &[&str],
    ) -> Result<(i32, String, String), ValidationIssue> {
        let cmd_display = format!("{program} {}", args.join(" "));
        info!(command = %cmd_display, "running build command");

        let child = Command::new(program)
            .args(args)
            .current_dir(project_root)
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .kill_on_drop(true)
            .output();

        match tokio::time::timeout(COMMAND_TIMEOUT, child).await {
            Ok(Ok(output)) => {
                let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
                let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
                Ok((output.status.code().unwrap_or(-1), stdout, stderr))
            }
            Ok(Err(e)) => Err(ValidationIssue::new(format!("failed to spawn {cmd_display}: {e}"))
                .with_command(cmd_display, None)),
            Err(_) => {
                warn!(command = %cmd_display, "build command timed out");
                Err(ValidationIssue::new(format!(
                    "{cmd_display} timed out after {}s",
                    COMMAND_TIMEOUT.as_secs()
                ))
                .with_command(cmd_display, None))
            }
        }
    }
}

#[async_trait]
impl Validator for BuildValidator {
    fn name(&self) -> &'static str {
        "build"
    }

    async fn validate(&self, project_root: &Path) -> ValidationOutcome {
        if !project_root.join("package.json").exists() {
            return ValidationOutcome::pass();
        }

        let mut issues = Vec::new();

        match Self::run_command(project_root, "npm", &["install", "--no-audit", "--no-fund"]).await
        {
            Ok((0, _, _)) => {}
            Ok((code, stdout, stderr)) => {
                let mut issue = ValidationIssue::new("npm install failed")
                    .with_command("npm install", Some(code))
                    .with_stderr(&stderr);
                for module in Self::parse_missing_modules(&format!("{stdout}\n{stderr}")) {
                    issue.message = format!("npm install failed; missing module '{module}'");
                }
                issues.push(issue);
            }
            Err(issue) => issues.push(issue),
        }

        if issues.is_empty() && Self::has_build_script(project_root) {
            match Self::run_command(project_root, "npm", &["run", "build"]).await {
                Ok((0, _, _)) => {}
                Ok((code, stdout, stderr)) => {
                    let combined = format!("{stdout}\n{stderr}");
                    let missing = Self::parse_missing_modules(&combined);
                    let message = if missing.is_empty() {
                        "npm run build failed".to_string()
                    } else {
                        format!("npm run build failed; unresolved modules: {}", missing.join(", "))
                    };
                    issues.push(
                        ValidationIssue::new(message)
                            .with_command("npm run build", Some(code))
                            .with_stderr(&stderr),
                    );
                }
                Err(issue) => issues.push(issue),
            }
        }

        if issues.is_empty() {
            ValidationOutcome::pass()
        } else {
            ValidationOutcome::fail(issues)
        }
    }
}
