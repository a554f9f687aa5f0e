//! Opt-in runtime validation
//!
//! Starts the generated server on a free port and probes the root plus any
//! declared endpoints for non-404 responses, all within a 30-second budget.
//! Enabled via `FOUNDRY_SMOKE_TEST`.

use crate::{ValidationIssue, ValidationOutcome, Validator};
use async_trait::async_trait;
use std::net::TcpListener;
use std::path::Path;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info};

/// Total budget for startup plus probes.
pub const RUNTIME_BUDGET: Duration = Duration::from_secs(30);

/// Environment variable that opts smoke testing in.
pub const SMOKE_TEST_ENV: &str = "FOUNDRY_SMOKE_TEST";

/// Probes a generated server for liveness.
#[derive(Debug, Default)]
pub struct RuntimeValidator {
    /// Endpoints beyond `/` to probe (from the SPEC blueprint)
    endpoints: Vec<String>,
}

impl RuntimeValidator {
    #[must_use]
    pub fn new(endpoints: Vec<String>) -> Self {
        Self { endpoints }
    }

    /// Whether smoke testing was opted into.
    #[must_use]
    pub fn enabled() -> bool {
        std::env::var(SMOKE_TEST_ENV)
            .map(|v| !matches!(v.to_lowercase().as_str(), "" | "0" | "false" | "no"))
            .unwrap_or(false)
    }

    /// Ask the OS for a free localhost port.
    #[must_use]
    pub fn free_port() -> Option<u16> {
        TcpListener::bind("127.0.0.1:0")
            .ok()
            .and_then(|listener| listener.local_addr().ok())
            .map(|addr| addr.port())
    }

    /// The command that starts this project's server, if one is apparent.
    fn start_command(project_root: &Path) -> Option<(String, Vec<String>)> {
        let has_start_script = std::fs::read_to_string(project_root.join("package.json"))
            .ok()
            .and_then(|raw| serde_json::from_str::<serde_json::Value>(&raw).ok())
            .and_then(|pkg| pkg.get("scripts")?.get("start").cloned())
            .is_some();
        if has_start_script {
            return Some(("npm".to_string(), vec!["start".to_string()]));
        }
        for candidate in ["server.js", "index.js", "app.js"] {
            if project_root.join(candidate).exists() {
                return Some(("node".to_string(), vec![candidate.to_string()]));
            }
        }
        None
    }

    async fn probe(client: &reqwest::Client, url: &str) -> Result<u16, String> {
        match client.get(url).send().await {
            Ok(response) => Ok(response.status().as_u16()),
            Err(e) => Err(e.to_string()),
        }
    }
}

#[async_trait]
impl Validator for RuntimeValidator {
    fn name(&self) -> &'static str {
        "runtime"
    }

    async fn validate(&self, project_root: &Path) -> ValidationOutcome {
        let Some((program, args)) = Self::start_command(project_root) else {
            // Nothing to run; static sites have no runtime contract
            return ValidationOutcome::pass();
        };
        let Some(port) = Self::free_port() else {
            return ValidationOutcome::fail(vec![ValidationIssue::new(
                "could not allocate a free port for the runtime probe",
            )]);
        };

        let cmd_display = format!("{program} {}", args.join(" "));
        info!(command = %cmd_display, port, "starting server for runtime probe");

        let mut child = match Command::new(&program)
            .args(&args)
            .current_dir(project_root)
            .env("PORT", port.to_string())
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::piped())
            .kill_on_drop(true)
            .spawn()
        {
            Ok(child) => child,
            Err(e) => {
                return ValidationOutcome::fail(vec![
                    ValidationIssue::new(format!("failed to start server: {e}"))
                        .with_command(cmd_display, None),
                ]);
            }
        };

        let client = match reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
        {
            Ok(client) => client,
            Err(e) => {
                let _ = child.kill().await;
                return ValidationOutcome::fail(vec![ValidationIssue::new(format!(
                    "probe client construction failed: {e}"
                ))]);
            }
        };

        let base = format!("http://127.0.0.1:{port}");
        let mut issues = Vec::new();

        let result = tokio::time::timeout(RUNTIME_BUDGET, async {
            // Give the server a moment to bind; retry the root probe
            let mut root_status = None;
            for _ in 0..20 {
                tokio::time::sleep(Duration::from_millis(500)).await;
                if let Ok(status) = Self::probe(&client, &base).await {
                    root_status = Some(status);
                    break;
                }
            }

            let Some(status) = root_status else {
                issues.push(
                    ValidationIssue::new("server never answered on the probe port")
                        .with_command(cmd_display.clone(), None),
                );
                return;
            };
            if status == 404 {
                issues.push(ValidationIssue::new("root endpoint returned 404"));
            }
            debug!(status, "root probe answered");

            for endpoint in &self.endpoints {
                let url = format!("{base}/{}", endpoint.trim_start_matches('/'));
                match Self::probe(&client, &url).await {
                    Ok(404) => issues.push(ValidationIssue::new(format!(
                        "declared endpoint {endpoint} returned 404"
                    ))),
                    Ok(_) => {}
                    Err(e) => issues.push(ValidationIssue::new(format!(
                        "declared endpoint {endpoint} unreachable: {e}"
                    ))),
                }
            }
        })
        .await;

        if result.is_err() {
            issues.push(
                ValidationIssue::new(format!(
                    "runtime probes exceeded the {}s budget",
                    RUNTIME_BUDGET.as_secs()
                ))
                .with_command(cmd_display, None),
            );
        }

        let _ = child.kill().await;

        // Attach the server's stderr to the first issue so the self-heal
        // loop can quote the exact error.
        if !issues.is_empty() {
            if let Some(mut stderr) = child.stderr.take() {
                use tokio::io::AsyncReadExt;
                let mut stderr_text = String::new();
                let _ = tokio::time::timeout(
                    Duration::from_secs(2),
                    stderr.read_to_string(&mut stderr_text),
                )
                .await;
                if !stderr_text.trim().is_empty() {
                    let first = issues.remove(0);
                    issues.insert(0, first.with_stderr(&stderr_text));
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

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_free_port_is_usable() {
        let port = RuntimeValidator::free_port().unwrap();
        assert!(port > 0);
    }

    #[test]
    fn test_start_command_prefers_npm_start() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("package.json"),
            r#"{"scripts": {"start": "node server.js"}}"#,
        )
        .unwrap();
        std::fs::write(dir.path().join("server.js"), "").unwrap();

        let (program, args) = RuntimeValidator::start_command(dir.path()).unwrap();
        assert_eq!(program, "npm");
        assert_eq!(args, vec!["start"]);
    }

    #[test]
    fn test_start_command_falls_back_to_node_entry() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("server.js"), "").unwrap();
        let (program, args) = RuntimeValidator::start_command(dir.path()).unwrap();
        assert_eq!(program, "node");
        assert_eq!(args, vec!["server.js"]);
    }

    #[tokio::test]
    async fn test_project_without_server_passes() {
        let dir = TempDir::new().unwrap();
        let outcome = RuntimeValidator::new(vec![]).validate(dir.path()).await;
        assert!(outcome.passed);
    }

    #[test]
    fn test_enabled_flag_parsing() {
        // Relies on the variable being unset in the test environment
        if std::env::var(SMOKE_TEST_ENV).is_err() {
            assert!(!RuntimeValidator::enabled());
        }
    }
}
