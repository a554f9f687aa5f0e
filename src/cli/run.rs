//! CLI dispatch

use crate::cli::args::{Cli, Command};
use crate::cli::commands;
use anyhow::Result;
use foundry_utils::types::{BuildMode, WorkflowStatus};
use foundry_utils::exit_codes;

/// Execute a parsed CLI invocation, returning the process exit code.
///
/// # Errors
/// Command handlers' errors bubble up; `main` maps them to exit code 1 (or
/// 2 for configuration errors).
pub async fn run(cli: Cli) -> Result<i32> {
    match cli.command {
        Command::Build {
            project,
            task,
            output,
            interactive,
            git,
        } => {
            let status = commands::run_workflow(
                BuildMode::New,
                commands::BuildInvocation {
                    project,
                    task,
                    output,
                    interactive,
                    git,
                    resume_session: None,
                    resume_tasks: None,
                },
            )
            .await?;
            Ok(status_exit_code(status))
        }
        Command::Fix {
            project,
            task,
            output,
            resume_session,
            resume_tasks,
            interactive,
            git,
        } => {
            let status = commands::run_workflow(
                BuildMode::Fix,
                commands::BuildInvocation {
                    project,
                    task,
                    output,
                    interactive,
                    git,
                    resume_session,
                    resume_tasks,
                },
            )
            .await?;
            Ok(status_exit_code(status))
        }
        Command::Enhance {
            project,
            task,
            output,
            interactive,
            git,
        } => {
            let status = commands::run_workflow(
                BuildMode::Enhance,
                commands::BuildInvocation {
                    project,
                    task,
                    output,
                    interactive,
                    git,
                    resume_session: None,
                    resume_tasks: None,
                },
            )
            .await?;
            Ok(status_exit_code(status))
        }
        Command::Status { project, output } => {
            commands::show_status(&project, output)?;
            Ok(exit_codes::SUCCESS)
        }
        Command::Models { configured } => {
            commands::list_models(configured);
            Ok(exit_codes::SUCCESS)
        }
        Command::Pricing => {
            commands::show_pricing();
            Ok(exit_codes::SUCCESS)
        }
        Command::Estimate {
            input_tokens,
            output_tokens,
        } => {
            commands::estimate(input_tokens, output_tokens)?;
            Ok(exit_codes::SUCCESS)
        }
        Command::Config => {
            commands::show_config()?;
            Ok(exit_codes::SUCCESS)
        }
        Command::Cache { action } => {
            commands::cache_command(&action)?;
            Ok(exit_codes::SUCCESS)
        }
        Command::Patterns => {
            commands::external_tool_pointer("patterns");
            Ok(exit_codes::SUCCESS)
        }
        Command::Analyze => {
            commands::external_tool_pointer("analyze");
            Ok(exit_codes::SUCCESS)
        }
        Command::Serve => {
            commands::external_tool_pointer("serve");
            Ok(exit_codes::SUCCESS)
        }
    }
}

const fn status_exit_code(status: WorkflowStatus) -> i32 {
    match status {
        WorkflowStatus::Success => exit_codes::SUCCESS,
        WorkflowStatus::Aborted | WorkflowStatus::Error | WorkflowStatus::Incomplete => {
            exit_codes::FAILURE
        }
    }
}
