//! CLI argument definitions

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Spec-first LLM code-generation pipeline: Scout, Architect, Builder.
#[derive(Debug, Parser)]
#[command(name = "foundry", version, about)]
pub struct Cli {
    /// Verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Build a new project from a task description
    Build {
        /// Project name (becomes the output directory)
        project: String,
        /// Natural-language task description
        task: String,
        /// Output directory (defaults to ./{project})
        #[arg(long)]
        output: Option<PathBuf>,
        /// Pause for approval after scout and architect
        #[arg(long)]
        interactive: bool,
        /// Create a git commit after each builder task
        #[arg(long)]
        git: bool,
    },

    /// Fix a problem in an existing project
    Fix {
        project: String,
        /// Description of the problem
        task: String,
        #[arg(long)]
        output: Option<PathBuf>,
        /// Session id whose task list to resume
        #[arg(long)]
        resume_session: Option<String>,
        /// 1-based task numbers to re-run (comma separated)
        #[arg(long, value_delimiter = ',')]
        resume_tasks: Option<Vec<usize>>,
        #[arg(long)]
        interactive: bool,
        #[arg(long)]
        git: bool,
    },

    /// Extend an existing project with a new capability
    Enhance {
        project: String,
        task: String,
        #[arg(long)]
        output: Option<PathBuf>,
        #[arg(long)]
        interactive: bool,
        #[arg(long)]
        git: bool,
    },

    /// Show a project's session history and blueprint state
    Status {
        project: String,
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// List providers and their models
    Models {
        /// Only show providers with credentials configured
        #[arg(long)]
        configured: bool,
    },

    /// Show the pricing table
    Pricing,

    /// Estimate the cost of a build
    Estimate {
        /// Expected input tokens across the pipeline
        #[arg(long, default_value_t = 200_000)]
        input_tokens: u64,
        /// Expected output tokens across the pipeline
        #[arg(long, default_value_t = 100_000)]
        output_tokens: u64,
    },

    /// Show the effective configuration
    Config,

    /// Response cache maintenance
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },

    /// Pattern library operations (external tool)
    Patterns,

    /// Session analysis reporting (external tool)
    Analyze,

    /// Livestream dashboard (external tool)
    Serve,
}

#[derive(Debug, Subcommand)]
pub enum CacheAction {
    /// Show cache statistics
    Stats,
    /// Remove cache entries
    Clear {
        /// Only remove entries older than this many hours
        #[arg(long)]
        max_age_hours: Option<i64>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_build_parses() {
        let cli = Cli::parse_from(["foundry", "build", "todo-app", "a todo list app", "--git"]);
        match cli.command {
            Command::Build { project, task, git, interactive, .. } => {
                assert_eq!(project, "todo-app");
                assert_eq!(task, "a todo list app");
                assert!(git);
                assert!(!interactive);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_fix_resume_tasks_comma_separated() {
        let cli = Cli::parse_from([
            "foundry",
            "fix",
            "todo-app",
            "broken delete",
            "--resume-session",
            "todo-app_20250101_000000",
            "--resume-tasks",
            "2,4",
        ]);
        match cli.command {
            Command::Fix { resume_tasks, resume_session, .. } => {
                assert_eq!(resume_tasks, Some(vec![2, 4]));
                assert!(resume_session.is_some());
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_cache_clear_with_age() {
        let cli = Cli::parse_from(["foundry", "cache", "clear", "--max-age-hours", "48"]);
        match cli.command {
            Command::Cache { action: CacheAction::Clear { max_age_hours } } => {
                assert_eq!(max_age_hours, Some(48));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
