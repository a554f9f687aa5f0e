//! Prompt composition and architect output splitting

use foundry_tasks::ParsedTask;
use foundry_utils::error::ParseWarning;
use foundry_utils::types::BuildMode;

/// Section markers the architect is asked to emit.
pub const SPEC_MARKER: &str = "# Specification:";
pub const PLAN_MARKER: &str = "# Implementation Plan:";
pub const TASKS_MARKER: &str = "# Task Breakdown:";

/// Compose the scout (research) prompt for a task and mode.
///
/// For fix/enhance runs against a project with existing blueprints, the
/// prior spec and tasks are prepended so the scout reasons about the project
/// as it stands.
#[must_use]
pub fn scout_prompt(
    project: &str,
    task: &str,
    mode: BuildMode,
    prior_blueprints: Option<&str>,
) -> String {
    let mut prompt = String::new();

    if let Some(prior) = prior_blueprints {
        prompt.push_str("PRIOR PROJECT CONTEXT (from earlier sessions):\n\n");
        prompt.push_str(prior);
        prompt.push_str("\n\n---\n\n");
    }

    let objective = match mode {
        BuildMode::New => {
            "Research how to build the following project from scratch. Identify \
             the architecture, key components, data flow, and external \
             dependencies a working implementation needs."
        }
        BuildMode::Fix => {
            "Research the existing project with the goal of fixing the problem \
             described below. Identify which components are implicated and what \
             the minimal safe change looks like."
        }
        BuildMode::Enhance => {
            "Research the existing project with the goal of extending it as \
             described below. Identify where the new capability attaches and \
             what must not regress."
        }
    };

    prompt.push_str(&format!(
        "{objective}\n\nPROJECT: {project}\nTASK: {task}\n\n\
         Produce focused research notes in markdown: architecture overview, \
         component breakdown, data flow, dependencies, and risks."
    ));
    prompt
}

/// Compose the architect prompt, embedding the scout's research.
#[must_use]
pub fn architect_prompt(project: &str, task: &str, research: &str) -> String {
    format!(
        "You are planning the implementation of project '{project}'.\n\
         TASK: {task}\n\n\
         RESEARCH NOTES:\n{research}\n\n\
         Produce three sections, each starting with its exact header:\n\
         {SPEC_MARKER} a complete specification of what will be built\n\
         {PLAN_MARKER} the implementation approach, ordered\n\
         {TASKS_MARKER} numbered tasks, each as '### Task N: title' with\n\
         '- **Files**: ...' and '- **Changes**: ...' lines"
    )
}

/// Compose the builder prompt for one parsed task.
///
/// `files_created` lists exact paths earlier tasks produced so the builder
/// references them instead of inventing parallel structures.
#[must_use]
pub fn builder_task_prompt(project: &str, task: &ParsedTask, files_created: &[String]) -> String {
    let mut prompt = format!(
        "Implement the following task for project '{project}'.\n\n\
         ### Task {}{}\n\n{}\n\n\
         Output every file as:\nFILE: relative/path\n\
         followed by a fenced code block with the complete file contents. \
         Produce complete files, not fragments.",
        task.number,
        if task.title.is_empty() {
            String::new()
        } else {
            format!(" {}", task.title.trim_start_matches(':').trim())
        },
        task.body
    );

    if !files_created.is_empty() {
        prompt.push_str(
            "\n\nPrevious tasks created these exact paths; reference them rather \
             than creating duplicates:\n",
        );
        for file in files_created {
            prompt.push_str(&format!("- {file}\n"));
        }
    }

    prompt
}

/// Compose a self-contained prompt for one builder subagent task.
///
/// Subagent prompts carry everything the worker needs: objective, sources,
/// boundaries, and the output contract. They never rely on shared history.
#[must_use]
pub fn subagent_builder_prompt(task: &foundry_tasks::SubagentTask) -> String {
    let mut prompt = format!("{}\n", task.objective);

    if !task.sources.is_empty() {
        prompt.push_str("\nIN SCOPE:\n");
        for source in &task.sources {
            prompt.push_str(&format!("- {source}\n"));
        }
    }
    if !task.boundaries.is_empty() {
        prompt.push_str(&format!("\nDO NOT TOUCH: {}\n", task.boundaries));
    }
    if !task.output_format.is_empty() {
        prompt.push_str(&format!("\nEXPECTED OUTPUT: {}\n", task.output_format));
    }

    prompt.push_str(
        "\nOutput every file as:\nFILE: relative/path\nfollowed by a fenced \
         code block with the complete file contents.",
    );
    prompt
}

/// Split architect output into `(spec, plan, tasks)` by the section markers.
///
/// When any marker is missing, the whole response is returned for all three
/// sections and a warning is recorded.
#[must_use]
pub fn split_architect_output(response: &str) -> (String, String, String, Vec<ParseWarning>) {
    let spec_at = response.find(SPEC_MARKER);
    let plan_at = response.find(PLAN_MARKER);
    let tasks_at = response.find(TASKS_MARKER);

    match (spec_at, plan_at, tasks_at) {
        (Some(s), Some(p), Some(t)) if s < p && p < t => {
            let spec = response[s..p].trim().to_string();
            let plan = response[p..t].trim().to_string();
            let tasks = response[t..].trim().to_string();
            (spec, plan, tasks, Vec::new())
        }
        _ => {
            let warning = ParseWarning::new(
                "architect-output",
                "section markers missing or out of order; writing full response to all three blueprints",
            );
            let whole = response.trim().to_string();
            (whole.clone(), whole.clone(), whole, vec![warning])
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scout_prompt_modes_differ() {
        let new = scout_prompt("p", "t", BuildMode::New, None);
        let fix = scout_prompt("p", "t", BuildMode::Fix, None);
        assert!(new.contains("from scratch"));
        assert!(fix.contains("fixing"));
    }

    #[test]
    fn test_scout_prompt_prepends_prior_context() {
        let prompt = scout_prompt("p", "t", BuildMode::Enhance, Some("OLD SPEC"));
        let context_at = prompt.find("OLD SPEC").unwrap();
        let task_at = prompt.find("TASK: t").unwrap();
        assert!(context_at < task_at);
    }

    #[test]
    fn test_split_well_formed_architect_output() {
        let response = format!(
            "preamble\n{SPEC_MARKER} the spec\nbody\n{PLAN_MARKER} the plan\nsteps\n{TASKS_MARKER} tasks\n### Task 1: x\n"
        );
        let (spec, plan, tasks, warnings) = split_architect_output(&response);
        assert!(warnings.is_empty());
        assert!(spec.starts_with(SPEC_MARKER));
        assert!(spec.contains("the spec"));
        assert!(!spec.contains("the plan"));
        assert!(plan.starts_with(PLAN_MARKER));
        assert!(tasks.contains("### Task 1"));
    }

    #[test]
    fn test_split_missing_markers_falls_back_whole() {
        let response = "just one blob of planning text";
        let (spec, plan, tasks, warnings) = split_architect_output(response);
        assert_eq!(spec, response);
        assert_eq!(plan, response);
        assert_eq!(tasks, response);
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].source, "architect-output");
    }

    #[test]
    fn test_split_out_of_order_markers_falls_back() {
        let response = format!("{TASKS_MARKER} t\n{SPEC_MARKER} s\n{PLAN_MARKER} p\n");
        let (_, _, _, warnings) = split_architect_output(&response);
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn test_builder_prompt_lists_created_files() {
        let task = ParsedTask {
            number: 2,
            title: ": Frontend".to_string(),
            files: vec![],
            changes: None,
            body: "build the UI".to_string(),
        };
        let prompt =
            builder_task_prompt("demo", &task, &["server.js".to_string(), "db.js".to_string()]);
        assert!(prompt.contains("### Task 2 Frontend"));
        assert!(prompt.contains("- server.js"));
        assert!(prompt.contains("- db.js"));
        assert!(prompt.contains("exact paths"));
    }

    #[test]
    fn test_builder_prompt_without_created_files() {
        let task = ParsedTask {
            number: 1,
            title: String::new(),
            files: vec![],
            changes: None,
            body: "start".to_string(),
        };
        let prompt = builder_task_prompt("demo", &task, &[]);
        assert!(!prompt.contains("exact paths"));
    }
}
