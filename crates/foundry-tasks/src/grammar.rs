//! `TASKS.md` grammar
//!
//! Tasks are introduced by `### Task ...` headers. Optional metadata lines
//! `- **Files**: a, b, c` and `- **Changes**: ...` follow. The parser is
//! tolerant: extra prose between tasks is kept as task body, and when no
//! headers parse at all, the whole document collapses into a single fallback
//! task with a recorded warning.

use foundry_utils::error::ParseWarning;
use once_cell::sync::Lazy;
use regex::Regex;

/// One task parsed out of `TASKS.md`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedTask {
    /// 1-based position in the document
    pub number: usize,
    /// Header text after "Task" (e.g. "1: Create the backend")
    pub title: String,
    /// Files named by a `- **Files**:` line
    pub files: Vec<String>,
    /// Text of a `- **Changes**:` line
    pub changes: Option<String>,
    /// Everything under the header until the next task
    pub body: String,
}

/// Result of parsing a tasks document.
#[derive(Debug, Clone)]
pub struct ParsedTaskList {
    pub tasks: Vec<ParsedTask>,
    pub warnings: Vec<ParseWarning>,
}

static TASK_HEADER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?im)^\s*#{2,3}\s+Task\b(.*)$").expect("static regex"));

static FILES_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?im)^\s*-\s*\*\*Files?\*\*\s*:\s*(.+)$").expect("static regex"));

static CHANGES_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?im)^\s*-\s*\*\*Changes?\*\*\s*:\s*(.+)$").expect("static regex"));

/// Parse a `TASKS.md` document into an ordered task list.
///
/// Never fails: a document with no recognizable headers produces one
/// fallback task whose body is the whole document, plus a warning.
#[must_use]
pub fn parse_tasks(markdown: &str) -> ParsedTaskList {
    let mut warnings = Vec::new();

    let header_spans: Vec<(usize, usize, String)> = TASK_HEADER
        .captures_iter(markdown)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let title = caps.get(1).map_or("", |m| m.as_str()).trim();
            Some((whole.start(), whole.end(), title.to_string()))
        })
        .collect();

    if header_spans.is_empty() {
        warnings.push(ParseWarning::new(
            "tasks-grammar",
            "no '### Task' headers found; falling back to a single task",
        ));
        return ParsedTaskList {
            tasks: vec![ParsedTask {
                number: 1,
                title: "Implement the project".to_string(),
                files: Vec::new(),
                changes: None,
                body: markdown.to_string(),
            }],
            warnings,
        };
    }

    let mut tasks = Vec::new();
    for (idx, (_, header_end, title)) in header_spans.iter().enumerate() {
        let body_end = header_spans
            .get(idx + 1)
            .map_or(markdown.len(), |next| next.0);
        let body = markdown[*header_end..body_end].trim().to_string();

        let files = FILES_LINE
            .captures(&body)
            .map(|caps| {
                caps[1]
                    .split(',')
                    .map(|f| f.trim().trim_matches('`').to_string())
                    .filter(|f| !f.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        let changes = CHANGES_LINE.captures(&body).map(|caps| caps[1].trim().to_string());

        tasks.push(ParsedTask {
            number: idx + 1,
            title: title.clone(),
            files,
            changes,
            body,
        });
    }

    ParsedTaskList { tasks, warnings }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TASKS_MD: &str = r#"# Task Breakdown

Some preamble the parser must tolerate.

### Task 1: Set up the backend

- **Files**: server.js, package.json
- **Changes**: create the Express server

Details about the server.

### Task 2: Build the frontend

Interleaved commentary.

- **Files**: `src/App.jsx`, src/index.css

### Task 3: Wire them together
"#;

    #[test]
    fn test_parses_all_tasks_in_order() {
        let parsed = parse_tasks(TASKS_MD);
        assert!(parsed.warnings.is_empty());
        assert_eq!(parsed.tasks.len(), 3);
        assert_eq!(parsed.tasks[0].number, 1);
        assert!(parsed.tasks[0].title.contains("Set up the backend"));
        assert_eq!(parsed.tasks[2].number, 3);
    }

    #[test]
    fn test_files_metadata_split_and_unquoted() {
        let parsed = parse_tasks(TASKS_MD);
        assert_eq!(
            parsed.tasks[0].files,
            vec!["server.js".to_string(), "package.json".to_string()]
        );
        assert_eq!(
            parsed.tasks[1].files,
            vec!["src/App.jsx".to_string(), "src/index.css".to_string()]
        );
    }

    #[test]
    fn test_changes_metadata() {
        let parsed = parse_tasks(TASKS_MD);
        assert_eq!(
            parsed.tasks[0].changes.as_deref(),
            Some("create the Express server")
        );
        assert!(parsed.tasks[2].changes.is_none());
    }

    #[test]
    fn test_body_excludes_next_task() {
        let parsed = parse_tasks(TASKS_MD);
        assert!(parsed.tasks[0].body.contains("Details about the server"));
        assert!(!parsed.tasks[0].body.contains("Build the frontend"));
    }

    #[test]
    fn test_headerless_document_falls_back_to_single_task() {
        let parsed = parse_tasks("Just build the whole thing, please.");
        assert_eq!(parsed.tasks.len(), 1);
        assert_eq!(parsed.tasks[0].number, 1);
        assert!(parsed.tasks[0].body.contains("whole thing"));
        assert_eq!(parsed.warnings.len(), 1);
        assert_eq!(parsed.warnings[0].source, "tasks-grammar");
    }

    #[test]
    fn test_two_hash_headers_also_recognized() {
        let parsed = parse_tasks("## Task 1: only one\n\nbody\n");
        assert_eq!(parsed.tasks.len(), 1);
        assert!(parsed.warnings.is_empty());
    }

    #[test]
    fn test_empty_document() {
        let parsed = parse_tasks("");
        assert_eq!(parsed.tasks.len(), 1);
        assert_eq!(parsed.warnings.len(), 1);
    }
}
