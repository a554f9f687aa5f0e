//! Builder output grammar
//!
//! Accepted file headers (case-insensitive), each followed by a fenced code
//! block with an optional language hint:
//!
//! - `FILE: path` / `File: path` / `File path: path`
//! - `# File: path` / `## File: path` / `### File: path`
//! - a single backticked path on its own line, e.g. `` `src/foo.py` ``

use once_cell::sync::Lazy;
use regex::Regex;

/// A file parsed out of a builder response, before path normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedFile {
    /// Path exactly as the response stated it
    pub raw_path: String,
    /// Content between the fences
    pub content: String,
}

static HEADER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*(?:#{1,3}\s+)?file(?:\s+path)?\s*:\s*(.+?)\s*$").expect("static regex")
});

static BACKTICK_PATH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*`([^`\s]+\.[A-Za-z0-9]+)`\s*$").expect("static regex"));

static FENCE_OPEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*```[A-Za-z0-9+_.-]*\s*$").expect("static regex"));

static FENCE_CLOSE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*```\s*$").expect("static regex"));

/// Parse every `header + fenced block` pair out of a response.
///
/// Prose between files is ignored, a header without a following fence is
/// dropped, and an unterminated final fence consumes to the end of input.
#[must_use]
pub fn parse_response(response: &str) -> Vec<ParsedFile> {
    let lines: Vec<&str> = response.lines().collect();
    let mut files = Vec::new();
    let mut i = 0;

    while i < lines.len() {
        let Some(raw_path) = match_header(lines[i]) else {
            i += 1;
            continue;
        };

        // Skip blank lines between the header and the fence
        let mut j = i + 1;
        while j < lines.len() && lines[j].trim().is_empty() {
            j += 1;
        }

        if j >= lines.len() || !FENCE_OPEN.is_match(lines[j]) {
            // Header without a code block; not a file
            i += 1;
            continue;
        }

        let mut content_lines = Vec::new();
        let mut k = j + 1;
        while k < lines.len() && !FENCE_CLOSE.is_match(lines[k]) {
            content_lines.push(lines[k]);
            k += 1;
        }

        let mut content = content_lines.join("\n");
        if !content.is_empty() {
            content.push('\n');
        }

        files.push(ParsedFile { raw_path, content });

        i = if k < lines.len() { k + 1 } else { k };
    }

    files
}

/// Try every accepted header form against one line.
fn match_header(line: &str) -> Option<String> {
    if let Some(caps) = HEADER.captures(line) {
        let path = caps[1].trim().trim_matches('`').to_string();
        if !path.is_empty() {
            return Some(path);
        }
    }
    if let Some(caps) = BACKTICK_PATH.captures(line) {
        let candidate = &caps[1];
        // A bare backticked token is only a file header if it looks like a
        // path: an extension alone is too weak for things like `foo.bar`
        // inline code, so require a separator or a known source shape.
        if candidate.contains('/') || candidate.contains('.') {
            return Some(candidate.to_string());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_file_header() {
        let files = parse_response("FILE: src/a.py\n```python\nx = 1\n```\n");
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].raw_path, "src/a.py");
        assert_eq!(files[0].content, "x = 1\n");
    }

    #[test]
    fn test_all_header_variants() {
        let variants = [
            "FILE: a.js",
            "File: a.js",
            "file: a.js",
            "File path: a.js",
            "# File: a.js",
            "## File: a.js",
            "### File: a.js",
        ];
        for header in variants {
            let input = format!("{header}\n```js\n1\n```\n");
            let files = parse_response(&input);
            assert_eq!(files.len(), 1, "header form not recognized: {header}");
            assert_eq!(files[0].raw_path, "a.js");
        }
    }

    #[test]
    fn test_backticked_path_line() {
        let files = parse_response("`src/foo.py`\n```python\npass\n```\n");
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].raw_path, "src/foo.py");
    }

    #[test]
    fn test_backticked_header_path_unwrapped() {
        let files = parse_response("FILE: `src/foo.py`\n```python\npass\n```\n");
        assert_eq!(files[0].raw_path, "src/foo.py");
    }

    #[test]
    fn test_fence_language_hint_and_blank_line_tolerated() {
        let input = "FILE: x.ts\n\n\n```typescript\nlet a;\n```\n";
        let files = parse_response(input);
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].content, "let a;\n");
    }

    #[test]
    fn test_header_without_fence_is_dropped() {
        let files = parse_response("FILE: orphan.py\njust prose, no code\n");
        assert!(files.is_empty());
    }

    #[test]
    fn test_multiple_files_with_prose_between() {
        let input = "intro\n\nFILE: a.py\n```python\n1\n```\n\nsome commentary\n\nFILE: b.py\n```python\n2\n```\nclosing remarks\n";
        let files = parse_response(input);
        assert_eq!(files.len(), 2);
        assert_eq!(files[0].raw_path, "a.py");
        assert_eq!(files[1].raw_path, "b.py");
    }

    #[test]
    fn test_unterminated_fence_consumes_to_end() {
        let files = parse_response("FILE: a.py\n```python\nline1\nline2");
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].content, "line1\nline2\n");
    }

    #[test]
    fn test_inner_code_with_backticks_inline() {
        let input = "FILE: doc.md\n```\nuse `foo` here\n```\n";
        let files = parse_response(input);
        assert_eq!(files[0].content, "use `foo` here\n");
    }

    #[test]
    fn test_empty_block_produces_empty_file() {
        let files = parse_response("FILE: empty.txt\n```\n```\n");
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].content, "");
    }
}
