//! Path normalization and containment
//!
//! Raw paths from LLM output arrive in many shapes: absolute, prefixed with
//! the project name, or prefixed with `examples/{project}`. All of them must
//! normalize to the same relative target, and nothing may resolve above the
//! project root.

use foundry_utils::error::ArtifactError;
use std::path::PathBuf;

/// Normalize a raw extracted path to a clean project-relative path.
///
/// - strips a leading `/` (absolute paths are treated as project-relative)
/// - strips a duplicate `{project}/` or `examples/{project}/` prefix
/// - collapses `.` segments
/// - rejects any `..` traversal that would climb above the root
///
/// # Errors
/// Returns `ArtifactError::PathEscape` when traversal escapes the root.
pub fn normalize_relpath(raw: &str, project_name: &str) -> Result<String, ArtifactError> {
    let mut path = raw.trim().replace('\\', "/");

    while let Some(stripped) = path.strip_prefix('/') {
        path = stripped.to_string();
    }

    let examples_prefix = format!("examples/{project_name}/");
    let project_prefix = format!("{project_name}/");
    if let Some(stripped) = path.strip_prefix(&examples_prefix) {
        path = stripped.to_string();
    } else if let Some(stripped) = path.strip_prefix(&project_prefix) {
        path = stripped.to_string();
    }

    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if segments.pop().is_none() {
                    return Err(ArtifactError::PathEscape(PathBuf::from(raw)));
                }
            }
            other => segments.push(other),
        }
    }

    if segments.is_empty() {
        return Err(ArtifactError::PathEscape(PathBuf::from(raw)));
    }

    Ok(segments.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_leading_slash_stripped() {
        assert_eq!(normalize_relpath("/src/a.py", "demo").unwrap(), "src/a.py");
    }

    #[test]
    fn test_prefix_forms_normalize_identically() {
        let forms = ["/src/a.py", "demo/src/a.py", "examples/demo/src/a.py", "src/a.py"];
        for form in forms {
            assert_eq!(
                normalize_relpath(form, "demo").unwrap(),
                "src/a.py",
                "form {form} did not normalize"
            );
        }
    }

    #[test]
    fn test_dot_segments_collapsed() {
        assert_eq!(
            normalize_relpath("./src/./a.py", "demo").unwrap(),
            "src/a.py"
        );
        assert_eq!(
            normalize_relpath("src/sub/../a.py", "demo").unwrap(),
            "src/a.py"
        );
    }

    #[test]
    fn test_escape_rejected() {
        assert!(normalize_relpath("../outside.py", "demo").is_err());
        assert!(normalize_relpath("src/../../outside.py", "demo").is_err());
        assert!(normalize_relpath("..", "demo").is_err());
    }

    #[test]
    fn test_empty_rejected() {
        assert!(normalize_relpath("", "demo").is_err());
        assert!(normalize_relpath("/", "demo").is_err());
        assert!(normalize_relpath(".", "demo").is_err());
    }

    #[test]
    fn test_backslashes_treated_as_separators() {
        assert_eq!(
            normalize_relpath("src\\components\\App.jsx", "demo").unwrap(),
            "src/components/App.jsx"
        );
    }

    proptest! {
        /// No normalized output ever contains a traversal segment.
        #[test]
        fn prop_no_traversal_survives(raw in "[a-z./]{1,40}") {
            if let Ok(normalized) = normalize_relpath(&raw, "demo") {
                prop_assert!(!normalized.split('/').any(|s| s == ".."));
                prop_assert!(!normalized.starts_with('/'));
            }
        }
    }
}
