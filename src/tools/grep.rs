use crate::error::ToolError;
use crate::tools::{ToolName, ToolOutput, ToolResult};
use glob::glob;
use regex::RegexBuilder;
use serde::Deserialize;
use tokio::fs;

/// Directories never worth searching
const IGNORED_COMPONENTS: &[&str] = &["node_modules", ".git", "target", "dist", "build"];

/// Default cap on the number of matching files reported
const DEFAULT_MAX_RESULTS: usize = 50;

/// Arguments for the Grep tool
#[derive(Debug, Deserialize)]
pub struct GrepArgs {
    /// The regex pattern to search for
    pub pattern: String,
    /// Directory to search (defaults to the working directory)
    pub path: Option<String>,
    /// Glob filter for files to search (default: all files)
    pub include: Option<String>,
    /// Case insensitive search
    pub ignore_case: Option<bool>,
    /// Maximum number of matching files to return
    pub max_results: Option<usize>,
}

pub async fn run(args: GrepArgs) -> Result<ToolResult, ToolError> {
    let regex = RegexBuilder::new(&args.pattern)
        .case_insensitive(args.ignore_case.unwrap_or(false))
        .build()
        .map_err(|e| ToolError::pattern_error(e.to_string()))?;

    let base = args.path.as_deref().unwrap_or(".").trim_end_matches('/');
    let include = args.include.as_deref().unwrap_or("**/*");
    let full_pattern = format!("{}/{}", base, include);

    let entries = glob(&full_pattern).map_err(|e| ToolError::pattern_error(e.to_string()))?;
    let max_results = args.max_results.unwrap_or(DEFAULT_MAX_RESULTS);

    let mut matches: Vec<String> = Vec::new();
    for entry in entries.flatten() {
        if matches.len() >= max_results {
            break;
        }
        if !entry.is_file() {
            continue;
        }
        if entry
            .components()
            .any(|c| IGNORED_COMPONENTS.contains(&c.as_os_str().to_string_lossy().as_ref()))
        {
            continue;
        }
        // Binary and unreadable files are skipped, not errors
        let Ok(contents) = fs::read_to_string(&entry).await else {
            continue;
        };
        if regex.is_match(&contents) {
            matches.push(entry.display().to_string());
        }
    }

    matches.sort();

    Ok(ToolResult::ok(
        ToolName::Grep,
        ToolOutput::Grep {
            pattern: args.pattern,
            matches,
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(pattern: &str, path: &std::path::Path) -> GrepArgs {
        GrepArgs {
            pattern: pattern.to_string(),
            path: Some(path.display().to_string()),
            include: None,
            ignore_case: None,
            max_results: None,
        }
    }

    #[tokio::test]
    async fn finds_files_containing_pattern() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("hit.txt"), "needle in here").unwrap();
        std::fs::write(dir.path().join("miss.txt"), "nothing").unwrap();

        let result = run(args("needle", dir.path())).await.unwrap();

        let Some(ToolOutput::Grep { matches, .. }) = result.output else {
            panic!("expected grep output");
        };
        assert_eq!(matches.len(), 1);
        assert!(matches[0].ends_with("hit.txt"));
    }

    #[tokio::test]
    async fn ignore_case_widens_the_match() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("shout.txt"), "NEEDLE").unwrap();

        let mut grep_args = args("needle", dir.path());
        grep_args.ignore_case = Some(true);
        let result = run(grep_args).await.unwrap();

        let Some(ToolOutput::Grep { matches, .. }) = result.output else {
            panic!("expected grep output");
        };
        assert_eq!(matches.len(), 1);
    }

    #[tokio::test]
    async fn bad_regex_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = run(args("(unclosed", dir.path())).await.unwrap_err();
        assert!(matches!(err, ToolError::PatternError(_)));
    }
}
