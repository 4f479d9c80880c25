use crate::error::ToolError;
use crate::tools::{ToolName, ToolOutput, ToolResult};
use glob::glob;
use serde::Deserialize;

/// Directories never worth searching
const IGNORED_COMPONENTS: &[&str] = &["node_modules", ".git", "target", "dist", "build"];

/// Arguments for the Glob tool
#[derive(Debug, Deserialize)]
pub struct GlobArgs {
    /// The glob pattern to match files
    pub pattern: String,
    /// Base directory for the search (defaults to the working directory)
    pub base_dir: Option<String>,
}

pub async fn run(args: GlobArgs) -> Result<ToolResult, ToolError> {
    let full_pattern = match &args.base_dir {
        Some(base) => format!("{}/{}", base.trim_end_matches('/'), args.pattern),
        None => args.pattern.clone(),
    };

    let entries = glob(&full_pattern).map_err(|e| ToolError::pattern_error(e.to_string()))?;

    let mut matches: Vec<String> = Vec::new();
    for entry in entries.flatten() {
        if !entry.is_file() {
            continue;
        }
        if entry
            .components()
            .any(|c| IGNORED_COMPONENTS.contains(&c.as_os_str().to_string_lossy().as_ref()))
        {
            continue;
        }
        matches.push(entry.display().to_string());
    }

    matches.sort();

    Ok(ToolResult::ok(
        ToolName::Glob,
        ToolOutput::Glob {
            pattern: args.pattern,
            matches,
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn matches_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.rs"), "").unwrap();
        std::fs::write(dir.path().join("b.rs"), "").unwrap();
        std::fs::write(dir.path().join("c.txt"), "").unwrap();

        let result = run(GlobArgs {
            pattern: "*.rs".to_string(),
            base_dir: Some(dir.path().display().to_string()),
        })
        .await
        .unwrap();

        let Some(ToolOutput::Glob { matches, .. }) = result.output else {
            panic!("expected glob output");
        };
        assert_eq!(matches.len(), 2);
        assert!(matches[0].ends_with("a.rs"));
        assert!(matches[1].ends_with("b.rs"));
    }

    #[tokio::test]
    async fn skips_ignored_directories() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("node_modules/pkg")).unwrap();
        std::fs::write(dir.path().join("node_modules/pkg/index.js"), "").unwrap();
        std::fs::write(dir.path().join("app.js"), "").unwrap();

        let result = run(GlobArgs {
            pattern: "**/*.js".to_string(),
            base_dir: Some(dir.path().display().to_string()),
        })
        .await
        .unwrap();

        let Some(ToolOutput::Glob { matches, .. }) = result.output else {
            panic!("expected glob output");
        };
        assert_eq!(matches.len(), 1);
        assert!(matches[0].ends_with("app.js"));
    }

    #[tokio::test]
    async fn invalid_pattern_is_an_error() {
        let err = run(GlobArgs {
            pattern: "[".to_string(),
            base_dir: None,
        })
        .await
        .unwrap_err();
        assert!(matches!(err, ToolError::PatternError(_)));
    }
}
