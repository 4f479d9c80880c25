use crate::error::ToolError;
use crate::tools::{ToolName, ToolOutput, ToolResult};
use serde::Deserialize;
use std::path::Path;
use tokio::fs;

/// Arguments for the Read tool
#[derive(Debug, Deserialize)]
pub struct ReadArgs {
    /// Path to the file to read
    pub file_path: String,
    /// Optional starting line number (1-indexed)
    pub offset: Option<usize>,
    /// Optional number of lines to read
    pub limit: Option<usize>,
}

pub async fn run(args: ReadArgs) -> Result<ToolResult, ToolError> {
    let path = Path::new(&args.file_path);

    if !path.exists() {
        return Err(ToolError::file_not_found(&args.file_path));
    }

    if !path.is_file() {
        return Err(ToolError::invalid_path(format!(
            "{} is not a file",
            args.file_path
        )));
    }

    let contents = fs::read_to_string(path).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::PermissionDenied {
            ToolError::permission_denied(&args.file_path)
        } else {
            ToolError::Io(e)
        }
    })?;

    let lines: Vec<&str> = contents.lines().collect();
    let total_lines = lines.len();

    let start = args.offset.unwrap_or(1).saturating_sub(1);
    let end = args
        .limit
        .map(|l| (start + l).min(total_lines))
        .unwrap_or(total_lines);

    // Format with 1-indexed line numbers
    let mut content = String::new();
    let mut displayed_lines = 0;
    for (idx, line) in lines
        .iter()
        .enumerate()
        .skip(start)
        .take(end.saturating_sub(start))
    {
        content.push_str(&format!("{:>6}\t{}\n", idx + 1, line));
        displayed_lines += 1;
    }

    Ok(ToolResult::ok(
        ToolName::Read,
        ToolOutput::Read {
            path: args.file_path,
            content,
            total_lines,
            displayed_lines,
        },
    ))
}
