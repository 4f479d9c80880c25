use crate::error::ToolError;
use crate::tools::{ToolName, ToolOutput, ToolResult};
use serde::Deserialize;
use std::path::Path;
use tokio::fs;

/// Arguments for the Edit tool
#[derive(Debug, Deserialize)]
pub struct EditArgs {
    /// Path to the file to edit
    pub file_path: String,
    /// The exact text to find and replace
    pub old_string: String,
    /// The text to replace it with
    pub new_string: String,
    /// Whether to replace all occurrences (default: false)
    pub replace_all: Option<bool>,
}

pub async fn run(args: EditArgs) -> Result<ToolResult, ToolError> {
    if args.old_string == args.new_string {
        return Err(ToolError::invalid_arguments(
            "old_string and new_string cannot be the same",
        ));
    }

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

    if !contents.contains(&args.old_string) {
        return Err(ToolError::invalid_arguments(format!(
            "The string to replace was not found in {}. Make sure the old_string matches exactly, including whitespace.",
            args.file_path
        )));
    }

    let (new_contents, replacements) = if args.replace_all.unwrap_or(false) {
        let count = contents.matches(&args.old_string).count();
        (contents.replace(&args.old_string, &args.new_string), count)
    } else {
        (contents.replacen(&args.old_string, &args.new_string, 1), 1)
    };

    fs::write(path, &new_contents).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::PermissionDenied {
            ToolError::permission_denied(&args.file_path)
        } else {
            ToolError::Io(e)
        }
    })?;

    Ok(ToolResult::ok(
        ToolName::Edit,
        ToolOutput::Edit {
            path: args.file_path,
            replacements,
        },
    ))
}
