use crate::error::ToolError;
use crate::tools::{ToolName, ToolOutput, ToolResult};
use serde::Deserialize;
use std::path::Path;
use tokio::fs;

/// Arguments for the Write tool
#[derive(Debug, Deserialize)]
pub struct WriteArgs {
    /// Path to the file to write
    pub file_path: String,
    /// Content to write to the file
    pub content: String,
}

pub async fn run(args: WriteArgs) -> Result<ToolResult, ToolError> {
    let path = Path::new(&args.file_path);
    let created = !path.exists();

    if let Some(parent) = path.parent()
        && !parent.exists()
    {
        fs::create_dir_all(parent).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::PermissionDenied {
                ToolError::permission_denied(parent.display().to_string())
            } else {
                ToolError::Io(e)
            }
        })?;
    }

    fs::write(path, &args.content).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::PermissionDenied {
            ToolError::permission_denied(&args.file_path)
        } else {
            ToolError::Io(e)
        }
    })?;

    Ok(ToolResult::ok(
        ToolName::Write,
        ToolOutput::Write {
            path: args.file_path,
            bytes_written: args.content.len(),
            created,
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn creates_file_and_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/deep/out.txt");

        let result = run(WriteArgs {
            file_path: path.display().to_string(),
            content: "hello".to_string(),
        })
        .await
        .unwrap();

        assert!(result.success);
        let Some(ToolOutput::Write {
            bytes_written,
            created,
            ..
        }) = result.output
        else {
            panic!("expected write output");
        };
        assert!(created);
        assert_eq!(bytes_written, 5);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "hello");
    }

    #[tokio::test]
    async fn overwrite_reports_not_created() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("existing.txt");
        std::fs::write(&path, "old").unwrap();

        let result = run(WriteArgs {
            file_path: path.display().to_string(),
            content: "new".to_string(),
        })
        .await
        .unwrap();

        let Some(ToolOutput::Write { created, .. }) = result.output else {
            panic!("expected write output");
        };
        assert!(!created);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "new");
    }
}
