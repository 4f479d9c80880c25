use crate::error::ToolError;
use crate::tools::{ToolName, ToolOutput, ToolResult};
use serde::Deserialize;
use std::path::Path;
use tokio::fs;

/// Arguments for the LS tool
#[derive(Debug, Deserialize)]
pub struct LsArgs {
    /// Path to the directory to list
    pub path: String,
}

/// Kind of a directory entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Directory,
    File,
    Symlink,
}

impl std::fmt::Display for EntryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntryKind::Directory => write!(f, "directory"),
            EntryKind::File => write!(f, "file"),
            EntryKind::Symlink => write!(f, "symlink"),
        }
    }
}

/// One entry of a directory listing
#[derive(Debug, Clone)]
pub struct LsEntry {
    pub name: String,
    pub kind: EntryKind,
}

pub async fn run(args: LsArgs) -> Result<ToolResult, ToolError> {
    let path = Path::new(&args.path);

    if !path.exists() {
        return Err(ToolError::file_not_found(&args.path));
    }

    if !path.is_dir() {
        return Err(ToolError::invalid_path(format!(
            "{} is not a directory",
            args.path
        )));
    }

    let mut entries = Vec::new();
    let mut read_dir = fs::read_dir(path).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::PermissionDenied {
            ToolError::permission_denied(&args.path)
        } else {
            ToolError::Io(e)
        }
    })?;

    while let Some(entry) = read_dir.next_entry().await? {
        let name = entry.file_name().to_string_lossy().to_string();
        let file_type = entry.file_type().await?;

        let kind = if file_type.is_dir() {
            EntryKind::Directory
        } else if file_type.is_symlink() {
            EntryKind::Symlink
        } else {
            EntryKind::File
        };

        entries.push(LsEntry { name, kind });
    }

    // Directories first, then files, alphabetically within each group
    entries.sort_by(|a, b| {
        let a_dir = a.kind == EntryKind::Directory;
        let b_dir = b.kind == EntryKind::Directory;
        b_dir.cmp(&a_dir).then_with(|| a.name.cmp(&b.name))
    });

    Ok(ToolResult::ok(
        ToolName::Ls,
        ToolOutput::Ls {
            path: args.path,
            entries,
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn lists_directories_before_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("zz.txt"), "").unwrap();
        std::fs::write(dir.path().join("aa.txt"), "").unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();

        let result = run(LsArgs {
            path: dir.path().display().to_string(),
        })
        .await
        .unwrap();

        let Some(ToolOutput::Ls { entries, .. }) = result.output else {
            panic!("expected ls output");
        };
        let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["sub", "aa.txt", "zz.txt"]);
        assert_eq!(entries[0].kind, EntryKind::Directory);
    }

    #[tokio::test]
    async fn file_path_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("plain.txt");
        std::fs::write(&file, "").unwrap();

        let err = run(LsArgs {
            path: file.display().to_string(),
        })
        .await
        .unwrap_err();
        assert!(err.to_string().contains("not a directory"));
    }
}
