use thiserror::Error;

/// Common error type for all tools
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Command timed out after {0} seconds")]
    CommandTimeout(u64),

    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("Pattern error: {0}")]
    PatternError(String),
}

impl ToolError {
    pub fn file_not_found(path: impl Into<String>) -> Self {
        Self::FileNotFound(path.into())
    }

    pub fn permission_denied(path: impl Into<String>) -> Self {
        Self::PermissionDenied(path.into())
    }

    pub fn invalid_path(path: impl Into<String>) -> Self {
        Self::InvalidPath(path.into())
    }

    pub fn invalid_arguments(msg: impl Into<String>) -> Self {
        Self::InvalidArguments(msg.into())
    }

    pub fn pattern_error(msg: impl Into<String>) -> Self {
        Self::PatternError(msg.into())
    }
}
