use crate::error::ToolError;
use crate::tools::{ToolName, ToolOutput, ToolResult};
use serde::Deserialize;
use std::process::Stdio;
use tokio::process::Command;
use tokio::time::{Duration, timeout};

/// Default command timeout in seconds
const DEFAULT_TIMEOUT_SECS: u64 = 600;

/// Arguments for the Bash tool
#[derive(Debug, Deserialize)]
pub struct BashArgs {
    /// The command to execute
    pub command: String,
    /// Optional working directory
    pub working_dir: Option<String>,
    /// Optional timeout in seconds (default: 600)
    pub timeout_secs: Option<u64>,
}

pub async fn run(args: BashArgs) -> Result<ToolResult, ToolError> {
    let timeout_secs = args.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS);

    let mut cmd = Command::new("bash");
    cmd.arg("-c").arg(&args.command);
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());

    if let Some(ref dir) = args.working_dir {
        cmd.current_dir(dir);
    }

    let output = timeout(Duration::from_secs(timeout_secs), cmd.output())
        .await
        .map_err(|_| ToolError::CommandTimeout(timeout_secs))?
        .map_err(ToolError::Io)?;

    let exit_code = output.status.code().unwrap_or(-1);
    let result = ToolOutput::Bash {
        command: args.command,
        stdout: String::from_utf8_lossy(&output.stdout).trim_end().to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).trim_end().to_string(),
        exit_code,
    };

    if output.status.success() {
        Ok(ToolResult::ok(ToolName::Bash, result))
    } else {
        // Keep the captured output so the model can see what went wrong.
        Ok(ToolResult::failed_with(
            ToolName::Bash,
            format!("command exited with code {}", exit_code),
            result,
        ))
    }
}
