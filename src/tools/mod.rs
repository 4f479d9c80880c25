//! Tool registry and executor.
//!
//! The agent drives a closed set of local tools. Every call goes through
//! [`execute`], which validates required parameters, dispatches to the tool
//! implementation, and always hands back a [`ToolResult`]. Tool failures are
//! data, not errors, so the orchestration loop can keep making progress.

mod bash;
mod edit_file;
mod glob_files;
mod grep;
mod list_dir;
mod read_file;
mod write_file;

pub use list_dir::{EntryKind, LsEntry};

use crate::error::ToolError;
use rig::completion::ToolDefinition;
use serde_json::{Map, Value};
use std::path::Path;

/// The closed set of tools the agent can invoke.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolName {
    Read,
    Write,
    Edit,
    Bash,
    Ls,
    Glob,
    Grep,
}

impl ToolName {
    pub const ALL: [ToolName; 7] = [
        ToolName::Read,
        ToolName::Write,
        ToolName::Edit,
        ToolName::Bash,
        ToolName::Ls,
        ToolName::Glob,
        ToolName::Grep,
    ];

    /// Canonical capitalized identifier, shared by both parser shapes.
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolName::Read => "Read",
            ToolName::Write => "Write",
            ToolName::Edit => "Edit",
            ToolName::Bash => "Bash",
            ToolName::Ls => "LS",
            ToolName::Glob => "Glob",
            ToolName::Grep => "Grep",
        }
    }

    /// The inline tag the model uses for this tool.
    pub fn tag(&self) -> &'static str {
        match self {
            ToolName::Read => "read",
            ToolName::Write => "write",
            ToolName::Edit => "edit",
            ToolName::Bash => "bash",
            ToolName::Ls => "ls",
            ToolName::Glob => "glob",
            ToolName::Grep => "grep",
        }
    }

    /// The function name advertised to function-calling models.
    pub fn function_name(&self) -> &'static str {
        match self {
            ToolName::Read => "read_file",
            ToolName::Write => "write_file",
            ToolName::Edit => "edit_file",
            ToolName::Bash => "execute_bash",
            ToolName::Ls => "list_directory",
            ToolName::Glob => "search_files",
            ToolName::Grep => "search_content",
        }
    }

    /// Parameters that must be present before a call may execute.
    pub fn required_params(&self) -> &'static [&'static str] {
        match self {
            ToolName::Read => &["file_path"],
            ToolName::Write => &["file_path", "content"],
            ToolName::Edit => &["file_path", "old_string", "new_string"],
            ToolName::Bash => &["command"],
            ToolName::Ls => &["path"],
            ToolName::Glob => &["pattern"],
            ToolName::Grep => &["pattern"],
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|t| t.tag() == tag)
    }

    pub fn from_function_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|t| t.function_name() == name)
    }

    /// Resolve any accepted spelling: function name, inline tag, or the
    /// canonical capitalized identifier.
    pub fn resolve(name: &str) -> Option<Self> {
        Self::from_function_name(name)
            .or_else(|| Self::from_tag(name))
            .or_else(|| Self::ALL.iter().copied().find(|t| t.as_str() == name))
    }
}

impl std::fmt::Display for ToolName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tool-specific fields of a completed call.
#[derive(Debug, Clone)]
pub enum ToolOutput {
    Read {
        path: String,
        content: String,
        total_lines: usize,
        displayed_lines: usize,
    },
    Write {
        path: String,
        bytes_written: usize,
        created: bool,
    },
    Edit {
        path: String,
        replacements: usize,
    },
    Bash {
        command: String,
        stdout: String,
        stderr: String,
        exit_code: i32,
    },
    Ls {
        path: String,
        entries: Vec<LsEntry>,
    },
    Glob {
        pattern: String,
        matches: Vec<String>,
    },
    Grep {
        pattern: String,
        matches: Vec<String>,
    },
}

/// Outcome of one tool call. `error` is set exactly when `success` is false;
/// a failed Bash call may still carry its captured output.
#[derive(Debug, Clone)]
pub struct ToolResult {
    pub tool_name: String,
    pub success: bool,
    pub error: Option<String>,
    pub output: Option<ToolOutput>,
}

impl ToolResult {
    pub fn ok(tool: ToolName, output: ToolOutput) -> Self {
        Self {
            tool_name: tool.as_str().to_string(),
            success: true,
            error: None,
            output: Some(output),
        }
    }

    pub fn failed(tool_name: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            tool_name: tool_name.into(),
            success: false,
            error: Some(error.into()),
            output: None,
        }
    }

    pub fn failed_with(tool: ToolName, error: impl Into<String>, output: ToolOutput) -> Self {
        Self {
            tool_name: tool.as_str().to_string(),
            success: false,
            error: Some(error.into()),
            output: Some(output),
        }
    }

    /// One-line summary fed back to the model as tool-execution feedback.
    pub fn summary(&self) -> String {
        if !self.success {
            let error = self.error.as_deref().unwrap_or("unknown error");
            return format!("{}: Failed - {}", self.tool_name, error);
        }

        match &self.output {
            Some(ToolOutput::Read {
                path,
                displayed_lines,
                ..
            }) => format!(
                "{}: Successfully read {} ({} lines)",
                self.tool_name, path, displayed_lines
            ),
            Some(ToolOutput::Write {
                path,
                bytes_written,
                ..
            }) => format!(
                "{}: Successfully wrote {} bytes to {}",
                self.tool_name, bytes_written, path
            ),
            Some(ToolOutput::Edit { path, replacements }) => format!(
                "{}: Successfully made {} replacements in {}",
                self.tool_name, replacements, path
            ),
            Some(ToolOutput::Bash {
                command, stdout, ..
            }) => {
                let output = if stdout.is_empty() {
                    "(no output)"
                } else {
                    stdout.as_str()
                };
                format!(
                    "{}: Command \"{}\" executed successfully. Output: {}",
                    self.tool_name,
                    command,
                    truncate(output, 2000)
                )
            }
            Some(ToolOutput::Ls { path, entries }) => {
                let listing = entries
                    .iter()
                    .take(50)
                    .map(|e| format!("{} ({})", e.name, e.kind))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!(
                    "{}: Found {} items in {}: {}",
                    self.tool_name,
                    entries.len(),
                    path,
                    listing
                )
            }
            Some(ToolOutput::Glob { pattern, matches }) => {
                format_match_summary(&self.tool_name, "files matching", pattern, matches)
            }
            Some(ToolOutput::Grep { pattern, matches }) => {
                format_match_summary(&self.tool_name, "files containing", pattern, matches)
            }
            None => format!("{}: Succeeded", self.tool_name),
        }
    }
}

fn format_match_summary(tool: &str, kind: &str, pattern: &str, matches: &[String]) -> String {
    if matches.is_empty() {
        return format!("{}: Found 0 {} \"{}\"", tool, kind, pattern);
    }
    let shown: Vec<&str> = matches.iter().take(20).map(|s| s.as_str()).collect();
    let mut summary = format!(
        "{}: Found {} {} \"{}\":\n{}",
        tool,
        matches.len(),
        kind,
        pattern,
        shown.join("\n")
    );
    if matches.len() > shown.len() {
        summary.push_str(&format!("\n... and {} more", matches.len() - shown.len()));
    }
    summary
}

fn truncate(s: &str, max_len: usize) -> &str {
    match s.char_indices().nth(max_len) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Validate the required parameters for a tool before dispatch.
///
/// Parsed calls have already passed this check; it runs again here so the
/// executor boundary holds for any caller.
pub fn validate(tool: ToolName, params: &Map<String, Value>) -> Result<(), ToolError> {
    for key in tool.required_params() {
        let value = params.get(*key);
        let missing = match value {
            None | Some(Value::Null) => true,
            // Write content and edit new_string may legitimately be empty.
            Some(Value::String(s)) => s.is_empty() && *key != "content" && *key != "new_string",
            _ => false,
        };
        if missing {
            return Err(ToolError::invalid_arguments(format!(
                "{} parameter is required",
                key
            )));
        }
    }

    if tool == ToolName::Edit
        && params.get("old_string") == params.get("new_string") {
            return Err(ToolError::invalid_arguments(
                "old_string and new_string cannot be the same",
            ));
        }

    Ok(())
}

/// Execute a call against a tool named by any accepted spelling.
///
/// Unknown names come back as a failure result that lists the available
/// tools; nothing in here panics or propagates an error upward.
pub async fn execute_named(name: &str, params: &Map<String, Value>, working_dir: &str) -> ToolResult {
    match ToolName::resolve(name) {
        Some(tool) => execute(tool, params, working_dir).await,
        None => {
            let available = ToolName::ALL
                .iter()
                .map(|t| t.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            ToolResult::failed(
                name,
                format!("Unknown tool: {}. Available tools: {}", name, available),
            )
        }
    }
}

/// Execute a validated tool call and normalize the outcome into a
/// [`ToolResult`].
pub async fn execute(tool: ToolName, params: &Map<String, Value>, working_dir: &str) -> ToolResult {
    let params = resolved_params(tool, params, working_dir);

    if let Err(e) = validate(tool, &params) {
        return ToolResult::failed(tool.as_str(), e.to_string());
    }

    match dispatch(tool, Value::Object(params)).await {
        Ok(result) => result,
        Err(e) => ToolResult::failed(tool.as_str(), e.to_string()),
    }
}

async fn dispatch(tool: ToolName, args: Value) -> Result<ToolResult, ToolError> {
    match tool {
        ToolName::Read => read_file::run(decode(args)?).await,
        ToolName::Write => write_file::run(decode(args)?).await,
        ToolName::Edit => edit_file::run(decode(args)?).await,
        ToolName::Bash => bash::run(decode(args)?).await,
        ToolName::Ls => list_dir::run(decode(args)?).await,
        ToolName::Glob => glob_files::run(decode(args)?).await,
        ToolName::Grep => grep::run(decode(args)?).await,
    }
}

fn decode<T: serde::de::DeserializeOwned>(args: Value) -> Result<T, ToolError> {
    serde_json::from_value(args).map_err(|e| ToolError::invalid_arguments(e.to_string()))
}

/// Resolve relative paths against the working directory and inject search
/// defaults, so the tools themselves only ever see concrete paths.
fn resolved_params(
    tool: ToolName,
    params: &Map<String, Value>,
    working_dir: &str,
) -> Map<String, Value> {
    let mut params = params.clone();

    let absolutize = |value: &mut Value| {
        let resolved = match value {
            Value::String(s) if !s.is_empty() && !Path::new(s.as_str()).is_absolute() => {
                Some(Path::new(working_dir).join(s.as_str()).display().to_string())
            }
            _ => None,
        };
        if let Some(resolved) = resolved {
            *value = Value::String(resolved);
        }
    };

    match tool {
        ToolName::Read | ToolName::Write | ToolName::Edit => {
            if let Some(v) = params.get_mut("file_path") {
                absolutize(v);
            }
        }
        ToolName::Ls => {
            if let Some(v) = params.get_mut("path") {
                absolutize(v);
            }
        }
        ToolName::Bash => {
            params
                .entry("working_dir".to_string())
                .or_insert_with(|| Value::String(working_dir.to_string()));
        }
        ToolName::Glob => {
            let base = params
                .entry("base_dir".to_string())
                .or_insert_with(|| Value::String(working_dir.to_string()));
            absolutize(base);
        }
        ToolName::Grep => {
            let path = params
                .entry("path".to_string())
                .or_insert_with(|| Value::String(working_dir.to_string()));
            absolutize(path);
        }
    }

    params
}

/// Tool definitions advertised to function-calling models.
pub fn definitions(working_dir: &str) -> Vec<ToolDefinition> {
    let cwd_note = format!("Relative paths are resolved from: {}", working_dir);
    vec![
        ToolDefinition {
            name: ToolName::Read.function_name().to_string(),
            description: format!(
                "Read the contents of a file. Returns the file content with line numbers. {}",
                cwd_note
            ),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "file_path": {
                        "type": "string",
                        "description": "Path to the file (absolute or relative to working directory)"
                    },
                    "offset": {
                        "type": "integer",
                        "description": "Optional starting line number (1-indexed)"
                    },
                    "limit": {
                        "type": "integer",
                        "description": "Optional number of lines to read"
                    }
                },
                "required": ["file_path"]
            }),
        },
        ToolDefinition {
            name: ToolName::Write.function_name().to_string(),
            description: format!(
                "Write content to a file. Creates the file if it doesn't exist, or overwrites if it does. {}",
                cwd_note
            ),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "file_path": {
                        "type": "string",
                        "description": "Path to the file (absolute or relative to working directory)"
                    },
                    "content": {
                        "type": "string",
                        "description": "The content to write to the file"
                    }
                },
                "required": ["file_path", "content"]
            }),
        },
        ToolDefinition {
            name: ToolName::Edit.function_name().to_string(),
            description: format!("Edit a file by replacing exact text matches. {}", cwd_note),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "file_path": {
                        "type": "string",
                        "description": "Path to the file (absolute or relative to working directory)"
                    },
                    "old_string": {
                        "type": "string",
                        "description": "The exact text to find and replace"
                    },
                    "new_string": {
                        "type": "string",
                        "description": "The text to replace it with"
                    },
                    "replace_all": {
                        "type": "boolean",
                        "description": "Whether to replace all occurrences (default: false)"
                    }
                },
                "required": ["file_path", "old_string", "new_string"]
            }),
        },
        ToolDefinition {
            name: ToolName::Bash.function_name().to_string(),
            description: format!(
                "Execute a bash command and return the output. Commands run in: {}",
                working_dir
            ),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "command": {
                        "type": "string",
                        "description": "The bash command to execute"
                    },
                    "working_dir": {
                        "type": "string",
                        "description": "Optional working directory (defaults to project root)"
                    },
                    "timeout_secs": {
                        "type": "integer",
                        "description": "Optional timeout in seconds (default: 600)"
                    }
                },
                "required": ["command"]
            }),
        },
        ToolDefinition {
            name: ToolName::Ls.function_name().to_string(),
            description: format!("List the contents of a directory. {}", cwd_note),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "path": {
                        "type": "string",
                        "description": "Path to the directory. Use '.' for the working directory."
                    }
                },
                "required": ["path"]
            }),
        },
        ToolDefinition {
            name: ToolName::Glob.function_name().to_string(),
            description: format!("Find files matching a glob pattern. {}", cwd_note),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "pattern": {
                        "type": "string",
                        "description": "The glob pattern to match files (e.g., '**/*.rs', 'src/*.txt')"
                    },
                    "base_dir": {
                        "type": "string",
                        "description": "Base directory for the search (defaults to working directory)"
                    }
                },
                "required": ["pattern"]
            }),
        },
        ToolDefinition {
            name: ToolName::Grep.function_name().to_string(),
            description: format!(
                "Search file contents for a regex pattern. Returns the paths of matching files. {}",
                cwd_note
            ),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "pattern": {
                        "type": "string",
                        "description": "The regex pattern to search for"
                    },
                    "path": {
                        "type": "string",
                        "description": "Directory to search (defaults to working directory)"
                    },
                    "include": {
                        "type": "string",
                        "description": "Glob filter for files to search (default: '**/*')"
                    },
                    "ignore_case": {
                        "type": "boolean",
                        "description": "Whether to ignore case"
                    },
                    "max_results": {
                        "type": "integer",
                        "description": "Maximum number of results"
                    }
                },
                "required": ["pattern"]
            }),
        },
    ]
}
