//! Context enhancement for fresh user requests.
//!
//! Before the first model call of a new top-level request, the raw
//! utterance is augmented with a context block: the working directory and
//! its listing, plus the first lines of any file the user appears to
//! mention. Files that cannot be read are silently skipped; a mentioned
//! name is only a hint. Automatic continuations never re-run this.

use crate::tools::{self, LsEntry, ToolName, ToolOutput};
use colored::Colorize;
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::{Map, Value};
use std::path::Path;

/// Line cap for auto-read file previews.
pub const FILE_PREVIEW_LINES: usize = 50;

lazy_static! {
    /// Extension-suffixed tokens (main.rs, notes.txt, ...).
    static ref EXT_TOKEN: Regex = Regex::new(r"([A-Za-z0-9_-]+\.[A-Za-z0-9]{1,4})").unwrap();
    /// Path-like tokens (./src/lib.rs, ~/notes, /etc/hosts).
    static ref PATH_TOKEN: Regex = Regex::new(r"([./~][A-Za-z0-9_/.-]+)").unwrap();
    /// Quoted filenames.
    static ref DQUOTED: Regex = Regex::new(r#""([^"]+\.[A-Za-z0-9]{1,4})""#).unwrap();
    static ref SQUOTED: Regex = Regex::new(r"'([^']+\.[A-Za-z0-9]{1,4})'").unwrap();
}

/// Result of enhancing one user utterance.
#[derive(Debug, Clone)]
pub struct EnhancedInput {
    /// The machine-facing copy sent to the model.
    pub enhanced: String,
    /// The human-facing copy echoed to the terminal.
    pub display: String,
    /// Files that were successfully auto-read.
    pub auto_read: Vec<String>,
}

pub struct ContextEnhancer {
    working_dir: String,
}

impl ContextEnhancer {
    pub fn new(working_dir: impl Into<String>) -> Self {
        Self {
            working_dir: working_dir.into(),
        }
    }

    pub async fn enhance(&self, input: &str) -> EnhancedInput {
        let mut enhanced = input.to_string();
        let mut display = input.to_string();

        let mut context = String::from("\n\n--- CONTEXT ---\n");
        context.push_str(&format!("Current directory: {}\n", self.working_dir));

        // Listing the directory for a listing request would just duplicate
        // the work the model is about to do.
        if !looks_like_listing_request(input) {
            match self.list_working_dir().await {
                Some(entries) => {
                    context.push_str("Files and directories:\n");
                    for entry in &entries {
                        context.push_str(&format!("  {}\n", format_entry(entry)));
                    }
                }
                None => context.push_str("Could not list current directory\n"),
            }
        }

        let mut auto_read = Vec::new();
        let mut files_block = String::new();

        for candidate in detect_candidates(input) {
            let Some(content) = self.read_preview(&candidate).await else {
                continue;
            };

            files_block.push_str(&format!("\n--- {} ---\n", candidate));
            files_block.push_str(&content);
            files_block.push_str(&format!("--- End of {} ---\n", candidate));

            highlight(&mut enhanced, &mut display, &candidate);
            auto_read.push(candidate);
        }

        if !files_block.is_empty() {
            context.push_str("\nReferenced files:\n");
            context.push_str(&files_block);
        }

        if !auto_read.is_empty() {
            display.push_str(
                &format!(" (auto-read: {})", auto_read.join(", "))
                    .dimmed()
                    .to_string(),
            );
        }

        enhanced.push_str(&context);

        EnhancedInput {
            enhanced,
            display,
            auto_read,
        }
    }

    async fn list_working_dir(&self) -> Option<Vec<LsEntry>> {
        let mut params = Map::new();
        params.insert(
            "path".to_string(),
            Value::String(self.working_dir.clone()),
        );

        let result = tools::execute(ToolName::Ls, &params, &self.working_dir).await;
        match result.output {
            Some(ToolOutput::Ls { entries, .. }) if result.success => Some(entries),
            _ => None,
        }
    }

    async fn read_preview(&self, candidate: &str) -> Option<String> {
        let resolved = if Path::new(candidate).is_absolute() {
            candidate.to_string()
        } else {
            Path::new(&self.working_dir)
                .join(candidate)
                .display()
                .to_string()
        };

        let mut params = Map::new();
        params.insert("file_path".to_string(), Value::String(resolved));
        params.insert(
            "limit".to_string(),
            Value::Number((FILE_PREVIEW_LINES as i64).into()),
        );

        let result = tools::execute(ToolName::Read, &params, &self.working_dir).await;
        match result.output {
            Some(ToolOutput::Read { content, .. }) if result.success => Some(content),
            _ => None,
        }
    }
}

/// Collect filename-shaped tokens from the utterance, in order of first
/// appearance.
pub fn detect_candidates(input: &str) -> Vec<String> {
    let mut candidates = Vec::new();

    for pattern in [&*EXT_TOKEN, &*PATH_TOKEN, &*DQUOTED, &*SQUOTED] {
        for caps in pattern.captures_iter(input) {
            let name = caps.get(1).unwrap().as_str().to_string();
            if !candidates.contains(&name) {
                candidates.push(name);
            }
        }
    }

    candidates
}

/// Whether the utterance is itself a directory-listing request.
pub fn looks_like_listing_request(input: &str) -> bool {
    let lower = input.trim().to_lowercase();
    lower == "ls"
        || lower.starts_with("ls ")
        || (lower.contains("list")
            && (lower.contains("file") || lower.contains("director") || lower.contains("folder")))
        || lower.contains("what files")
}

fn format_entry(entry: &LsEntry) -> String {
    match entry.kind {
        crate::tools::EntryKind::Directory => format!("{}/", entry.name),
        _ => entry.name.clone(),
    }
}

fn highlight(enhanced: &mut String, display: &mut String, name: &str) {
    let Ok(pattern) = Regex::new(&format!(r"\b{}\b", regex::escape(name))) else {
        return;
    };

    *enhanced = pattern
        .replace_all(enhanced, format!("**{}**", name))
        .to_string();
    *display = pattern
        .replace_all(display, name.yellow().bold().to_string())
        .to_string();
}
