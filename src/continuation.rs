//! Continuation policy.
//!
//! After a tool-bearing turn the loop has to decide whether to hand control
//! back to the user or schedule another model turn on its own. Three
//! heuristics are OR-ed together: phrases in the response that announce more
//! work, tool results that imply follow-ups, and task shapes that are
//! visibly unfinished. Two task intents override the lot: exploration tasks
//! always continue (they only stop on user interrupt, bounded by the
//! orchestrator's iteration cap), and explanation tasks are presumed
//! single-turn.

use crate::tools::{ToolOutput, ToolResult};
use lazy_static::lazy_static;
use regex::Regex;
use std::time::Duration;

/// Pause before an automatic continuation, letting output flush first.
pub const CONTINUATION_DELAY: Duration = Duration::from_millis(400);

/// Responses shorter than this with no tool tags and no completion keyword
/// are treated as likely truncated.
pub const TRUNCATED_RESPONSE_LEN: usize = 200;

/// Phrases that signal the model intends to keep going.
const CONTINUATION_PHRASES: &[&str] = &[
    "next i",
    "now i",
    "let me",
    "i need to",
    "i should",
    "i will",
    "continuing",
    "next step",
    "also need",
    "still need",
    "continue",
    "explore",
    "analyze",
];

/// Setup-style commands whose success usually means scaffolding, not done.
const SETUP_COMMANDS: &[&str] = &["npm install", "npm init", "git init"];

/// Words that mark a response as a deliberate wrap-up.
const COMPLETION_KEYWORDS: &[&str] = &["complete", "completed", "done", "finished"];

lazy_static! {
    static ref TOOL_TAG: Regex = Regex::new(r"<(read|write|edit|bash|ls|glob|grep)\b").unwrap();
}

/// What kind of request the active task is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskIntent {
    /// Open-ended looking around; never self-terminates.
    Exploration,
    /// Answer-and-stop; presumed single-turn.
    Explanation,
    /// Making something; checked against the write/setup shape heuristics.
    Build,
    General,
}

/// The active top-level request, set when the user speaks and read by the
/// policy to tailor its heuristics. Lives through the task's automatic
/// continuations.
#[derive(Debug, Default, Clone)]
pub struct TaskContext {
    description: Option<String>,
}

impl TaskContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_task(&mut self, description: &str) {
        self.description = Some(description.to_string());
    }

    pub fn clear(&mut self) {
        self.description = None;
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn intent(&self) -> TaskIntent {
        let Some(desc) = self.description.as_deref() else {
            return TaskIntent::General;
        };
        let desc = desc.to_lowercase();

        if ["explore", "look around", "investigate", "browse"]
            .iter()
            .any(|k| desc.contains(k))
        {
            return TaskIntent::Exploration;
        }
        if ["explain", "describe", "what does", "what is", "how does"]
            .iter()
            .any(|k| desc.contains(k))
        {
            return TaskIntent::Explanation;
        }
        if ["create", "build", "make", "implement"]
            .iter()
            .any(|k| desc.contains(k))
        {
            return TaskIntent::Build;
        }
        TaskIntent::General
    }
}

/// Decide whether the loop must schedule another turn without user input.
pub fn should_continue(response: &str, results: &[ToolResult], task: &TaskContext) -> bool {
    match task.intent() {
        // Exploration never self-terminates on heuristic evidence.
        TaskIntent::Exploration => return true,
        // Explanations are single-turn unless the model itself says more is
        // coming; the result and task-shape heuristics are suppressed.
        TaskIntent::Explanation => return has_continuation_phrase(response),
        _ => {}
    }

    has_continuation_phrase(response)
        || has_more_work_to_do(results)
        || task_looks_incomplete(response, results, task)
}

/// Lexical indicator: the response announces more work, or still carries an
/// unexecuted tool tag.
pub fn has_continuation_phrase(response: &str) -> bool {
    let lower = response.to_lowercase();
    CONTINUATION_PHRASES.iter().any(|p| lower.contains(p)) || TOOL_TAG.is_match(response)
}

/// Tool-result inference: failures invite a retry, search hits invite
/// follow-up reads, setup commands and lone writes imply an unfinished task.
pub fn has_more_work_to_do(results: &[ToolResult]) -> bool {
    results.iter().any(|r| {
        if !r.success {
            return true;
        }
        match &r.output {
            Some(ToolOutput::Glob { matches, .. }) | Some(ToolOutput::Grep { matches, .. }) => {
                !matches.is_empty()
            }
            Some(ToolOutput::Bash { command, .. }) => {
                SETUP_COMMANDS.iter().any(|c| command.contains(c))
            }
            Some(ToolOutput::Write { .. }) => true,
            _ => false,
        }
    })
}

fn task_looks_incomplete(response: &str, results: &[ToolResult], task: &TaskContext) -> bool {
    let wrote = results.iter().any(|r| {
        r.success
            && matches!(
                r.output,
                Some(ToolOutput::Write { .. }) | Some(ToolOutput::Edit { .. })
            )
    });

    if let Some(desc) = task.description() {
        let desc = desc.to_lowercase();

        // Site-building without any file output or directory scaffolding.
        if ["portfolio", "website", "site"].iter().any(|k| desc.contains(k)) {
            let made_dir = results.iter().any(|r| {
                r.success
                    && matches!(&r.output, Some(ToolOutput::Bash { command, .. }) if command.contains("mkdir"))
            });
            if !wrote && !made_dir {
                return true;
            }
        }

        // Creation tasks where only scaffolding commands ran so far.
        if ["create", "build", "make"].iter().any(|k| desc.contains(k)) {
            let setup_ran = results.iter().any(|r| {
                r.success
                    && matches!(&r.output, Some(ToolOutput::Bash { command, .. })
                        if SETUP_COMMANDS.iter().any(|c| command.contains(c)))
            });
            if setup_ran && !wrote {
                return true;
            }
        }
    }

    // A short, tag-less response with no wrap-up wording was probably cut off.
    if !TOOL_TAG.is_match(response) && response.len() < TRUNCATED_RESPONSE_LEN {
        let lower = response.to_lowercase();
        if !COMPLETION_KEYWORDS.iter().any(|k| lower.contains(k)) {
            return true;
        }
    }

    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::ToolName;

    fn task(desc: &str) -> TaskContext {
        let mut task = TaskContext::new();
        task.set_task(desc);
        task
    }

    fn read_result() -> ToolResult {
        ToolResult::ok(
            ToolName::Read,
            ToolOutput::Read {
                path: "a.txt".to_string(),
                content: "     1\thello\n".to_string(),
                total_lines: 1,
                displayed_lines: 1,
            },
        )
    }

    fn glob_result(matches: Vec<String>) -> ToolResult {
        ToolResult::ok(
            ToolName::Glob,
            ToolOutput::Glob {
                pattern: "**/*.rs".to_string(),
                matches,
            },
        )
    }

    fn bash_result(command: &str) -> ToolResult {
        ToolResult::ok(
            ToolName::Bash,
            ToolOutput::Bash {
                command: command.to_string(),
                stdout: String::new(),
                stderr: String::new(),
                exit_code: 0,
            },
        )
    }

    #[test]
    fn exploration_always_continues() {
        let exploring = task("explore the codebase");
        assert!(should_continue(
            "Everything is complete and finished.",
            &[read_result()],
            &exploring
        ));
        assert!(should_continue("", &[], &exploring));
    }

    #[test]
    fn explanation_stops_after_a_clean_read() {
        let explaining = task("explain what this function does");
        assert!(!should_continue(
            "This function sorts the input in place using quicksort.",
            &[read_result()],
            &explaining
        ));
    }

    #[test]
    fn explanation_still_honors_announced_work() {
        let explaining = task("explain what this function does");
        assert!(should_continue(
            "Let me check the callers first.",
            &[read_result()],
            &explaining
        ));
    }

    #[test]
    fn continuation_phrases_match() {
        assert!(has_continuation_phrase("Next I will update the tests."));
        assert!(has_continuation_phrase("I need to fix the import."));
        assert!(!has_continuation_phrase("The refactor is finished."));
    }

    #[test]
    fn residual_tool_tag_counts_as_continuation() {
        assert!(has_continuation_phrase(
            "<read file_path=\"src/main.rs\"></read>"
        ));
    }

    #[test]
    fn glob_matches_imply_more_work() {
        let building = task("build a new feature");
        let results = [glob_result(vec!["src/lib.rs".to_string()])];
        assert!(has_more_work_to_do(&results));
        assert!(should_continue(
            "Task is complete, everything is done and finished.",
            &results,
            &building
        ));
    }

    #[test]
    fn empty_glob_is_not_more_work() {
        assert!(!has_more_work_to_do(&[glob_result(vec![])]));
    }

    #[test]
    fn failures_and_setup_commands_imply_more_work() {
        assert!(has_more_work_to_do(&[ToolResult::failed(
            "Read",
            "File not found: a.txt"
        )]));
        assert!(has_more_work_to_do(&[bash_result("npm install express")]));
        assert!(!has_more_work_to_do(&[bash_result("cat README.md")]));
    }

    #[test]
    fn lone_write_implies_more_work() {
        let write = ToolResult::ok(
            ToolName::Write,
            ToolOutput::Write {
                path: "index.html".to_string(),
                bytes_written: 120,
                created: true,
            },
        );
        assert!(has_more_work_to_do(&[write]));
    }

    #[test]
    fn site_task_without_writes_is_incomplete() {
        let building = task("make me a portfolio website");
        // Long wrap-up text so the truncation heuristic stays out of it.
        let response = format!(
            "The plan for the site is finished and complete. {}",
            "x".repeat(TRUNCATED_RESPONSE_LEN)
        );
        assert!(should_continue(&response, &[read_result()], &building));
    }

    #[test]
    fn short_tagless_response_reads_as_truncated() {
        let generic = task("tidy up the repo");
        assert!(should_continue("Working on it", &[read_result()], &generic));
        assert!(!should_continue(
            "All the requested changes are done.",
            &[read_result()],
            &generic
        ));
    }
}
