//! The agent orchestration loop.
//!
//! One [`AgentLoop::chat`] call handles a full top-level user request:
//! enhance the input, send it to the model, parse the response into tool
//! calls, execute them in order, feed the summaries back, and let the
//! continuation policy decide whether to schedule another turn without new
//! user input. Everything below the endpoint boundary is recovered into
//! data; only transport failures abort the turn.

use crate::client::{ChatEndpoint, ChatResponse};
use crate::continuation::{self, CONTINUATION_DELAY, TaskContext};
use crate::diff::UnifiedDiff;
use crate::enhance::ContextEnhancer;
use crate::history::{self, ConversationLog, ConversationTurn};
use crate::parser::{self, ToolCall};
use crate::terminal;
use crate::tools::{self, ToolName, ToolOutput, ToolResult};
use anyhow::{Result, anyhow};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Iteration cap for one chat call. Exploration tasks never self-terminate,
/// so the loop needs a hard bound.
const DEFAULT_MAX_ITERATIONS: usize = 50;

/// Nudge appended when the loop continues without user input.
const CONTINUE_PROMPT: &str =
    "Continue with the next step to complete the user's request. What should you do next?";

/// Instruction for the summarization call after tool execution.
const FOLLOWUP_PROMPT: &str =
    "Provide a helpful response based on these results. Continue with next steps if needed.";

/// Type of file operation recorded for the session summary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileOperation {
    Created,
    Modified,
}

impl std::fmt::Display for FileOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FileOperation::Created => write!(f, "created"),
            FileOperation::Modified => write!(f, "modified"),
        }
    }
}

/// A file touched during the session
#[derive(Debug, Clone)]
pub struct FileChange {
    pub path: String,
    pub operation: FileOperation,
}

/// Estimated token usage across the session
#[derive(Debug, Clone, Default)]
pub struct TokenUsage {
    pub prompt_tokens: usize,
    pub completion_tokens: usize,
    pub total_tokens: usize,
    pub request_count: usize,
}

impl TokenUsage {
    /// Rough estimate: ~4 chars per token, rounded up.
    pub fn estimate_tokens(text: &str) -> usize {
        text.len().div_ceil(4)
    }

    pub fn add_estimated(&mut self, prompt: &str, completion: &str) {
        let prompt_est = Self::estimate_tokens(prompt);
        let completion_est = Self::estimate_tokens(completion);

        self.prompt_tokens += prompt_est;
        self.completion_tokens += completion_est;
        self.total_tokens += prompt_est + completion_est;
        self.request_count += 1;
    }
}

/// The agent loop controller: one conversation, processed strictly
/// turn-by-turn.
pub struct AgentLoop<C: ChatEndpoint> {
    client: C,
    preamble: String,
    log: ConversationLog,
    task: TaskContext,
    enhancer: ContextEnhancer,
    working_directory: String,
    confirm_dangerous: bool,
    quiet: bool,
    cancel_token: CancellationToken,
    max_iterations: usize,
    continuation_delay: Duration,
    file_changes: HashMap<String, FileChange>,
    token_usage: TokenUsage,
    iteration_count: usize,
}

impl<C: ChatEndpoint> AgentLoop<C> {
    pub fn new(
        client: C,
        preamble: String,
        working_directory: String,
        confirm_dangerous: bool,
        cancel_token: CancellationToken,
    ) -> Self {
        Self {
            client,
            preamble,
            log: ConversationLog::new(),
            task: TaskContext::new(),
            enhancer: ContextEnhancer::new(working_directory.clone()),
            working_directory,
            confirm_dangerous,
            quiet: false,
            cancel_token,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            continuation_delay: CONTINUATION_DELAY,
            file_changes: HashMap::new(),
            token_usage: TokenUsage::default(),
            iteration_count: 0,
        }
    }

    pub fn set_max_iterations(&mut self, max_iterations: usize) {
        self.max_iterations = max_iterations;
    }

    pub fn set_quiet(&mut self, quiet: bool) {
        self.quiet = quiet;
    }

    pub fn set_cancel_token(&mut self, token: CancellationToken) {
        self.cancel_token = token;
    }

    #[cfg(test)]
    fn set_continuation_delay(&mut self, delay: Duration) {
        self.continuation_delay = delay;
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }

    pub fn token_usage(&self) -> &TokenUsage {
        &self.token_usage
    }

    pub fn iteration_count(&self) -> usize {
        self.iteration_count
    }

    pub fn history_len(&self) -> usize {
        self.log.len()
    }

    pub fn clear_history(&mut self) {
        self.log.clear();
        self.task.clear();
    }

    pub fn file_changes_count(&self) -> usize {
        self.file_changes.len()
    }

    pub fn get_file_changes_summary(&self) -> Vec<&FileChange> {
        let mut changes: Vec<_> = self.file_changes.values().collect();
        changes.sort_by(|a, b| a.path.cmp(&b.path));
        changes
    }

    /// Process one top-level user request, including any automatic
    /// continuations, and return the final response text.
    pub async fn chat(&mut self, user_input: &str) -> Result<String> {
        // Enhancement runs once per top-level request, never again for
        // automatic continuations.
        let enhanced = self.enhancer.enhance(user_input).await;
        if !self.quiet && enhanced.display != user_input {
            terminal::print_enhanced_prompt(&enhanced.display);
        }

        self.task.set_task(user_input);
        self.log.push(ConversationTurn::user(&enhanced.enhanced));

        let mut continuing = false;
        let mut iterations = 0usize;

        loop {
            // Interrupts take effect between turns, never mid-tool.
            if self.cancel_token.is_cancelled() {
                return Err(anyhow!("agent turn cancelled by user interrupt"));
            }

            iterations += 1;
            self.iteration_count = iterations;
            if iterations > self.max_iterations {
                return Err(anyhow!(
                    "maximum iterations ({}) exceeded; the task did not converge",
                    self.max_iterations
                ));
            }

            let nudge = continuing.then(|| ConversationTurn::system(CONTINUE_PROMPT));
            let response = self.request(nudge).await?;

            let parsed = parser::parse_response(&response);
            if !self.quiet {
                for diagnostic in &parsed.diagnostics {
                    terminal::print_warning(diagnostic);
                }
            }

            if parsed.calls.is_empty() {
                // No tool work left; this is the final answer.
                self.track_usage(&response.content);
                self.log.push(ConversationTurn::assistant(&response.content));
                return Ok(parser::strip_tool_tags(&response.content));
            }

            let results = self.execute_calls(&parsed.calls).await?;

            let tool_context = format!(
                "{}\n{}",
                history::TOOL_RESULTS_HEADER,
                results
                    .iter()
                    .map(|r| r.summary())
                    .collect::<Vec<_>>()
                    .join("\n")
            );
            self.log.push(ConversationTurn::assistant(&response.content));
            self.log.push(ConversationTurn::system(tool_context));

            // Summarization call: let the model react to the results.
            let follow_up = self
                .request(Some(ConversationTurn::system(FOLLOWUP_PROMPT)))
                .await?;
            self.track_usage(&follow_up.content);
            self.log.push(ConversationTurn::assistant(&follow_up.content));

            if continuation::should_continue(&follow_up.content, &results, &self.task) {
                // Deferred rather than immediate, so pending output gets a
                // chance to flush before the next turn starts.
                tokio::time::sleep(self.continuation_delay).await;
                continuing = true;
                continue;
            }

            return Ok(parser::strip_tool_tags(&follow_up.content));
        }
    }

    /// One endpoint call: the system prompt goes out fresh every time; the
    /// optional extra turn (continue nudge or follow-up instruction) is not
    /// recorded in the log.
    async fn request(&self, extra: Option<ConversationTurn>) -> Result<ChatResponse> {
        let mut turns = self.log.turns().to_vec();
        if let Some(turn) = extra {
            turns.push(turn);
        }

        let spinner = (!self.quiet).then(terminal::create_thinking_spinner);

        let result = self
            .client
            .send(
                &self.preamble,
                &turns,
                &tools::definitions(&self.working_directory),
            )
            .await;

        if let Some(spinner) = spinner {
            terminal::clear_spinner(&spinner);
        }

        // Transport failures abort the whole turn; no retry here.
        result.map_err(|e| anyhow!(e))
    }

    /// Execute parsed calls sequentially, in parse order. A later call may
    /// depend on the side effects of an earlier one.
    async fn execute_calls(&mut self, calls: &[ToolCall]) -> Result<Vec<ToolResult>> {
        let mut results = Vec::with_capacity(calls.len());

        for call in calls {
            if !self.quiet {
                terminal::print_tool_header(call.name.as_str());
                for (key, value) in &call.params {
                    let display = match value.as_str() {
                        Some(s) => s.to_string(),
                        None => value.to_string(),
                    };
                    terminal::print_tool_arg(key, &display);
                }

                if let Some(diff) = self.preview_diff(call).await
                    && diff.has_changes()
                {
                    print!("{}", diff.render());
                }
            }

            self.confirm_if_dangerous(call)?;

            let spinner = (!self.quiet).then(|| terminal::create_tool_spinner(call.name.as_str()));
            let result = tools::execute(call.name, &call.params, &self.working_directory).await;
            if let Some(spinner) = spinner {
                terminal::clear_spinner(&spinner);
            }

            self.record_file_change(call, &result);
            if !self.quiet {
                terminal::print_tool_result(&result);
            }

            results.push(result);
        }

        Ok(results)
    }

    /// Gate dangerous bash commands and writes to sensitive paths behind a
    /// confirmation. Declining stops the whole turn, like the user saying
    /// "don't".
    fn confirm_if_dangerous(&self, call: &ToolCall) -> Result<()> {
        if !self.confirm_dangerous {
            return Ok(());
        }

        let prompt = match call.name {
            ToolName::Bash => call
                .params
                .get("command")
                .and_then(|c| c.as_str())
                .and_then(terminal::is_dangerous_command)
                .map(|pattern| format!("Dangerous command detected ({})", pattern)),
            ToolName::Write => call
                .params
                .get("file_path")
                .and_then(|p| p.as_str())
                .and_then(|path| {
                    terminal::is_dangerous_path(path)
                        .map(|pattern| format!("Writing to sensitive path ({}): {}", pattern, path))
                }),
            _ => None,
        };

        if let Some(message) = prompt {
            match terminal::confirm(&message) {
                Ok(true) => {}
                _ => {
                    return Err(anyhow!(
                        "Operation cancelled by user. Please provide new instructions."
                    ));
                }
            }
        }

        Ok(())
    }

    /// Build a diff preview for write/edit calls before they run.
    async fn preview_diff(&self, call: &ToolCall) -> Option<UnifiedDiff> {
        let file_path = call.params.get("file_path")?.as_str()?;
        let path = self.resolve(file_path);

        match call.name {
            ToolName::Write => {
                let new_content = call.params.get("content")?.as_str()?;
                let old_content = if path.exists() {
                    tokio::fs::read_to_string(&path).await.unwrap_or_default()
                } else {
                    String::new()
                };
                Some(UnifiedDiff::from_texts(file_path, &old_content, new_content))
            }
            ToolName::Edit => {
                let old_string = call.params.get("old_string")?.as_str()?;
                let new_string = call.params.get("new_string")?.as_str()?;
                let old_content = tokio::fs::read_to_string(&path).await.ok()?;
                if !old_content.contains(old_string) {
                    return None;
                }
                let replace_all = call
                    .params
                    .get("replace_all")
                    .and_then(|v| v.as_bool())
                    .unwrap_or(false);
                let new_content = if replace_all {
                    old_content.replace(old_string, new_string)
                } else {
                    old_content.replacen(old_string, new_string, 1)
                };
                Some(UnifiedDiff::from_texts(file_path, &old_content, &new_content))
            }
            _ => None,
        }
    }

    fn record_file_change(&mut self, call: &ToolCall, result: &ToolResult) {
        if !result.success {
            return;
        }

        let operation = match &result.output {
            Some(ToolOutput::Write { created: true, .. }) => FileOperation::Created,
            Some(ToolOutput::Write { created: false, .. }) | Some(ToolOutput::Edit { .. }) => {
                FileOperation::Modified
            }
            _ => return,
        };

        if let Some(path) = call.params.get("file_path").and_then(|p| p.as_str()) {
            let path = self.resolve(path).display().to_string();
            self.file_changes
                .insert(path.clone(), FileChange { path, operation });
        }
    }

    fn resolve(&self, path: &str) -> std::path::PathBuf {
        if Path::new(path).is_absolute() {
            Path::new(path).to_path_buf()
        } else {
            Path::new(&self.working_directory).join(path)
        }
    }

    fn track_usage(&mut self, completion: &str) {
        let prompt_text = format!(
            "{}\n{}",
            self.preamble,
            self.log
                .turns()
                .iter()
                .map(|t| t.content.as_str())
                .collect::<Vec<_>>()
                .join("\n")
        );
        self.token_usage.add_estimated(&prompt_text, completion);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{EndpointError, StructuredCall};
    use crate::history::Role;
    use async_trait::async_trait;
    use rig::completion::ToolDefinition;
    use std::collections::VecDeque;
    use std::sync::Arc;
    use tokio::sync::Mutex;

    /// Endpoint that replays a fixed script of responses.
    #[derive(Clone, Default)]
    struct ScriptedEndpoint {
        responses: Arc<Mutex<VecDeque<ChatResponse>>>,
        requests: Arc<Mutex<Vec<Vec<ConversationTurn>>>>,
    }

    impl ScriptedEndpoint {
        fn with_text_responses(texts: &[&str]) -> Self {
            let endpoint = Self::default();
            {
                let mut responses = endpoint.responses.try_lock().unwrap();
                for text in texts {
                    responses.push_back(ChatResponse {
                        content: text.to_string(),
                        tool_calls: Vec::new(),
                    });
                }
            }
            endpoint
        }

        fn push_structured(&self, name: &str, arguments: &str) {
            self.responses.try_lock().unwrap().push_back(ChatResponse {
                content: String::new(),
                tool_calls: vec![StructuredCall {
                    name: name.to_string(),
                    arguments: arguments.to_string(),
                }],
            });
        }

        async fn request_count(&self) -> usize {
            self.requests.lock().await.len()
        }
    }

    #[async_trait]
    impl ChatEndpoint for ScriptedEndpoint {
        async fn send(
            &self,
            _preamble: &str,
            turns: &[ConversationTurn],
            _tools: &[ToolDefinition],
        ) -> Result<ChatResponse, EndpointError> {
            self.requests.lock().await.push(turns.to_vec());
            self.responses
                .lock()
                .await
                .pop_front()
                .ok_or_else(|| EndpointError::Request("script exhausted".to_string()))
        }
    }

    fn agent(
        endpoint: ScriptedEndpoint,
        working_dir: &str,
    ) -> AgentLoop<ScriptedEndpoint> {
        let mut agent = AgentLoop::new(
            endpoint,
            "You are a coding agent.".to_string(),
            working_dir.to_string(),
            false,
            CancellationToken::new(),
        );
        agent.set_quiet(true);
        agent.set_continuation_delay(Duration::ZERO);
        agent
    }

    #[tokio::test]
    async fn plain_answer_returns_without_tool_work() {
        let dir = tempfile::tempdir().unwrap();
        let endpoint = ScriptedEndpoint::with_text_responses(&[
            "Rust is a systems programming language. Answer complete.",
        ]);
        let mut agent = agent(endpoint.clone(), dir.path().to_str().unwrap());

        let reply = agent.chat("what is rust").await.unwrap();

        assert!(reply.contains("systems programming"));
        assert_eq!(endpoint.request_count().await, 1);
    }

    #[tokio::test]
    async fn inline_read_call_feeds_summary_back() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "hello").unwrap();

        let endpoint = ScriptedEndpoint::with_text_responses(&[
            "<read file_path=\"a.txt\"></read>",
            "The file holds a single greeting. Task complete, all done.",
        ]);
        let mut agent = agent(endpoint.clone(), dir.path().to_str().unwrap());

        let reply = agent.chat("show me a.txt please").await.unwrap();

        assert!(reply.contains("single greeting"));
        assert_eq!(endpoint.request_count().await, 2);

        // The tool summary went into the log as a system turn.
        let summary_turn = agent
            .log
            .turns()
            .iter()
            .find(|t| t.is_tool_summary())
            .expect("tool summary turn");
        assert!(summary_turn.content.contains("Successfully read"));
        assert!(summary_turn.content.contains("a.txt (1 lines)"));
    }

    #[tokio::test]
    async fn glob_matches_trigger_one_automatic_continuation() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("lib.rs"), "pub fn x() {}").unwrap();

        let endpoint = ScriptedEndpoint::with_text_responses(&[
            "<glob pattern=\"*.rs\"></glob>",
            "Let me read the matching file next.",
            "Everything is reviewed. Task complete and finished.",
        ]);
        let mut agent = agent(endpoint.clone(), dir.path().to_str().unwrap());

        let reply = agent.chat("tidy the crate sources").await.unwrap();

        assert!(reply.contains("Task complete"));
        // Initial turn + follow-up + one continuation turn.
        assert_eq!(endpoint.request_count().await, 3);

        // The continuation request carried the nudge as its last turn.
        let requests = endpoint.requests.lock().await;
        let last = requests[2].last().unwrap();
        assert_eq!(last.role, Role::System);
        assert!(last.content.contains("Continue with the next step"));
    }

    #[tokio::test]
    async fn structured_write_records_file_change() {
        let dir = tempfile::tempdir().unwrap();
        let endpoint = ScriptedEndpoint::default();
        endpoint.push_structured(
            "write_file",
            r#"{"file_path": "out.txt", "content": "data"}"#,
        );
        // The lone write marks the task as possibly partial, so the loop
        // continues once before the wrap-up.
        endpoint.responses.try_lock().unwrap().push_back(ChatResponse {
            content: "Now I will verify the output.".to_string(),
            tool_calls: Vec::new(),
        });
        endpoint.responses.try_lock().unwrap().push_back(ChatResponse {
            content: "The file is written. Task complete and done.".to_string(),
            tool_calls: Vec::new(),
        });

        let mut agent = agent(endpoint.clone(), dir.path().to_str().unwrap());
        let reply = agent.chat("save the data").await.unwrap();

        assert!(reply.contains("Task complete"));
        assert!(dir.path().join("out.txt").exists());
        assert_eq!(agent.file_changes_count(), 1);
        let changes = agent.get_file_changes_summary();
        assert_eq!(changes[0].operation, FileOperation::Created);
    }

    #[tokio::test]
    async fn transport_failure_aborts_the_turn() {
        let dir = tempfile::tempdir().unwrap();
        let endpoint = ScriptedEndpoint::default();
        let mut agent = agent(endpoint, dir.path().to_str().unwrap());

        let err = agent.chat("anything").await.unwrap_err();
        assert!(err.to_string().contains("script exhausted"));
    }

    #[tokio::test]
    async fn cancelled_token_stops_before_the_first_request() {
        let dir = tempfile::tempdir().unwrap();
        let endpoint = ScriptedEndpoint::with_text_responses(&["unused"]);
        let mut agent = agent(endpoint.clone(), dir.path().to_str().unwrap());
        agent.cancel_token.cancel();

        let err = agent.chat("anything").await.unwrap_err();
        assert!(err.to_string().contains("cancelled"));
        assert_eq!(endpoint.request_count().await, 0);
    }

    #[tokio::test]
    async fn iteration_cap_stops_a_runaway_loop() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("lib.rs"), "x").unwrap();

        let endpoint = ScriptedEndpoint::with_text_responses(&[
            "<glob pattern=\"*.rs\"></glob>",
            "Let me keep going.",
            "<glob pattern=\"*.rs\"></glob>",
            "Let me keep going.",
        ]);
        let mut agent = agent(endpoint, dir.path().to_str().unwrap());
        agent.set_max_iterations(2);

        let err = agent.chat("explore the project").await.unwrap_err();
        assert!(err.to_string().contains("maximum iterations"));
    }

    #[test]
    fn token_estimation_rounds_up() {
        assert_eq!(TokenUsage::estimate_tokens(""), 0);
        assert_eq!(TokenUsage::estimate_tokens("abcd"), 1);
        assert_eq!(TokenUsage::estimate_tokens("abcde"), 2);

        let mut usage = TokenUsage::default();
        usage.add_estimated("12345678", "1234");
        assert_eq!(usage.prompt_tokens, 2);
        assert_eq!(usage.completion_tokens, 1);
        assert_eq!(usage.total_tokens, 3);
        assert_eq!(usage.request_count, 1);
    }
}
