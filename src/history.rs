//! Bounded, task-aware conversation history.
//!
//! The log grows by append only. Once it exceeds [`PRUNE_THRESHOLD`] turns it
//! is pruned down to the most recent [`RECENT_WINDOW`] turns plus up to
//! [`SUMMARY_RETAIN`] of the most recent tool-summary system turns from the
//! discarded prefix, preserving relative order. The originating user turn of
//! the still-open task is never dropped.
//!
//! The system prompt is not part of the log; the orchestrator prepends it
//! fresh on every endpoint call, so pruning can never lose it.

/// Prune only once the log exceeds this many turns.
pub const PRUNE_THRESHOLD: usize = 50;

/// Number of most recent turns kept verbatim when pruning.
pub const RECENT_WINDOW: usize = 30;

/// Maximum tool-summary system turns rescued from the pruned prefix.
pub const SUMMARY_RETAIN: usize = 10;

/// Prefix marking a system turn that carries tool-execution feedback.
pub const TOOL_RESULTS_HEADER: &str = "Tool execution results:";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
    System,
}

/// One turn of the dialogue sent to the model.
#[derive(Debug, Clone)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: String,
}

impl ConversationTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    /// Whether this turn is a system turn summarizing tool executions.
    pub fn is_tool_summary(&self) -> bool {
        self.role == Role::System && self.content.starts_with(TOOL_RESULTS_HEADER)
    }
}

/// Append-only conversation log that prunes itself past the threshold.
#[derive(Debug, Default)]
pub struct ConversationLog {
    turns: Vec<ConversationTurn>,
}

impl ConversationLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, turn: ConversationTurn) {
        self.turns.push(turn);
        if self.turns.len() > PRUNE_THRESHOLD {
            self.turns = prune(&self.turns);
        }
    }

    pub fn turns(&self) -> &[ConversationTurn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn clear(&mut self) {
        self.turns.clear();
    }
}

/// Produce a pruned copy of the log.
///
/// Returns the input unchanged while it is at or under [`PRUNE_THRESHOLD`].
/// The retained subset is always in original relative order.
pub fn prune(turns: &[ConversationTurn]) -> Vec<ConversationTurn> {
    if turns.len() <= PRUNE_THRESHOLD {
        return turns.to_vec();
    }

    let split = turns.len() - RECENT_WINDOW;
    let prefix = &turns[..split];

    // Most recent tool summaries from the discarded prefix, oldest first.
    let mut keep: Vec<usize> = prefix
        .iter()
        .enumerate()
        .rev()
        .filter(|(_, t)| t.is_tool_summary())
        .take(SUMMARY_RETAIN)
        .map(|(idx, _)| idx)
        .collect();
    keep.reverse();

    // The open task's originating user turn is the most recent user turn;
    // continuations never add user turns, so this is always the right one.
    if let Some(origin) = turns.iter().rposition(|t| t.role == Role::User)
        && origin < split
        && !keep.contains(&origin)
    {
        keep.push(origin);
        keep.sort_unstable();
    }

    keep.into_iter()
        .map(|idx| turns[idx].clone())
        .chain(turns[split..].iter().cloned())
        .collect()
}
