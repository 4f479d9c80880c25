use crate::session::SessionManager;
use anyhow::Result;
use std::collections::HashMap;
use std::sync::Arc;

/// What the main loop should do after a command ran
#[derive(Debug, Clone)]
pub enum CommandResult {
    /// Nothing further
    Continue,
    /// Exit the application
    Exit,
    /// Clear the agent's conversation history
    ClearHistory,
    /// Show the files changed this session (agent state lives in the main loop)
    ShowFileChanges,
    /// Show estimated token usage
    ShowUsage,
    /// Show the conversation history length
    ShowHistory,
    /// Display an informational message
    Info(String),
    /// Display an error message
    Error(String),
}

/// Context handed to commands during execution
pub struct CommandContext<'a> {
    pub session_manager: &'a mut SessionManager,
    pub cwd: &'a str,
    pub model: &'a str,
}

/// Trait implemented by every slash command
pub trait Command: Send + Sync {
    fn name(&self) -> &str;

    fn aliases(&self) -> Vec<&str> {
        vec![]
    }

    fn description(&self) -> &str;

    fn execute(&self, context: &mut CommandContext, args: Vec<&str>) -> Result<CommandResult>;
}

/// Registry of all available slash commands
pub struct CommandRegistry {
    commands: HashMap<String, Arc<dyn Command>>,
}

impl Default for CommandRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandRegistry {
    pub fn new() -> Self {
        let mut registry = Self {
            commands: HashMap::new(),
        };

        registry.register(Arc::new(HelpCommand));
        registry.register(Arc::new(ExitCommand));
        registry.register(Arc::new(ClearCommand));
        registry.register(Arc::new(HistoryCommand));
        registry.register(Arc::new(UsageCommand));
        registry.register(Arc::new(ChangesCommand));
        registry.register(Arc::new(SessionsCommand));
        registry.register(Arc::new(SaveCommand));
        registry.register(Arc::new(LoadCommand));

        registry
    }

    fn register(&mut self, command: Arc<dyn Command>) {
        self.commands
            .insert(command.name().to_string(), command.clone());
        for alias in command.aliases() {
            self.commands.insert(alias.to_string(), command.clone());
        }
    }

    fn get(&self, name: &str) -> Option<&Arc<dyn Command>> {
        self.commands.get(name)
    }

    fn all_commands(&self) -> Vec<&Arc<dyn Command>> {
        let mut commands: Vec<_> = self.commands.values().collect();
        commands.sort_by_key(|c| c.name());
        commands.dedup_by_key(|c| c.name());
        commands
    }

    /// Commands start with '/'
    pub fn is_command(input: &str) -> bool {
        input.trim().starts_with('/')
    }

    pub fn execute(&self, input: &str, context: &mut CommandContext) -> Result<CommandResult> {
        let Some(input) = input.trim().strip_prefix('/') else {
            return Ok(CommandResult::Error(
                "Commands must start with '/'".to_string(),
            ));
        };

        let parts: Vec<&str> = input.split_whitespace().collect();
        let Some((command_name, args)) = parts.split_first() else {
            return Ok(CommandResult::Error("Empty command".to_string()));
        };

        match self.get(command_name) {
            Some(command) => command.execute(context, args.to_vec()),
            None => Ok(CommandResult::Error(format!(
                "Unknown command: '{}'. Type /help for available commands.",
                command_name
            ))),
        }
    }
}

// ===== Built-in commands =====

struct HelpCommand;

impl Command for HelpCommand {
    fn name(&self) -> &str {
        "help"
    }

    fn description(&self) -> &str {
        "Display this help message"
    }

    fn execute(&self, _context: &mut CommandContext, _args: Vec<&str>) -> Result<CommandResult> {
        let registry = CommandRegistry::new();
        let mut help_text = String::from("Available commands:\n\n");

        for command in registry.all_commands() {
            let aliases = command.aliases();
            let alias_text = if aliases.is_empty() {
                String::new()
            } else {
                format!(" (aliases: {})", aliases.join(", "))
            };
            help_text.push_str(&format!(
                "  /{}{}\n      {}\n",
                command.name(),
                alias_text,
                command.description()
            ));
        }
        help_text.push_str("\nPrefix a line with '!' to run a shell command directly.");

        Ok(CommandResult::Info(help_text))
    }
}

struct ExitCommand;

impl Command for ExitCommand {
    fn name(&self) -> &str {
        "exit"
    }

    fn aliases(&self) -> Vec<&str> {
        vec!["quit", "q"]
    }

    fn description(&self) -> &str {
        "Exit the application"
    }

    fn execute(&self, _context: &mut CommandContext, _args: Vec<&str>) -> Result<CommandResult> {
        Ok(CommandResult::Exit)
    }
}

struct ClearCommand;

impl Command for ClearCommand {
    fn name(&self) -> &str {
        "clear"
    }

    fn aliases(&self) -> Vec<&str> {
        vec!["cls"]
    }

    fn description(&self) -> &str {
        "Clear the conversation history"
    }

    fn execute(&self, _context: &mut CommandContext, _args: Vec<&str>) -> Result<CommandResult> {
        Ok(CommandResult::ClearHistory)
    }
}

struct HistoryCommand;

impl Command for HistoryCommand {
    fn name(&self) -> &str {
        "history"
    }

    fn description(&self) -> &str {
        "Show the conversation history length"
    }

    fn execute(&self, _context: &mut CommandContext, _args: Vec<&str>) -> Result<CommandResult> {
        Ok(CommandResult::ShowHistory)
    }
}

struct UsageCommand;

impl Command for UsageCommand {
    fn name(&self) -> &str {
        "usage"
    }

    fn description(&self) -> &str {
        "Show estimated token usage for this session"
    }

    fn execute(&self, _context: &mut CommandContext, _args: Vec<&str>) -> Result<CommandResult> {
        Ok(CommandResult::ShowUsage)
    }
}

struct ChangesCommand;

impl Command for ChangesCommand {
    fn name(&self) -> &str {
        "changes"
    }

    fn description(&self) -> &str {
        "Show files modified during this session"
    }

    fn execute(&self, _context: &mut CommandContext, _args: Vec<&str>) -> Result<CommandResult> {
        Ok(CommandResult::ShowFileChanges)
    }
}

struct SessionsCommand;

impl Command for SessionsCommand {
    fn name(&self) -> &str {
        "sessions"
    }

    fn description(&self) -> &str {
        "List all saved sessions"
    }

    fn execute(&self, context: &mut CommandContext, _args: Vec<&str>) -> Result<CommandResult> {
        let sessions = context.session_manager.list_sessions()?;

        if sessions.is_empty() {
            return Ok(CommandResult::Info("No saved sessions found.".to_string()));
        }

        let mut output = String::from("Saved sessions:\n\n");
        for session in sessions {
            output.push_str(&format!("  {}\n", session));
        }
        output.push_str("\nUse /load <session_id> to resume a session.");

        Ok(CommandResult::Info(output))
    }
}

struct SaveCommand;

impl Command for SaveCommand {
    fn name(&self) -> &str {
        "save"
    }

    fn description(&self) -> &str {
        "Save the current session"
    }

    fn execute(&self, context: &mut CommandContext, _args: Vec<&str>) -> Result<CommandResult> {
        context.session_manager.save_current_session()?;
        let short_id = context
            .session_manager
            .current_session()
            .map(|s| s.short_id().to_string())
            .unwrap_or_else(|| "unknown".to_string());
        Ok(CommandResult::Info(format!("Session {} saved.", short_id)))
    }
}

struct LoadCommand;

impl Command for LoadCommand {
    fn name(&self) -> &str {
        "load"
    }

    fn description(&self) -> &str {
        "Load a saved session by ID"
    }

    fn execute(&self, context: &mut CommandContext, args: Vec<&str>) -> Result<CommandResult> {
        let Some(session_id) = args.first() else {
            return Ok(CommandResult::Error(
                "Usage: /load <session_id>\nUse /sessions to see available sessions.".to_string(),
            ));
        };

        match context.session_manager.load_by_prefix(session_id) {
            Ok(session) => Ok(CommandResult::Info(format!(
                "Loaded session {} ({} entries)",
                session.short_id(),
                session.entry_count()
            ))),
            Err(e) => Ok(CommandResult::Error(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slash_prefix_detection() {
        assert!(CommandRegistry::is_command("/help"));
        assert!(CommandRegistry::is_command("  /exit"));
        assert!(!CommandRegistry::is_command("help me out"));
    }

    #[test]
    fn aliases_resolve_to_the_same_command() {
        let registry = CommandRegistry::new();
        assert!(registry.get("quit").is_some());
        assert!(registry.get("q").is_some());
        assert_eq!(registry.get("quit").unwrap().name(), "exit");
    }

    #[test]
    fn unknown_command_reports_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut manager = SessionManager::new().unwrap_or_else(|_| {
            panic!("session manager");
        });
        let mut context = CommandContext {
            session_manager: &mut manager,
            cwd: dir.path().to_str().unwrap(),
            model: "test",
        };

        let registry = CommandRegistry::new();
        let result = registry.execute("/frobnicate", &mut context).unwrap();
        assert!(matches!(result, CommandResult::Error(_)));
    }
}
