use anyhow::{Result, anyhow};
use clap::Parser;
use rig::client::CompletionClient;
use rig::providers::ollama;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;

mod agent_loop;
mod client;
mod colors;
mod commands;
mod continuation;
mod diff;
mod enhance;
mod error;
mod history;
mod parser;
mod session;
mod terminal;
mod tools;

use agent_loop::AgentLoop;
use client::{ChatEndpoint, ModelEndpoint};
use commands::{CommandContext, CommandRegistry, CommandResult};
use session::SessionManager;

/// coda - a terminal coding agent
#[derive(Parser, Debug)]
#[command(name = "coda")]
#[command(about = "A terminal coding agent powered by local LLMs", version)]
struct Args {
    /// Model to use
    #[arg(long, short = 'm', default_value = "qwen3-coder")]
    model: String,

    /// Chat endpoint URL (default: http://localhost:11434)
    #[arg(long, short = 'u')]
    endpoint_url: Option<String>,

    /// Context window size (num_ctx) for the LLM
    #[arg(long, short = 'c', default_value = "8192")]
    context_size: usize,

    /// Disable dangerous command confirmations
    #[arg(long)]
    no_confirm: bool,

    /// Resume the most recent session
    #[arg(long, short = 'r')]
    resume: bool,

    /// Load a specific session by ID
    #[arg(long)]
    session: Option<String>,

    /// Special instructions to append to the system prompt (inline text or @path)
    #[arg(long, short = 'I')]
    instructions: Option<String>,

    /// Override the default system prompt (inline text or @path)
    #[arg(long, short = 'S')]
    system_prompt: Option<String>,

    /// Batch mode: run one prompt non-interactively and exit
    #[arg(short = 'p', long)]
    prompt: Option<String>,

    /// Read the batch prompt from a file
    #[arg(long)]
    prompt_file: Option<String>,

    /// Maximum iterations for the agent loop
    #[arg(long)]
    max_iterations: Option<usize>,

    /// Batch mode timeout in seconds
    #[arg(long, default_value = "300")]
    batch_timeout: u64,

    /// Quiet mode: only output the final response (for batch mode)
    #[arg(short = 'q', long)]
    quiet: bool,
}

// System prompt loaded from an external file at compile time
const SYSTEM_PROMPT: &str = include_str!("../prompts/system.txt");

/// Load instructions from inline text, or from a file when prefixed with '@'
fn load_instructions(instructions: &str) -> Result<String> {
    if let Some(path) = instructions.strip_prefix('@') {
        std::fs::read_to_string(path)
            .map_err(|e| anyhow!("Failed to read instructions file '{}': {}", path, e))
    } else {
        Ok(instructions.to_string())
    }
}

/// The batch prompt, from --prompt or --prompt-file
fn get_initial_prompt(args: &Args) -> Result<Option<String>> {
    if let Some(ref prompt) = args.prompt {
        Ok(Some(prompt.clone()))
    } else if let Some(ref prompt_file) = args.prompt_file {
        let content = std::fs::read_to_string(prompt_file)
            .map_err(|e| anyhow!("Failed to read prompt file '{}': {}", prompt_file, e))?;
        Ok(Some(content))
    } else {
        Ok(None)
    }
}

/// Assemble the system prompt: default or override, with the working
/// directory substituted and optional instructions appended.
fn build_preamble(args: &Args, cwd: &str) -> Result<String> {
    let base = match args.system_prompt {
        Some(ref custom) => load_instructions(custom)?,
        None => SYSTEM_PROMPT.to_string(),
    };

    let mut preamble = base.replace("{{working_dir}}", cwd);

    if let Some(ref instructions_input) = args.instructions {
        let instructions = load_instructions(instructions_input)?;
        preamble.push_str("\n\n");
        preamble.push_str(&instructions);
    }

    Ok(preamble)
}

/// Cancel the given token on the next Ctrl-C.
fn arm_interrupt(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!();
            terminal::print_warning("Interrupt received; stopping after the current step.");
            token.cancel();
        }
    });
}

/// Run one prompt non-interactively and exit.
async fn run_batch_mode<C: ChatEndpoint>(prompt: String, mut agent: AgentLoop<C>, args: &Args) -> Result<()> {
    use tokio::time::{Duration, timeout};

    if !args.quiet {
        eprintln!("Running in batch mode...");
    }

    let result = timeout(Duration::from_secs(args.batch_timeout), agent.chat(&prompt)).await;

    match result {
        Ok(Ok(response)) => {
            println!("{}", response);
            if !args.quiet {
                eprintln!();
                eprintln!("Files changed: {}", agent.file_changes_count());
                eprintln!("Iterations: {}", agent.iteration_count());
                let usage = agent.token_usage();
                eprintln!(
                    "Token usage: {} prompt, {} completion",
                    usage.prompt_tokens, usage.completion_tokens
                );
            }
            Ok(())
        }
        Ok(Err(e)) => {
            if !args.quiet {
                eprintln!("Error: {}", e);
            }
            std::process::exit(1);
        }
        Err(_) => {
            if !args.quiet {
                eprintln!(
                    "Error: Batch mode timed out after {} seconds",
                    args.batch_timeout
                );
            }
            std::process::exit(3);
        }
    }
}

/// Run a shell command the user entered with the '!' escape.
async fn run_shell_escape(command: &str, cwd: &str) {
    use std::process::Stdio;
    use tokio::process::Command;
    use tokio::time::{Duration, timeout};

    let mut cmd = Command::new("bash");
    cmd.arg("-c").arg(command);
    cmd.current_dir(cwd);
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());

    terminal::print_dim(&format!("$ {}", command));

    match timeout(Duration::from_secs(600), cmd.output()).await {
        Ok(Ok(output)) => {
            let stdout = String::from_utf8_lossy(&output.stdout);
            let stderr = String::from_utf8_lossy(&output.stderr);
            if !stdout.is_empty() {
                print!("{}", stdout);
            }
            if !stderr.is_empty() {
                eprint!("{}", stderr);
            }
            if !output.status.success() {
                terminal::print_warning(&format!(
                    "[Exit code: {}]",
                    output.status.code().unwrap_or(-1)
                ));
            }
        }
        Ok(Err(e)) => terminal::print_error(&format!("Failed to execute command: {}", e)),
        Err(_) => terminal::print_error("Command timed out (600s)"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_max_level(tracing_subscriber::filter::LevelFilter::WARN)
        .init();

    let cwd = std::env::current_dir()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|_| ".".to_string());

    // Session bookkeeping
    let mut session_manager = SessionManager::new()?;
    if let Some(ref session_id) = args.session {
        match session_manager.load_by_prefix(session_id) {
            Ok(session) => {
                terminal::print_success(&format!(
                    "Loaded session {} ({} entries)",
                    session.short_id(),
                    session.entry_count()
                ));
            }
            Err(e) => {
                terminal::print_error(&format!("Failed to load session: {}", e));
                session_manager.start_new_session(&args.model, &cwd);
            }
        }
    } else if args.resume {
        match session_manager.resume_most_recent()? {
            Some(session) => {
                terminal::print_success(&format!(
                    "Resumed session {} ({} entries)",
                    session.short_id(),
                    session.entry_count()
                ));
            }
            None => {
                terminal::print_info("No previous session found. Starting new session.");
                session_manager.start_new_session(&args.model, &cwd);
            }
        }
    } else {
        session_manager.start_new_session(&args.model, &cwd);
    }

    // Chat endpoint client
    let ollama_client = match args.endpoint_url {
        Some(ref url) => {
            terminal::print_info(&format!("Using endpoint at: {}", url));
            ollama::Client::builder()
                .base_url(url)
                .build()
        }
        None => ollama::Client::new(),
    };
    let model = ollama_client.completion_model(&args.model);
    let endpoint = ModelEndpoint::new(model, args.context_size);

    let preamble = build_preamble(&args, &cwd)?;

    let cancel_token = CancellationToken::new();
    let mut agent = AgentLoop::new(
        endpoint,
        preamble,
        cwd.clone(),
        !args.no_confirm,
        cancel_token.clone(),
    );
    if let Some(max_iterations) = args.max_iterations {
        agent.set_max_iterations(max_iterations);
    }

    // Batch mode runs one prompt and exits; confirmations have no terminal
    // to answer them there.
    if let Some(prompt) = get_initial_prompt(&args)? {
        agent.set_quiet(args.quiet);
        return run_batch_mode(prompt, agent, &args).await;
    }

    // Interactive mode
    terminal::print_banner(env!("CARGO_PKG_VERSION"), &args.model, &cwd);
    arm_interrupt(cancel_token);

    let command_registry = CommandRegistry::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    terminal::print_user_prompt();
    while let Some(line) = lines.next_line().await? {
        let input = line.trim().to_string();

        if input.is_empty() {
            terminal::print_user_prompt();
            continue;
        }

        if input == "exit" || input == "quit" {
            break;
        }

        // Shell escape
        if let Some(shell_command) = input.strip_prefix('!') {
            let shell_command = shell_command.trim();
            if shell_command.is_empty() {
                terminal::print_error("Empty shell command");
            } else {
                run_shell_escape(shell_command, &cwd).await;
            }
            terminal::print_user_prompt();
            continue;
        }

        // Slash commands
        if CommandRegistry::is_command(&input) {
            let mut context = CommandContext {
                session_manager: &mut session_manager,
                cwd: &cwd,
                model: &args.model,
            };
            match command_registry.execute(&input, &mut context) {
                Ok(CommandResult::Exit) => break,
                Ok(CommandResult::ClearHistory) => {
                    agent.clear_history();
                    terminal::print_info("Conversation history cleared.");
                }
                Ok(CommandResult::ShowFileChanges) => {
                    terminal::print_file_changes_summary(&agent.get_file_changes_summary());
                }
                Ok(CommandResult::ShowUsage) => {
                    terminal::print_token_usage(agent.token_usage());
                }
                Ok(CommandResult::ShowHistory) => {
                    terminal::print_dim(&format!("[History: {} turns]", agent.history_len()));
                }
                Ok(CommandResult::Info(msg)) => terminal::print_info(&msg),
                Ok(CommandResult::Error(msg)) => terminal::print_error(&msg),
                Ok(CommandResult::Continue) => {}
                Err(e) => terminal::print_error(&format!("Command error: {}", e)),
            }
            terminal::print_user_prompt();
            continue;
        }

        // A real request for the agent
        if let Some(session) = session_manager.current_session_mut() {
            session.record("user", &input);
        }

        match agent.chat(&input).await {
            Ok(response) => {
                terminal::print_assistant_response(&response);
                if let Some(session) = session_manager.current_session_mut() {
                    session.record("assistant", &response);
                }
            }
            Err(e) => terminal::print_error(&e.to_string()),
        }

        // A consumed interrupt needs a fresh token for the next turn.
        if agent.is_cancelled() {
            let fresh = CancellationToken::new();
            agent.set_cancel_token(fresh.clone());
            arm_interrupt(fresh);
        }

        terminal::print_user_prompt();
    }

    if let Err(e) = session_manager.save_current_session() {
        eprintln!("Failed to save session: {}", e);
    }

    println!();
    terminal::print_dim("Thanks for using coda.");
    Ok(())
}
