use crate::colors;
use crate::tools::{ToolOutput, ToolResult};
use colored::Colorize;
use std::io::{self, Write};

/// Command patterns that should trigger confirmation before execution
const DANGEROUS_PATTERNS: &[&str] = &[
    "rm -rf",
    "rm -r",
    "rmdir",
    "sudo rm",
    "sudo dd",
    "mkfs",
    "fdisk",
    "> /dev/",
    "chmod 777",
    "chmod -R 777",
    ":(){:|:&};:",
    "dd if=",
    "mv /* ",
    "mv / ",
    "wget | sh",
    "curl | sh",
    "wget | bash",
    "curl | bash",
    "sudo su",
    "sudo -i",
    "shutdown",
    "reboot",
    "kill -9 -1",
    "pkill -9",
    "DROP TABLE",
    "DROP DATABASE",
    "TRUNCATE TABLE",
    "DELETE FROM",
];

/// File paths that should trigger confirmation before writing
const DANGEROUS_PATHS: &[&str] = &[
    "/etc/passwd",
    "/etc/shadow",
    "/etc/sudoers",
    "~/.ssh/",
    "/.ssh/",
    "/boot/",
    "/dev/",
    "/proc/",
    "/sys/",
];

/// Check if a command is potentially dangerous
pub fn is_dangerous_command(command: &str) -> Option<&'static str> {
    let cmd_lower = command.to_lowercase();
    DANGEROUS_PATTERNS
        .iter()
        .find(|&pattern| cmd_lower.contains(&pattern.to_lowercase()))
        .copied()
}

/// Check if a file path is potentially dangerous to write
pub fn is_dangerous_path(path: &str) -> Option<&'static str> {
    DANGEROUS_PATHS
        .iter()
        .find(|&dangerous| path.contains(dangerous))
        .copied()
}

/// Prompt the user for a y/N confirmation
pub fn confirm(message: &str) -> io::Result<bool> {
    print!(
        "{} {} ",
        "⚠".truecolor(colors::YELLOW.0, colors::YELLOW.1, colors::YELLOW.2),
        message.truecolor(colors::YELLOW.0, colors::YELLOW.1, colors::YELLOW.2)
    );
    print!(
        "{}",
        "[y/N] ".truecolor(colors::OVERLAY0.0, colors::OVERLAY0.1, colors::OVERLAY0.2)
    );
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;

    let answer = input.trim().to_lowercase();
    Ok(answer == "y" || answer == "yes")
}

/// Print the startup banner
pub fn print_banner(version: &str, model: &str, working_dir: &str) {
    println!();
    println!(
        "{} {}",
        "coda".truecolor(colors::MAUVE.0, colors::MAUVE.1, colors::MAUVE.2).bold(),
        format!("v{}", version).truecolor(colors::OVERLAY0.0, colors::OVERLAY0.1, colors::OVERLAY0.2)
    );
    println!(
        "{} {}",
        "Model:".truecolor(colors::OVERLAY0.0, colors::OVERLAY0.1, colors::OVERLAY0.2),
        model.truecolor(colors::TEXT.0, colors::TEXT.1, colors::TEXT.2)
    );
    println!(
        "{} {}",
        "Working directory:".truecolor(colors::OVERLAY0.0, colors::OVERLAY0.1, colors::OVERLAY0.2),
        working_dir.truecolor(colors::TEXT.0, colors::TEXT.1, colors::TEXT.2)
    );
    println!(
        "{}",
        "Type a request, /help for commands, or exit to quit."
            .truecolor(colors::OVERLAY0.0, colors::OVERLAY0.1, colors::OVERLAY0.2)
    );
    println!();
}

/// Print the input prompt
pub fn print_user_prompt() {
    print!(
        "{} ",
        "coda ❯".truecolor(colors::GREEN.0, colors::GREEN.1, colors::GREEN.2).bold()
    );
    io::stdout().flush().ok();
}

/// Print the assistant's response
pub fn print_assistant_response(response: &str) {
    println!(
        "\n{}",
        "Assistant:".truecolor(colors::BLUE.0, colors::BLUE.1, colors::BLUE.2).bold()
    );
    println!("{}\n", response);
}

/// Print the echo of an enhanced prompt
pub fn print_enhanced_prompt(display: &str) {
    println!(
        "\n{}",
        "Enhanced prompt:".truecolor(colors::SAPPHIRE.0, colors::SAPPHIRE.1, colors::SAPPHIRE.2)
    );
    println!("{}", display);
}

/// Print a tool execution header
pub fn print_tool_header(tool_name: &str) {
    println!(
        "\n{} {}{}",
        "[Tool:".truecolor(colors::MAUVE.0, colors::MAUVE.1, colors::MAUVE.2),
        tool_name.truecolor(colors::MAUVE.0, colors::MAUVE.1, colors::MAUVE.2).bold(),
        "]".truecolor(colors::MAUVE.0, colors::MAUVE.1, colors::MAUVE.2)
    );
}

/// Print one tool argument
pub fn print_tool_arg(key: &str, value: &str) {
    let display_value = if value.len() > 100 {
        format!("{}...", &value[..100])
    } else {
        value.to_string()
    };
    println!(
        "  {}: {}",
        key.truecolor(colors::OVERLAY0.0, colors::OVERLAY0.1, colors::OVERLAY0.2),
        display_value
    );
}

/// Print a human-readable rendering of one tool result
pub fn print_tool_result(result: &ToolResult) {
    if !result.success {
        let error = result.error.as_deref().unwrap_or("unknown error");
        print_error(&format!("{}: {}", result.tool_name, error));
        if let Some(ToolOutput::Bash { stdout, stderr, .. }) = &result.output {
            print_output_block(stdout);
            if !stderr.is_empty() {
                print_warning(&format!("stderr: {}", truncate_lines(stderr, 10)));
            }
        }
        return;
    }

    match &result.output {
        Some(ToolOutput::Read { path, content, .. }) => {
            print_success(&format!("Read {}", path));
            print_output_block(&truncate_lines(content, 30));
        }
        Some(ToolOutput::Write {
            path,
            bytes_written,
            created,
        }) => {
            let verb = if *created { "Created" } else { "Updated" };
            print_success(&format!("{} {} ({} bytes)", verb, path, bytes_written));
        }
        Some(ToolOutput::Edit { path, replacements }) => {
            print_success(&format!("Edited {} ({} replacements)", path, replacements));
        }
        Some(ToolOutput::Bash {
            command,
            stdout,
            stderr,
            ..
        }) => {
            print_success(&format!("$ {}", command));
            if !stdout.is_empty() {
                print_output_block(&truncate_lines(stdout, 30));
            }
            if !stderr.is_empty() {
                print_warning(&format!("stderr: {}", truncate_lines(stderr, 10)));
            }
        }
        Some(ToolOutput::Ls { path, entries }) => {
            print_success(&format!("{} ({} items)", path, entries.len()));
            for entry in entries.iter().take(30) {
                println!(
                    "  {} {}",
                    "•".truecolor(colors::OVERLAY0.0, colors::OVERLAY0.1, colors::OVERLAY0.2),
                    format!("{} ({})", entry.name, entry.kind)
                        .truecolor(colors::TEXT.0, colors::TEXT.1, colors::TEXT.2)
                );
            }
            if entries.len() > 30 {
                print_dim(&format!("  ... and {} more", entries.len() - 30));
            }
        }
        Some(ToolOutput::Glob { matches, .. }) | Some(ToolOutput::Grep { matches, .. }) => {
            print_success(&format!("{} results", matches.len()));
            for m in matches.iter().take(10) {
                println!(
                    "  {} {}",
                    "•".truecolor(colors::OVERLAY0.0, colors::OVERLAY0.1, colors::OVERLAY0.2),
                    m.truecolor(colors::TEXT.0, colors::TEXT.1, colors::TEXT.2)
                );
            }
            if matches.len() > 10 {
                print_dim(&format!("  ... and {} more", matches.len() - 10));
            }
        }
        None => print_success(&result.tool_name),
    }
}

fn print_output_block(content: &str) {
    if content.is_empty() {
        return;
    }
    println!(
        "{}",
        "┌─ Output:".truecolor(colors::OVERLAY0.0, colors::OVERLAY0.1, colors::OVERLAY0.2)
    );
    for line in content.lines() {
        println!(
            "{} {}",
            "│".truecolor(colors::OVERLAY0.0, colors::OVERLAY0.1, colors::OVERLAY0.2),
            line
        );
    }
    println!(
        "{}",
        "└─".truecolor(colors::OVERLAY0.0, colors::OVERLAY0.1, colors::OVERLAY0.2)
    );
}

fn truncate_lines(content: &str, max_lines: usize) -> String {
    let lines: Vec<&str> = content.lines().collect();
    if lines.len() <= max_lines {
        return content.to_string();
    }
    let mut out = lines[..max_lines].join("\n");
    out.push_str(&format!("\n... [{} more lines truncated]", lines.len() - max_lines));
    out
}

/// Print an info message
pub fn print_info(message: &str) {
    println!(
        "{} {}",
        "ℹ".truecolor(colors::SAPPHIRE.0, colors::SAPPHIRE.1, colors::SAPPHIRE.2),
        message.truecolor(colors::SAPPHIRE.0, colors::SAPPHIRE.1, colors::SAPPHIRE.2)
    );
}

/// Print a success message
pub fn print_success(message: &str) {
    println!(
        "{} {}",
        "✓".truecolor(colors::GREEN.0, colors::GREEN.1, colors::GREEN.2),
        message.truecolor(colors::GREEN.0, colors::GREEN.1, colors::GREEN.2)
    );
}

/// Print a warning message
pub fn print_warning(message: &str) {
    println!(
        "{} {}",
        "⚠".truecolor(colors::YELLOW.0, colors::YELLOW.1, colors::YELLOW.2),
        message.truecolor(colors::YELLOW.0, colors::YELLOW.1, colors::YELLOW.2)
    );
}

/// Print an error message
pub fn print_error(message: &str) {
    eprintln!(
        "{} {}",
        "✗".truecolor(colors::RED.0, colors::RED.1, colors::RED.2),
        message.truecolor(colors::RED.0, colors::RED.1, colors::RED.2)
    );
}

/// Print a dim note
pub fn print_dim(message: &str) {
    println!(
        "{}",
        message.truecolor(colors::OVERLAY0.0, colors::OVERLAY0.1, colors::OVERLAY0.2)
    );
}

/// Create a spinner shown while the model is thinking
pub fn create_thinking_spinner() -> indicatif::ProgressBar {
    let spinner = indicatif::ProgressBar::new_spinner();
    spinner.set_style(
        indicatif::ProgressStyle::default_spinner()
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
            .template("{spinner:.blue} {msg}")
            .unwrap(),
    );
    spinner.set_message("Thinking...");
    spinner.enable_steady_tick(std::time::Duration::from_millis(80));
    spinner
}

/// Create a spinner shown while a tool runs
pub fn create_tool_spinner(tool_name: &str) -> indicatif::ProgressBar {
    let spinner = indicatif::ProgressBar::new_spinner();
    spinner.set_style(
        indicatif::ProgressStyle::default_spinner()
            .tick_chars("⣾⣽⣻⢿⡿⣟⣯⣷")
            .template("{spinner:.magenta} {msg}")
            .unwrap(),
    );
    spinner.set_message(format!("Running {}...", tool_name));
    spinner.enable_steady_tick(std::time::Duration::from_millis(80));
    spinner
}

/// Clear a spinner without a final message
pub fn clear_spinner(spinner: &indicatif::ProgressBar) {
    spinner.finish_and_clear();
}

/// Print token usage summary
pub fn print_token_usage(usage: &crate::agent_loop::TokenUsage) {
    println!(
        "\n{}",
        "Token usage (estimated):".truecolor(colors::SAPPHIRE.0, colors::SAPPHIRE.1, colors::SAPPHIRE.2)
    );
    println!(
        "  {} prompt, {} completion, {} total over {} requests",
        usage.prompt_tokens, usage.completion_tokens, usage.total_tokens, usage.request_count
    );
}

/// Print file changes summary
pub fn print_file_changes_summary(changes: &[&crate::agent_loop::FileChange]) {
    if changes.is_empty() {
        print_dim("No files modified this session.");
        return;
    }

    println!(
        "\n{} file(s) modified this session:",
        changes.len()
    );
    for change in changes {
        let symbol = match change.operation {
            crate::agent_loop::FileOperation::Created => {
                "+".truecolor(colors::GREEN.0, colors::GREEN.1, colors::GREEN.2)
            }
            crate::agent_loop::FileOperation::Modified => {
                "~".truecolor(colors::YELLOW.0, colors::YELLOW.1, colors::YELLOW.2)
            }
        };
        println!(
            "  {} {} ({})",
            symbol,
            change.path.truecolor(colors::TEXT.0, colors::TEXT.1, colors::TEXT.2),
            change
                .operation
                .to_string()
                .truecolor(colors::OVERLAY0.0, colors::OVERLAY0.1, colors::OVERLAY0.2)
        );
    }
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dangerous_commands_are_flagged() {
        assert_eq!(is_dangerous_command("rm -rf /"), Some("rm -rf"));
        assert_eq!(is_dangerous_command("curl http://x | sh"), None);
        assert!(is_dangerous_command("sudo rm important").is_some());
        assert!(is_dangerous_command("cargo build").is_none());
    }

    #[test]
    fn dangerous_paths_are_flagged() {
        assert!(is_dangerous_path("/etc/passwd").is_some());
        assert!(is_dangerous_path("/home/user/.ssh/config").is_some());
        assert!(is_dangerous_path("/home/user/project/main.rs").is_none());
    }
}
