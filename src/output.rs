//! User-facing output and the confirmation prompt.
//!
//! The pipeline never prints. Everything the user sees goes through a
//! [`Reporter`], and every "run this?" question goes through [`Confirm`].

use async_trait::async_trait;
use colored::Colorize;
use std::io::{self, BufRead, Write};
use std::time::Duration;

use crate::error::{Result, WoquError};
use crate::executor::ExecutionResult;
use crate::suggestion::{SuggestedCommand, Suggestion};

/// Sink for everything the pipeline wants the user to see
pub trait Reporter: Send + Sync {
    /// The failing command the suggestion is for
    fn analyzing(&self, command: &str, result: &ExecutionResult);
    fn reasoning(&self, text: &str);
    fn explanation(&self, text: &str);
    /// One suggested command; `index` starts at 1
    fn command(&self, index: usize, command: &SuggestedCommand);
    fn executed(&self, command: &str, result: &ExecutionResult);
    fn not_executed(&self, command: &str);
    fn retrying(&self, attempt: u32, max_attempts: u32, delay: Duration, error: &WoquError);
    fn info(&self, message: &str);
}

/// Asks the user whether to run a suggested command
#[async_trait]
pub trait Confirm: Send + Sync {
    async fn confirm(&self, command: &str) -> bool;
}

/// Colored terminal output, wrapped to the terminal width
pub struct TerminalReporter {
    width: usize,
}

impl TerminalReporter {
    pub fn new() -> Self {
        Self {
            width: textwrap::termwidth().min(100),
        }
    }

    fn wrapped(&self, text: &str, indent: &str) {
        for line in text.lines() {
            let processed = render_inline_markdown(line);
            if processed.trim().is_empty() {
                println!();
                continue;
            }
            for wrapped in textwrap::wrap(&processed, self.width.saturating_sub(indent.len())) {
                println!("{indent}{wrapped}");
            }
        }
    }
}

impl Default for TerminalReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl Reporter for TerminalReporter {
    fn analyzing(&self, command: &str, result: &ExecutionResult) {
        println!();
        println!(
            "{} {} {}",
            "●".red(),
            command.bold(),
            format!("(exit {}: {})", result.exit_code, describe_exit(result)).dimmed()
        );
        println!();
    }

    fn reasoning(&self, text: &str) {
        println!("{} {}", "▸".magenta(), "Reasoning".magenta().bold());
        for line in text.lines() {
            println!("  {}", line.dimmed());
        }
        println!();
    }

    fn explanation(&self, text: &str) {
        println!("{} {}", "▸".blue(), "Explanation".blue().bold());
        self.wrapped(text, "  ");
        println!();
    }

    fn command(&self, index: usize, command: &SuggestedCommand) {
        println!(
            "{} {}",
            "▸".green(),
            format!("Command {index}").green().bold()
        );
        println!("  {}", command.command.cyan());
        if !command.description.is_empty() {
            self.wrapped(&command.description, "  ");
        }
        println!();
    }

    fn executed(&self, command: &str, result: &ExecutionResult) {
        let status = if result.success() {
            "✓".green().to_string()
        } else {
            format!("✗ {}", describe_exit(result)).red().to_string()
        };
        println!("{} {}", status, command.dimmed());
        print_block(&result.stdout, false);
        print_block(&result.stderr, true);
        println!();
    }

    fn not_executed(&self, command: &str) {
        println!("{} {}", "Command not executed:".dimmed(), command);
    }

    fn retrying(&self, attempt: u32, max_attempts: u32, delay: Duration, error: &WoquError) {
        eprintln!(
            "{} {} {}",
            "Retrying".yellow(),
            format!(
                "in {:.1}s (attempt {attempt}/{max_attempts})",
                delay.as_secs_f64()
            )
            .yellow(),
            format!("{error}").dimmed()
        );
    }

    fn info(&self, message: &str) {
        println!("{} {}", "●".blue(), message);
    }
}

fn print_block(text: &str, is_stderr: bool) {
    for line in text.lines() {
        if is_stderr {
            println!("  {}", line.red());
        } else {
            println!("  {line}");
        }
    }
}

/// Reads y/n answers from standard input.
///
/// The read runs on the blocking pool so an interrupt can still cancel the
/// waiting run.
pub struct StdinConfirm;

#[async_trait]
impl Confirm for StdinConfirm {
    async fn confirm(&self, command: &str) -> bool {
        eprint!(
            "{} {} {} ",
            "Execute".bold(),
            command.cyan(),
            "? [y/N]".bold()
        );
        let _ = io::stderr().flush();

        let answer = tokio::task::spawn_blocking(|| {
            let mut answer = String::new();
            match io::stdin().lock().read_line(&mut answer) {
                Ok(0) | Err(_) => None,
                Ok(_) => Some(answer),
            }
        })
        .await;
        matches!(answer, Ok(Some(answer)) if is_affirmative(&answer))
    }
}

/// `y` or `yes`, any case
pub fn is_affirmative(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}

pub fn format_error(message: &str, tip: Option<&str>) -> String {
    let mut output = format!("{} {}", "Error:".red().bold(), message);
    if let Some(tip) = tip {
        output.push('\n');
        output.push_str(&format!("{} {}", "Tip:".blue().bold(), tip));
    }
    output
}

/// Print a suggestion as pretty JSON on stdout
pub fn print_json(suggestion: &Suggestion) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(suggestion)?);
    Ok(())
}

/// Render `code` spans in cyan and **bold** spans in bold
pub fn render_inline_markdown(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut rest = text;

    while !rest.is_empty() {
        if let Some(after) = rest.strip_prefix('`') {
            if let Some(end) = after.find('`') {
                result.push_str(&after[..end].cyan().to_string());
                rest = &after[end + 1..];
                continue;
            }
        } else if let Some(after) = rest.strip_prefix("**") {
            if let Some(end) = after.find("**") {
                result.push_str(&after[..end].bold().to_string());
                rest = &after[end + 2..];
                continue;
            }
        }
        let mut chars = rest.chars();
        if let Some(c) = chars.next() {
            result.push(c);
        }
        rest = chars.as_str();
    }

    result
}

/// Human-readable meaning of an executed command's outcome
pub fn describe_exit(result: &ExecutionResult) -> &'static str {
    if result.timed_out {
        return "Timed out";
    }
    interpret_exit_code(result.exit_code)
}

/// Interpret exit codes with human-readable descriptions.
///
/// Processes killed by a signal report the bare signal number.
pub fn interpret_exit_code(code: i32) -> &'static str {
    match code {
        0 => "Success",
        1 => "General error",
        2 => "Misuse of shell command",
        126 => "Command cannot execute (permission denied)",
        127 => "Command not found",
        128 => "Invalid exit argument",
        _ if code > 128 && code < 165 => signal_name(code - 128),
        _ => match signal_name(code) {
            "Signal received" => "Unknown error",
            name => name,
        },
    }
}

fn signal_name(signal: i32) -> &'static str {
    match signal {
        2 => "Interrupted (SIGINT)",
        9 => "Killed (SIGKILL)",
        11 => "Segmentation fault (SIGSEGV)",
        13 => "Broken pipe (SIGPIPE)",
        15 => "Terminated (SIGTERM)",
        _ => "Signal received",
    }
}
