//! woqu - fix the last failed shell command
//!
//! This library provides the core functionality for the `woqu` CLI tool:
//! reading shell history, re-running the failed command, asking a
//! completion provider for a correction and offering to run it.

pub mod alias;
pub mod cli;
pub mod config;
pub mod error;
pub mod executor;
pub mod history;
pub mod output;
pub mod pipeline;
pub mod prompt;
pub mod providers;
pub mod shell;
pub mod suggestion;

// Re-export commonly used types
pub use cli::Cli;
pub use config::Config;
pub use error::{Result, WoquError};
pub use executor::{CommandExecutor, Execute, ExecutionResult};
pub use history::{HistoryEntry, HistoryReader, HistorySource};
pub use pipeline::{RetryPolicy, SuggestionPipeline};
pub use providers::{CompletionClient, ProviderConfig, ProviderName};
pub use shell::{detect_shell, ShellKind};
pub use suggestion::{parse_suggestion, validate_command, SuggestedCommand, Suggestion};
