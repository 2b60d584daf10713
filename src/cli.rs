//! Command-line interface definitions for the `woqu` tool.

use clap::{Parser, ValueEnum};
use clap_complete::Shell;
use std::path::PathBuf;

use crate::providers::ProviderName;
use crate::shell::ShellKind;

/// Diagnostic verbosity for `--log-level`
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_filter(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

/// Fix your last failed shell command with an LLM suggestion
#[derive(Parser, Debug)]
#[command(
    name = "woqu",
    version = concat!(env!("CARGO_PKG_VERSION"), " (", env!("WOQU_GIT_SHA"), ")"),
    about,
    long_about = None
)]
#[command(
    after_help = "EXAMPLES:\n    woqu\n    woqu --command \"gti status\"\n    woqu --dry-run --provider openai\n    eval \"$(woqu --alias zsh)\""
)]
pub struct Cli {
    /// Diagnose this command instead of the last one in history
    #[arg(long, short = 'c', value_name = "CMD")]
    pub command: Option<String>,

    /// Completion provider to use (falls back to default_provider)
    #[arg(long, short = 'p', value_enum, value_name = "PROVIDER")]
    pub provider: Option<ProviderName>,

    /// Show suggestions without offering to run them
    #[arg(long, short = 'n')]
    pub dry_run: bool,

    /// Print the suggestion as JSON (never runs anything)
    #[arg(long, short = 'j')]
    pub json: bool,

    /// Diagnostic log level (overrides WOQU_LOG)
    #[arg(long, short = 'l', value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Path to config file (overrides WOQU_CONFIG)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Shell to assume instead of detecting the parent process
    #[arg(long, value_enum, value_name = "SHELL")]
    pub shell: Option<ShellKind>,

    /// Print the alias function for the specified shell
    #[arg(long, value_enum, value_name = "SHELL")]
    pub alias: Option<ShellKind>,

    /// Install the alias function into the shell's startup file
    #[arg(long, value_enum, value_name = "SHELL")]
    pub alias_install: Option<ShellKind>,

    /// Remove the alias function from the shell's startup file
    #[arg(long, value_enum, value_name = "SHELL")]
    pub alias_uninstall: Option<ShellKind>,

    /// Generate shell completions
    #[arg(long, value_enum, value_name = "SHELL")]
    pub completions: Option<Shell>,

    /// Output default configuration to stdout
    #[arg(long)]
    pub print_config: bool,
}

impl Cli {
    /// Commands are only offered for execution in interactive, non-JSON runs
    pub fn dry_run(&self) -> bool {
        self.dry_run || self.json
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_cli_no_args() {
        let cli = Cli::parse_from(["woqu"]);
        assert!(cli.command.is_none());
        assert!(cli.provider.is_none());
        assert!(!cli.dry_run());
        assert!(!cli.json);
    }

    #[test]
    fn test_cli_parses_command() {
        let cli = Cli::parse_from(["woqu", "--command", "gti status"]);
        assert_eq!(cli.command.as_deref(), Some("gti status"));
        let cli = Cli::parse_from(["woqu", "-c", "npm run biuld"]);
        assert_eq!(cli.command.as_deref(), Some("npm run biuld"));
    }

    #[test]
    fn test_cli_parses_provider() {
        let cli = Cli::parse_from(["woqu", "--provider", "deepseek"]);
        assert_eq!(cli.provider, Some(ProviderName::DeepSeek));
        let cli = Cli::parse_from(["woqu", "-p", "siliconflow"]);
        assert_eq!(cli.provider, Some(ProviderName::SiliconFlow));
    }

    #[test]
    fn test_cli_rejects_unknown_provider() {
        assert!(Cli::try_parse_from(["woqu", "--provider", "anthropic"]).is_err());
    }

    #[test]
    fn test_cli_parses_dry_run() {
        let cli = Cli::parse_from(["woqu", "-n"]);
        assert!(cli.dry_run());
    }

    #[test]
    fn test_cli_json_implies_dry_run() {
        let cli = Cli::parse_from(["woqu", "--json"]);
        assert!(cli.json);
        assert!(cli.dry_run());
    }

    #[test]
    fn test_cli_parses_log_level() {
        let cli = Cli::parse_from(["woqu", "--log-level", "debug"]);
        assert_eq!(cli.log_level, Some(LogLevel::Debug));
        assert_eq!(LogLevel::Debug.as_filter(), "debug");
    }

    #[test]
    fn test_cli_parses_shell_override() {
        let cli = Cli::parse_from(["woqu", "--shell", "fish"]);
        assert_eq!(cli.shell, Some(ShellKind::Fish));
        let cli = Cli::parse_from(["woqu", "--shell", "pwsh"]);
        assert_eq!(cli.shell, Some(ShellKind::PowerShell));
    }

    #[test]
    fn test_cli_parses_alias_flags() {
        let cli = Cli::parse_from(["woqu", "--alias", "zsh"]);
        assert_eq!(cli.alias, Some(ShellKind::Zsh));
        let cli = Cli::parse_from(["woqu", "--alias-install", "bash"]);
        assert_eq!(cli.alias_install, Some(ShellKind::Bash));
        let cli = Cli::parse_from(["woqu", "--alias-uninstall", "fish"]);
        assert_eq!(cli.alias_uninstall, Some(ShellKind::Fish));
    }

    #[test]
    fn test_cli_parses_completions() {
        let cli = Cli::parse_from(["woqu", "--completions", "bash"]);
        assert_eq!(cli.completions, Some(Shell::Bash));
    }

    #[test]
    fn test_cli_parses_config_and_print_config() {
        let cli = Cli::parse_from(["woqu", "--config", "/tmp/woqu.toml", "--print-config"]);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/woqu.toml")));
        assert!(cli.print_config);
    }

    #[test]
    fn test_cli_verify() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
