use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use clap_complete::{generate, Shell};
use colored::Colorize;
use std::io;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use woqu::alias;
use woqu::cli::{Cli, LogLevel};
use woqu::config::{self, Config};
use woqu::error::WoquError;
use woqu::executor::CommandExecutor;
use woqu::history::HistorySource;
use woqu::output::{format_error, print_json, Reporter, StdinConfirm, TerminalReporter};
use woqu::pipeline::SuggestionPipeline;
use woqu::providers::OpenAIClient;
use woqu::shell::{detect_shell, ShellKind};

/// Environment variable holding the log filter when `--log-level` is absent
const LOG_ENV: &str = "WOQU_LOG";

const EXIT_INTERRUPTED: u8 = 130;

fn init_logging(level: Option<LogLevel>) {
    let filter = match level {
        Some(level) => EnvFilter::new(level.as_filter()),
        None => EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn")),
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
}

fn print_completions(shell: Shell) {
    let mut cmd = Cli::command();
    generate(shell, &mut cmd, "woqu", &mut io::stdout());
}

fn install_alias(shell: ShellKind) -> Result<()> {
    let rc = alias::default_rc_file(shell)?;
    let installed = alias::install_alias(shell, &rc)
        .with_context(|| format!("Failed to install alias into {}", rc.display()))?;

    if !installed {
        println!(
            "{} woqu alias is already installed in {}",
            "✓".green(),
            rc.display()
        );
        return Ok(());
    }

    println!(
        "{} {}",
        "✓".green(),
        "woqu alias installed successfully!".green().bold()
    );
    println!();
    println!("  {} {}", "Config file:".blue().bold(), rc.display());
    println!();
    println!("  {} To activate, run:", "Next steps:".yellow().bold());
    match shell {
        ShellKind::PowerShell => println!("    . $PROFILE"),
        _ => println!("    source {}", rc.display()),
    }
    println!();
    println!("  Or open a new terminal session.");
    println!();
    Ok(())
}

fn uninstall_alias(shell: ShellKind) -> Result<()> {
    let rc = alias::default_rc_file(shell)?;
    let removed = alias::uninstall_alias(&rc)
        .with_context(|| format!("Failed to remove alias from {}", rc.display()))?;

    if removed {
        println!(
            "{} {}",
            "✓".green(),
            "woqu alias uninstalled successfully!".green().bold()
        );
        println!();
        println!("  Restart your terminal or source {} to apply changes.", rc.display());
        println!();
    } else {
        println!(
            "{} woqu alias is not installed in {}",
            "?".yellow(),
            rc.display()
        );
    }
    Ok(())
}

fn resolve_shell(cli: &Cli) -> ShellKind {
    if let Some(shell) = cli.shell {
        return shell;
    }
    detect_shell().unwrap_or_else(|| {
        warn!(fallback = %ShellKind::FALLBACK, "could not detect shell");
        ShellKind::FALLBACK
    })
}

async fn run(cli: &Cli) -> Result<()> {
    if let Some(shell) = cli.completions {
        print_completions(shell);
        return Ok(());
    }
    if cli.print_config {
        config::print_default_config();
        return Ok(());
    }
    if let Some(shell) = cli.alias {
        print!("{}", alias::generate_alias(shell)?);
        return Ok(());
    }
    if let Some(shell) = cli.alias_install {
        return install_alias(shell);
    }
    if let Some(shell) = cli.alias_uninstall {
        return uninstall_alias(shell);
    }

    let config = Config::load(cli.config.as_deref())?;
    let provider = config.provider(cli.provider, |key| std::env::var(key).ok())?;
    let shell = resolve_shell(cli);
    tracing::debug!(%shell, provider = %provider.name, "starting");

    let reporter = Arc::new(TerminalReporter::new());
    let pipeline = SuggestionPipeline::new(
        shell,
        Arc::new(OpenAIClient::new(provider)?),
        Arc::new(CommandExecutor::new(shell).with_timeout(config.timeout())),
        reporter.clone(),
        Arc::new(StdinConfirm),
    )
    .with_history_source(HistorySource::from_env(shell))
    .with_retry(config.retry_policy())
    .dry_run(cli.dry_run());

    let outcome = if cli.json {
        match pipeline.diagnose(cli.command.as_deref()).await {
            Ok(suggestion) => print_json(&suggestion),
            Err(err) => Err(err),
        }
    } else {
        pipeline.run(cli.command.as_deref()).await.map(|_| ())
    };

    match outcome {
        Ok(()) => Ok(()),
        Err(err) if err.is_informational() => {
            if cli.json {
                let payload = serde_json::json!({
                    "no_error": true,
                    "message": err.to_string(),
                });
                println!("{}", serde_json::to_string_pretty(&payload)?);
            } else {
                reporter.info(&err.to_string());
            }
            Ok(())
        }
        Err(err) => Err(err.into()),
    }
}

fn tip_for(err: &anyhow::Error) -> Option<&'static str> {
    match err.downcast_ref::<WoquError>()? {
        WoquError::Config(_) | WoquError::InvalidProvider(_) => {
            Some("Run `woqu --print-config` for a configuration template")
        }
        WoquError::RateLimited { .. } => Some("Wait a moment and try again"),
        _ => None,
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.log_level);

    let (tx, mut interrupted) = tokio::sync::mpsc::unbounded_channel();
    if let Err(err) = ctrlc::set_handler(move || {
        let _ = tx.send(());
    }) {
        warn!(error = %err, "could not install interrupt handler");
    }

    // Dropping the run future kills any child it is waiting on
    let result = tokio::select! {
        result = run(&cli) => Some(result),
        Some(()) = interrupted.recv() => None,
    };
    let Some(result) = result else {
        eprintln!();
        eprintln!("{}", "Interrupted".yellow());
        // a pending stdin read would block runtime shutdown
        std::process::exit(EXIT_INTERRUPTED.into());
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{}", format_error(&format!("{err:#}"), tip_for(&err)));
            ExitCode::FAILURE
        }
    }
}
