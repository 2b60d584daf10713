//! The suggestion pipeline.
//!
//! ```text
//! CollectingHistory -> SelectingFailure -> NoFailureFound | TimedOut
//!                                       -> BuildingPrompt -> RequestingCompletion(1..n)
//!                                          -> ValidatingResponse -> Success
//!                                          -> RetryExhausted
//! ```
//!
//! A completion request is only issued once a concrete failing command with
//! captured output exists. Transport, parse and validation failures all count
//! as failed attempts and are retried after a fixed backoff.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::{Result, WoquError};
use crate::executor::{Execute, ExecutionResult, SIGTERM_EXIT};
use crate::history::{HistoryEntry, HistoryReader, HistorySource};
use crate::output::{Confirm, Reporter};
use crate::prompt::build_prompt;
use crate::providers::CompletionClient;
use crate::shell::ShellKind;
use crate::suggestion::{parse_suggestion, SuggestedCommand, Suggestion};

/// Attempts and spacing for completion requests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_secs(1),
        }
    }
}

/// Where the pipeline is; logged on every transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    CollectingHistory,
    SelectingFailure,
    NoFailureFound,
    TimedOut,
    BuildingPrompt,
    RequestingCompletion { attempt: u32 },
    ValidatingResponse { attempt: u32 },
    Success,
    RetryExhausted,
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineState::CollectingHistory => write!(f, "collecting-history"),
            PipelineState::SelectingFailure => write!(f, "selecting-failure"),
            PipelineState::NoFailureFound => write!(f, "no-failure-found"),
            PipelineState::TimedOut => write!(f, "timed-out"),
            PipelineState::BuildingPrompt => write!(f, "building-prompt"),
            PipelineState::RequestingCompletion { attempt } => {
                write!(f, "requesting-completion({attempt})")
            }
            PipelineState::ValidatingResponse { attempt } => {
                write!(f, "validating-response({attempt})")
            }
            PipelineState::Success => write!(f, "success"),
            PipelineState::RetryExhausted => write!(f, "retry-exhausted"),
        }
    }
}

fn enter(state: PipelineState) {
    debug!(%state, "pipeline transition");
}

/// What happened to one suggested command after the suggestion was shown
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    Executed(ExecutionResult),
    Declined,
    DryRun,
}

/// Everything a successful run produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub suggestion: Suggestion,
    pub outcomes: Vec<(SuggestedCommand, CommandOutcome)>,
}

/// Pick the entry to diagnose: the last one, if it failed.
pub fn select_failure(history: &[HistoryEntry]) -> Result<(&HistoryEntry, &ExecutionResult)> {
    enter(PipelineState::SelectingFailure);
    let Some(last) = history.last() else {
        enter(PipelineState::NoFailureFound);
        return Err(WoquError::NoFailureFound { command: None });
    };
    let Some(result) = last.result.as_ref() else {
        enter(PipelineState::NoFailureFound);
        return Err(WoquError::NoFailureFound {
            command: Some(last.command.clone()),
        });
    };

    // A timeout's stderr is our own message, not a diagnostic
    if result.timed_out || result.exit_code == SIGTERM_EXIT {
        enter(PipelineState::TimedOut);
        return Err(WoquError::TimedOut {
            command: last.command.clone(),
        });
    }
    if result.exit_code == 0 {
        enter(PipelineState::NoFailureFound);
        return Err(WoquError::NoFailureFound {
            command: Some(last.command.clone()),
        });
    }

    Ok((last, result))
}

pub struct SuggestionPipeline {
    shell: ShellKind,
    history_source: HistorySource,
    cwd: PathBuf,
    client: Arc<dyn CompletionClient>,
    executor: Arc<dyn Execute>,
    reporter: Arc<dyn Reporter>,
    confirm: Arc<dyn Confirm>,
    retry: RetryPolicy,
    dry_run: bool,
}

impl SuggestionPipeline {
    pub fn new(
        shell: ShellKind,
        client: Arc<dyn CompletionClient>,
        executor: Arc<dyn Execute>,
        reporter: Arc<dyn Reporter>,
        confirm: Arc<dyn Confirm>,
    ) -> Self {
        Self {
            shell,
            history_source: HistorySource::Unavailable,
            cwd: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            client,
            executor,
            reporter,
            confirm,
            retry: RetryPolicy::default(),
            dry_run: false,
        }
    }

    pub fn with_history_source(mut self, source: HistorySource) -> Self {
        self.history_source = source;
        self
    }

    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = cwd.into();
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = RetryPolicy {
            max_attempts: retry.max_attempts.max(1),
            backoff: retry.backoff,
        };
        self
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Recent history with the latest command re-run
    pub async fn collect_history(&self, explicit: Option<&str>) -> Vec<HistoryEntry> {
        enter(PipelineState::CollectingHistory);
        let reader = HistoryReader::new(
            self.shell,
            self.history_source.clone(),
            self.executor.as_ref(),
        );
        reader.get_history(explicit).await
    }

    /// Produce a validated suggestion for the last failed command in `history`
    pub async fn suggest(&self, history: &[HistoryEntry], cwd: &Path) -> Result<Suggestion> {
        let (failed, result) = select_failure(history)?;

        enter(PipelineState::BuildingPrompt);
        let commands: Vec<String> = history.iter().map(|e| e.command.clone()).collect();
        let prompt = build_prompt(cwd, &commands, &result.stderr, &failed.command);

        let max_attempts = self.retry.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.attempt(&prompt, attempt).await {
                Ok(suggestion) => {
                    enter(PipelineState::Success);
                    return Ok(suggestion);
                }
                Err(err) if attempt >= max_attempts => {
                    warn!(attempt, error = %err, "final completion attempt failed");
                    enter(PipelineState::RetryExhausted);
                    return Err(WoquError::SuggestFailed {
                        command: failed.command.clone(),
                        attempts: attempt,
                        last_error: Box::new(err),
                    });
                }
                Err(err) => {
                    warn!(attempt, error = %err, "completion attempt failed");
                    self.reporter
                        .retrying(attempt, max_attempts, self.retry.backoff, &err);
                    tokio::time::sleep(self.retry.backoff).await;
                    attempt += 1;
                }
            }
        }
    }

    async fn attempt(&self, prompt: &str, attempt: u32) -> Result<Suggestion> {
        enter(PipelineState::RequestingCompletion { attempt });
        let raw = self.client.complete(prompt).await?;

        enter(PipelineState::ValidatingResponse { attempt });
        let suggestion = parse_suggestion(&raw)?;
        suggestion.validate()?;
        Ok(suggestion)
    }

    /// Collect history and produce a suggestion without showing or running it
    pub async fn diagnose(&self, explicit: Option<&str>) -> Result<Suggestion> {
        let history = self.collect_history(explicit).await;
        self.suggest(&history, &self.cwd).await
    }

    /// Full interactive run: diagnose, show the suggestion, offer each command
    pub async fn run(&self, explicit: Option<&str>) -> Result<RunReport> {
        let history = self.collect_history(explicit).await;
        self.handle(&history).await
    }

    /// Suggest, report and apply for an already collected history
    pub async fn handle(&self, history: &[HistoryEntry]) -> Result<RunReport> {
        if let Ok((failed, result)) = select_failure(history) {
            self.reporter.analyzing(&failed.command, result);
        }
        let suggestion = self.suggest(history, &self.cwd).await?;
        let outcomes = self.apply(&suggestion).await;
        Ok(RunReport {
            suggestion,
            outcomes,
        })
    }

    /// Show a suggestion and run each command the user confirms, in order
    pub async fn apply(&self, suggestion: &Suggestion) -> Vec<(SuggestedCommand, CommandOutcome)> {
        if let Some(reasoning) = suggestion.reasoning.as_deref() {
            self.reporter.reasoning(reasoning);
        }
        self.reporter.explanation(&suggestion.explanation);
        if suggestion.commands.is_empty() {
            self.reporter.info("No commands suggested");
        }

        let mut outcomes = Vec::with_capacity(suggestion.commands.len());
        for (index, command) in suggestion.commands.iter().enumerate() {
            self.reporter.command(index + 1, command);

            let outcome = if self.dry_run {
                CommandOutcome::DryRun
            } else if self.confirm.confirm(&command.command).await {
                let result = self.executor.execute(&command.command).await;
                self.reporter.executed(&command.command, &result);
                CommandOutcome::Executed(result)
            } else {
                CommandOutcome::Declined
            };

            if !matches!(outcome, CommandOutcome::Executed(_)) {
                self.reporter.not_executed(&command.command);
            }
            outcomes.push((command.clone(), outcome));
        }
        outcomes
    }
}
