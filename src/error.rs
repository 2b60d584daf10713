//! Error type shared by every stage of the suggestion pipeline.
//!
//! Inner components return these values and never print. Only the binary
//! decides how an error is rendered.

use crate::providers::ProviderName;

/// Result alias used throughout the library
pub type Result<T> = std::result::Result<T, WoquError>;

/// Errors raised while producing or applying a suggestion
#[derive(Debug, thiserror::Error)]
pub enum WoquError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid provider: {0}")]
    InvalidProvider(String),

    /// The last history entry succeeded or was never re-run
    #[error("{}", no_failure_message(.command))]
    NoFailureFound { command: Option<String> },

    #[error("Command timed out: {command}")]
    TimedOut { command: String },

    #[error("Refusing unsafe command: {command:?}")]
    UnsafeCommand { command: String },

    #[error("API error from {provider} (HTTP {status}): {message}")]
    Api {
        provider: ProviderName,
        status: u16,
        message: String,
    },

    #[error("Rate limited by {provider}. Please wait and try again.")]
    RateLimited { provider: ProviderName },

    #[error("Network error talking to {provider}: {message}")]
    Network {
        provider: ProviderName,
        message: String,
    },

    #[error("Invalid response from {provider}: {message}")]
    InvalidResponse {
        provider: ProviderName,
        message: String,
    },

    #[error("Error parsing model output: {0}")]
    Parse(String),

    #[error("Could not get a suggestion for `{command}` after {attempts} attempts: {last_error}")]
    SuggestFailed {
        command: String,
        attempts: u32,
        last_error: Box<WoquError>,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

fn no_failure_message(command: &Option<String>) -> String {
    match command {
        Some(command) => format!("Ran \"{command}\", no recent errors found"),
        None => "No recent command errors found".to_string(),
    }
}

impl WoquError {
    /// Terminal outcomes that are reported to the user but are not failures
    pub fn is_informational(&self) -> bool {
        matches!(
            self,
            WoquError::NoFailureFound { .. } | WoquError::TimedOut { .. }
        )
    }
}

impl From<serde_json::Error> for WoquError {
    fn from(err: serde_json::Error) -> Self {
        WoquError::Parse(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_failure_message_with_command() {
        let err = WoquError::NoFailureFound {
            command: Some("ls".to_string()),
        };
        assert_eq!(err.to_string(), "Ran \"ls\", no recent errors found");
    }

    #[test]
    fn test_no_failure_message_without_command() {
        let err = WoquError::NoFailureFound { command: None };
        assert_eq!(err.to_string(), "No recent command errors found");
    }

    #[test]
    fn test_informational_errors() {
        assert!(WoquError::NoFailureFound { command: None }.is_informational());
        assert!(WoquError::TimedOut {
            command: "sleep 60".to_string()
        }
        .is_informational());
        assert!(!WoquError::Parse("bad".to_string()).is_informational());
    }

    #[test]
    fn test_suggest_failed_names_last_cause() {
        let err = WoquError::SuggestFailed {
            command: "gti status".to_string(),
            attempts: 3,
            last_error: Box::new(WoquError::Api {
                provider: ProviderName::OpenAI,
                status: 500,
                message: "boom".to_string(),
            }),
        };
        let msg = err.to_string();
        assert!(msg.contains("gti status"));
        assert!(msg.contains("3 attempts"));
        assert!(msg.contains("HTTP 500"));
        assert!(msg.contains("openai"));
    }
}
