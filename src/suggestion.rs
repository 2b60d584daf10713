//! Structured suggestions and the parser that digs them out of model output.
//!
//! Models wrap their JSON in markdown fences and some (reasoning models) put a
//! `<think>...</think>` block in front of it. Parsing happens in a fixed order:
//!
//! 1. extract the first reasoning block and cut the whole tagged span out
//! 2. strip a leading ```` ```json ```` and a trailing ```` ``` ````
//! 3. trim
//! 4. fail on empty text
//! 5. decode the JSON
//! 6. attach the reasoning from step 1

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

use crate::error::{Result, WoquError};

const THINK_OPEN: &str = "<think>";
const THINK_CLOSE: &str = "</think>";
const FENCE_OPEN: &str = "```json";
const FENCE_CLOSE: &str = "```";

/// Pattern that no suggested command may contain
pub const DANGEROUS_PATTERN: &str = "rm -rf /";

/// One corrective command proposed by the model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuggestedCommand {
    pub command: String,
    pub description: String,
}

/// Parsed model answer: why the command failed and what to run instead
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Suggestion {
    pub explanation: String,
    pub commands: Vec<SuggestedCommand>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
}

/// The shape the model is asked to produce
#[derive(Debug, Deserialize)]
struct RawSuggestion {
    explanation: String,
    commands: Vec<SuggestedCommand>,
}

impl Suggestion {
    /// Reject the whole suggestion if any command fails [`validate_command`]
    pub fn validate(&self) -> Result<()> {
        match self
            .commands
            .iter()
            .find(|c| !validate_command(&c.command))
        {
            Some(bad) => Err(WoquError::UnsafeCommand {
                command: bad.command.clone(),
            }),
            None => Ok(()),
        }
    }
}

/// Basic safety check applied to every suggested command
pub fn validate_command(command: &str) -> bool {
    !command.trim().is_empty() && !command.contains(DANGEROUS_PATTERN)
}

fn think_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| {
            Regex::new(&format!(
                "(?s){}(.*?){}",
                regex::escape(THINK_OPEN),
                regex::escape(THINK_CLOSE)
            ))
            .ok()
        })
        .as_ref()
}

/// Split off the first reasoning block, returning (reasoning, remaining text)
pub fn extract_reasoning(raw: &str) -> (Option<String>, String) {
    let Some(caps) = think_pattern().and_then(|re| re.captures(raw)) else {
        return (None, raw.to_string());
    };
    let (Some(span), Some(inner)) = (caps.get(0), caps.get(1)) else {
        return (None, raw.to_string());
    };

    let mut rest = String::with_capacity(raw.len());
    rest.push_str(&raw[..span.start()]);
    rest.push_str(&raw[span.end()..]);
    (Some(inner.as_str().trim().to_string()), rest)
}

/// Remove a single leading ```` ```json ```` and trailing ```` ``` ```` marker
pub fn strip_fences(text: &str) -> &str {
    let text = text.trim();
    let text = text.strip_prefix(FENCE_OPEN).unwrap_or(text);
    let text = text.strip_suffix(FENCE_CLOSE).unwrap_or(text);
    text.trim()
}

/// Parse raw model text into a [`Suggestion`]
pub fn parse_suggestion(raw: &str) -> Result<Suggestion> {
    let (reasoning, rest) = extract_reasoning(raw);
    let body = strip_fences(&rest);

    if body.is_empty() {
        return Err(WoquError::Parse(
            "empty content after removing markdown formatting".to_string(),
        ));
    }

    let parsed: RawSuggestion = serde_json::from_str(body)?;
    Ok(Suggestion {
        explanation: parsed.explanation,
        commands: parsed.commands,
        reasoning,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample() -> Suggestion {
        Suggestion {
            explanation: "The subcommand is misspelled.".to_string(),
            commands: vec![
                SuggestedCommand {
                    command: "git push".to_string(),
                    description: "Push the current branch".to_string(),
                },
                SuggestedCommand {
                    command: "git status".to_string(),
                    description: "Check what is left".to_string(),
                },
            ],
            reasoning: None,
        }
    }

    #[test]
    fn test_fenced_json_round_trip() {
        let s = sample();
        let raw = format!("```json\n{}\n```", serde_json::to_string(&s).unwrap());
        let parsed = parse_suggestion(&raw).unwrap();
        assert_eq!(parsed.explanation, s.explanation);
        assert_eq!(parsed.commands, s.commands);
    }

    #[test]
    fn test_unfenced_json() {
        let raw = r#"{"explanation":"typo","commands":[{"command":"ls","description":"list"}]}"#;
        let parsed = parse_suggestion(raw).unwrap();
        assert_eq!(parsed.commands[0].command, "ls");
        assert_eq!(parsed.reasoning, None);
    }

    #[test]
    fn test_reasoning_extraction() {
        let raw = r#"<think>R</think>{"explanation":"e","commands":[]}"#;
        let parsed = parse_suggestion(raw).unwrap();
        assert_eq!(parsed.reasoning.as_deref(), Some("R"));
        assert_eq!(parsed.explanation, "e");
    }

    #[test]
    fn test_multiline_reasoning_before_fence() {
        let raw = "<think>\nThe user typed gti.\nThey meant git.\n</think>\n\n```json\n{\"explanation\":\"typo\",\"commands\":[{\"command\":\"git status\",\"description\":\"status\"}]}\n```";
        let parsed = parse_suggestion(raw).unwrap();
        assert_eq!(
            parsed.reasoning.as_deref(),
            Some("The user typed gti.\nThey meant git.")
        );
        assert_eq!(parsed.commands[0].command, "git status");
    }

    #[test]
    fn test_only_first_reasoning_block_is_removed() {
        let raw = r#"<think>a</think><think>b</think>{"explanation":"e","commands":[]}"#;
        assert!(matches!(parse_suggestion(raw), Err(WoquError::Parse(_))));
    }

    #[test]
    fn test_empty_after_sanitizing_fails() {
        assert!(matches!(parse_suggestion(""), Err(WoquError::Parse(_))));
        assert!(matches!(
            parse_suggestion("<think>only thoughts</think>"),
            Err(WoquError::Parse(_))
        ));
        assert!(matches!(
            parse_suggestion("```json\n```"),
            Err(WoquError::Parse(_))
        ));
    }

    #[test]
    fn test_malformed_json_fails() {
        assert!(parse_suggestion("Sure! Try `git push`.").is_err());
        assert!(parse_suggestion(r#"{"explanation":"missing commands"}"#).is_err());
    }

    #[test]
    fn test_model_cannot_inject_reasoning_field() {
        let raw = r#"{"explanation":"e","commands":[],"reasoning":"fake"}"#;
        let parsed = parse_suggestion(raw).unwrap();
        assert_eq!(parsed.reasoning, None);
    }

    #[test]
    fn test_empty_commands_is_valid() {
        let parsed = parse_suggestion(r#"{"explanation":"nothing to do","commands":[]}"#).unwrap();
        assert!(parsed.commands.is_empty());
        assert!(parsed.validate().is_ok());
    }

    #[test]
    fn test_validate_command() {
        assert!(!validate_command(""));
        assert!(!validate_command("   "));
        assert!(!validate_command("sudo rm -rf /"));
        assert!(!validate_command("rm -rf /tmp/x"));
        assert!(validate_command("ls -la"));
    }

    #[test]
    fn test_validate_rejects_whole_suggestion() {
        let mut s = sample();
        s.commands.push(SuggestedCommand {
            command: "sudo rm -rf /".to_string(),
            description: "clean up".to_string(),
        });
        match s.validate() {
            Err(WoquError::UnsafeCommand { command }) => assert_eq!(command, "sudo rm -rf /"),
            other => panic!("expected UnsafeCommand, got {other:?}"),
        }
    }
}
