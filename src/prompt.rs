//! Prompt construction for the correction request.

use std::path::Path;

/// Correction template with `{cwd}`, `{history}`, `{error}` and `{command}` slots
const TEMPLATE_CORRECTION: &str = include_str!("prompts/correction.txt");

/// Build the prompt sent to the completion endpoint.
///
/// Placeholders are filled in a single pass, so braces inside captured
/// stderr or the command text are never expanded a second time.
pub fn build_prompt(cwd: &Path, history: &[String], error: &str, command: &str) -> String {
    let cwd = cwd.display().to_string();
    let history = history.join("\n");
    let slots = [
        ("{cwd}", cwd.as_str()),
        ("{history}", history.as_str()),
        ("{error}", error.trim()),
        ("{command}", command),
    ];

    let mut out = String::with_capacity(TEMPLATE_CORRECTION.len() + history.len() + error.len());
    let mut rest = TEMPLATE_CORRECTION;
    'scan: while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let tail = &rest[open..];
        for (slot, value) in slots {
            if let Some(after) = tail.strip_prefix(slot) {
                out.push_str(value);
                rest = after;
                continue 'scan;
            }
        }
        out.push('{');
        rest = &tail[1..];
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_prompt_contains_context() {
        let history = vec!["cd project".to_string(), "gti status".to_string()];
        let prompt = build_prompt(
            &PathBuf::from("/home/user/project"),
            &history,
            "zsh: command not found: gti\n",
            "gti status",
        );

        assert!(prompt.contains("Current directory: /home/user/project"));
        assert!(prompt.contains("cd project\ngti status"));
        assert!(prompt.contains("Error message: zsh: command not found: gti"));
        assert!(prompt.contains("Incorrect command: gti status"));
        assert!(prompt.contains("\"explanation\""));
        assert!(!prompt.contains("{cwd}"));
        assert!(!prompt.contains("{history}"));
    }

    #[test]
    fn test_placeholders_in_values_are_not_expanded() {
        let prompt = build_prompt(
            &PathBuf::from("/tmp"),
            &[],
            "unexpected token {command}",
            "awk '{print $1}'",
        );
        assert!(prompt.contains("unexpected token {command}"));
        assert!(prompt.contains("Incorrect command: awk '{print $1}'"));
    }

    #[test]
    fn test_json_braces_in_template_survive() {
        let prompt = build_prompt(&PathBuf::from("/"), &[], "", "ls");
        assert!(prompt.contains("\"commands\": ["));
        assert!(prompt.contains("{\n"));
    }
}
