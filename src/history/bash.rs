//! bash history, both the on-disk file and the `history` builtin's output.

use chrono::{DateTime, TimeZone, Utc};

/// Parse `~/.bash_history`.
///
/// With `HISTTIMEFORMAT` set, bash writes a `#<epoch>` line before each
/// command; otherwise each line is a command and gets `now` as its timestamp.
pub fn parse_file(text: &str, now: DateTime<Utc>) -> Vec<(DateTime<Utc>, String)> {
    let mut entries = Vec::new();
    let mut pending: Option<DateTime<Utc>> = None;

    for line in text.lines() {
        if let Some(ts) = parse_timestamp_line(line, "#") {
            pending = Some(ts);
            continue;
        }
        let command = line.trim();
        if command.is_empty() {
            continue;
        }
        entries.push((pending.take().unwrap_or(now), command.to_string()));
    }

    entries
}

/// Parse a `#<epoch>` style marker line with the given prefix
pub(crate) fn parse_timestamp_line(line: &str, prefix: &str) -> Option<DateTime<Utc>> {
    let digits = line.trim().strip_prefix(prefix)?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Utc.timestamp_opt(digits.parse().ok()?, 0).single()
}

/// Parse the output of a shell's `history` builtin: `  42  git push`.
///
/// Leading history numbers (and bash's `*` modified marker) are stripped.
/// Lines without a number are kept as-is.
pub fn parse_builtin(text: &str, now: DateTime<Utc>) -> Vec<(DateTime<Utc>, String)> {
    text.lines()
        .filter_map(|line| {
            let command = strip_history_number(line.trim());
            if command.is_empty() {
                None
            } else {
                Some((now, command.to_string()))
            }
        })
        .collect()
}

fn strip_history_number(line: &str) -> &str {
    let digits_end = line
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(line.len());
    if digits_end == 0 {
        return line;
    }
    let rest = &line[digits_end..];
    let rest = rest.strip_prefix('*').unwrap_or(rest);
    if rest.is_empty() || rest.starts_with(char::is_whitespace) {
        rest.trim_start()
    } else {
        // A command that merely starts with digits, not a numbered entry
        line
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        Utc.timestamp_opt(1_800_000_000, 0).unwrap()
    }

    #[test]
    fn test_parse_file_with_timestamps() {
        let text = "#1700000000\ngit status\n#1700000100\nmake build\n";
        let entries = parse_file(text, now());
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].0.timestamp(), 1700000000);
        assert_eq!(entries[0].1, "git status");
        assert_eq!(entries[1].0.timestamp(), 1700000100);
        assert_eq!(entries[1].1, "make build");
    }

    #[test]
    fn test_parse_file_plain_lines_use_now() {
        let entries = parse_file("ls\n\ncd /tmp\n", now());
        assert_eq!(entries, vec![(now(), "ls".to_string()), (now(), "cd /tmp".to_string())]);
    }

    #[test]
    fn test_parse_file_mixed() {
        let text = "echo old\n#1700000000\necho new\n";
        let entries = parse_file(text, now());
        assert_eq!(entries[0].0, now());
        assert_eq!(entries[1].0.timestamp(), 1700000000);
    }

    #[test]
    fn test_comment_command_is_kept() {
        let entries = parse_file("# just a note\n", now());
        assert_eq!(entries[0].1, "# just a note");
    }

    #[test]
    fn test_parse_builtin_strips_numbers() {
        let text = "  101  git push\n  102* vim notes.md\n  103  cargo build --release\n";
        let commands: Vec<_> = parse_builtin(text, now())
            .into_iter()
            .map(|(_, c)| c)
            .collect();
        assert_eq!(
            commands,
            vec!["git push", "vim notes.md", "cargo build --release"]
        );
    }

    #[test]
    fn test_parse_builtin_keeps_unnumbered_lines() {
        let commands: Vec<_> = parse_builtin("ls -la\n7zip x a.7z\n", now())
            .into_iter()
            .map(|(_, c)| c)
            .collect();
        assert_eq!(commands, vec!["ls -la", "7zip x a.7z"]);
    }

    #[test]
    fn test_parse_timestamp_line_rejects_non_digits() {
        assert!(parse_timestamp_line("#12ab", "#").is_none());
        assert!(parse_timestamp_line("#", "#").is_none());
        assert!(parse_timestamp_line("#+1700000000", "#+").is_some());
    }
}
