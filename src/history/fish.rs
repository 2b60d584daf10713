//! fish history: YAML-like records.
//!
//! ```text
//! - cmd: git push
//!   when: 1700000000
//!   paths:
//!     - src/main.rs
//! ```

use chrono::{DateTime, TimeZone, Utc};

pub fn parse(text: &str) -> Vec<(DateTime<Utc>, String)> {
    let mut entries = Vec::new();
    let mut command: Option<String> = None;
    let mut when: Option<DateTime<Utc>> = None;

    let mut flush = |command: &mut Option<String>, when: &mut Option<DateTime<Utc>>| {
        if let (Some(cmd), Some(ts)) = (command.take(), when.take()) {
            entries.push((ts, cmd));
        }
    };

    for line in text.lines() {
        if let Some(cmd) = line.strip_prefix("- cmd:") {
            flush(&mut command, &mut when);
            let cmd = unescape(cmd.trim());
            if !cmd.is_empty() {
                command = Some(cmd);
            }
        } else if let Some(ts) = line.trim_start().strip_prefix("when:") {
            when = ts
                .trim()
                .parse::<i64>()
                .ok()
                .and_then(|epoch| Utc.timestamp_opt(epoch, 0).single());
        }
        // `paths:` and its list items carry nothing we need
    }
    flush(&mut command, &mut when);

    entries
}

/// fish writes `\\` for a backslash and `\n` for a newline inside `cmd:`
fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('\\') => out.push('\\'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_records() {
        let text = "- cmd: git status\n  when: 1700000000\n- cmd: cargo build\n  when: 1700000050\n  paths:\n    - Cargo.toml\n";
        let entries = parse(text);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].0.timestamp(), 1700000000);
        assert_eq!(entries[0].1, "git status");
        assert_eq!(entries[1].0.timestamp(), 1700000050);
        assert_eq!(entries[1].1, "cargo build");
    }

    #[test]
    fn test_record_without_when_is_dropped() {
        let entries = parse("- cmd: orphan\n- cmd: ls\n  when: 1700000000\n");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].1, "ls");
    }

    #[test]
    fn test_escaped_command() {
        let entries = parse("- cmd: echo a\\nb \\\\d\n  when: 1700000000\n");
        assert_eq!(entries[0].1, "echo a\nb \\d");
    }

    #[test]
    fn test_garbage_is_ignored() {
        assert!(parse("not yaml at all\n").is_empty());
        assert!(parse("").is_empty());
    }
}
