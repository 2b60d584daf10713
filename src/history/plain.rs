//! Line-oriented history files without a rich record format.

use chrono::{DateTime, Utc};

use super::bash::parse_timestamp_line;

/// One command per line, no timestamps (ksh, sh, dash, PowerShell).
///
/// ksh93 and mksh keep a binary header and separate some records with NUL
/// bytes, so NULs split records and control-character noise is dropped.
pub fn parse(text: &str, now: DateTime<Utc>) -> Vec<(DateTime<Utc>, String)> {
    text.split(['\n', '\0'])
        .map(|line| line.trim_matches(|c: char| c.is_whitespace() || c.is_control()))
        .filter(|line| !line.is_empty())
        .map(|line| (now, line.to_string()))
        .collect()
}

/// tcsh/csh `~/.history`: a `#+<epoch>` line precedes each command
pub fn parse_tcsh(text: &str, now: DateTime<Utc>) -> Vec<(DateTime<Utc>, String)> {
    let mut entries = Vec::new();
    let mut pending = None;

    for line in text.lines() {
        if let Some(ts) = parse_timestamp_line(line, "#+") {
            pending = Some(ts);
            continue;
        }
        let command = line.trim();
        if !command.is_empty() {
            entries.push((pending.take().unwrap_or(now), command.to_string()));
        }
    }

    entries
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.timestamp_opt(1_800_000_000, 0).unwrap()
    }

    #[test]
    fn test_plain_lines() {
        let entries = parse("ls\n  \npwd\r\n", now());
        let commands: Vec<_> = entries.iter().map(|(_, c)| c.as_str()).collect();
        assert_eq!(commands, vec!["ls", "pwd"]);
    }

    #[test]
    fn test_plain_binary_header() {
        let entries = parse("\u{81}\u{1}ls -l\0make\0", now());
        let commands: Vec<_> = entries.iter().map(|(_, c)| c.as_str()).collect();
        assert_eq!(commands, vec!["ls -l", "make"]);
    }

    #[test]
    fn test_tcsh_timestamps() {
        let entries = parse_tcsh("#+1700000000\nsetenv FOO bar\n#+1700000009\nls\n", now());
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].0.timestamp(), 1700000000);
        assert_eq!(entries[0].1, "setenv FOO bar");
        assert_eq!(entries[1].0.timestamp(), 1700000009);
    }
}
