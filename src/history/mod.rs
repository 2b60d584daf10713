//! Shell history: locating the store, decoding each shell's format, and
//! re-running the most recent command so its failure can be diagnosed.

pub mod bash;
pub mod fish;
pub mod plain;
pub mod zsh;

pub use bash::{parse_builtin as parse_bash_builtin, parse_file as parse_bash};
pub use fish::parse as parse_fish;
pub use plain::{parse as parse_plain, parse_tcsh};
pub use zsh::parse as parse_zsh;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use crate::executor::{Execute, ExecutionResult};
use crate::shell::ShellKind;

/// Number of most recent commands kept as context
pub const MAX_ENTRIES: usize = 10;

/// Environment variable the alias function fills with `history` output
pub const HISTORY_ENV: &str = "WOQU_HISTORY";

/// Name this tool is invoked as; entries running it are dropped
pub const TOOL_NAME: &str = "woqu";

/// One recorded shell invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub command: String,
    pub timestamp: DateTime<Utc>,
    /// Present only for the command that was re-run for diagnosis
    pub result: Option<ExecutionResult>,
}

impl HistoryEntry {
    pub fn new(command: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            command: command.into(),
            timestamp,
            result: None,
        }
    }

    pub fn with_result(mut self, result: ExecutionResult) -> Self {
        self.result = Some(result);
        self
    }
}

/// Where a shell's history comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HistorySource {
    /// `history` builtin output exported by the alias function
    Injected(String),
    /// On-disk history file
    File(PathBuf),
    /// Nothing could be located
    Unavailable,
}

impl HistorySource {
    /// Resolve the source for `kind` from the process environment
    pub fn from_env(kind: ShellKind) -> Self {
        Self::resolve(
            kind,
            |key| std::env::var(key).ok(),
            dirs::home_dir().as_deref(),
            dirs::data_dir().as_deref(),
        )
    }

    /// Resolve the source for `kind`.
    ///
    /// Precedence: injected blob, then the shell's override variable, then
    /// the shell's default file under `home`.
    pub fn resolve(
        kind: ShellKind,
        env: impl Fn(&str) -> Option<String>,
        home: Option<&Path>,
        data_dir: Option<&Path>,
    ) -> Self {
        if let Some(blob) = env(HISTORY_ENV).filter(|b| !b.trim().is_empty()) {
            return HistorySource::Injected(blob);
        }

        if let Some(var) = kind.history_file_env() {
            if let Some(path) = env(var).filter(|p| !p.is_empty()) {
                return HistorySource::File(PathBuf::from(path));
            }
        }

        if kind == ShellKind::Fish {
            // fish keeps one file per session name: `<name>_history`
            if let (Some(session), Some(home)) = (env("fish_history"), home) {
                if !session.is_empty() && session != "default" {
                    let base = data_dir
                        .map(Path::to_path_buf)
                        .unwrap_or_else(|| home.join(".local").join("share"));
                    return HistorySource::File(
                        base.join("fish").join(format!("{session}_history")),
                    );
                }
            }
        }

        home.and_then(|home| kind.default_history_file(home, data_dir))
            .map(HistorySource::File)
            .unwrap_or(HistorySource::Unavailable)
    }
}

/// Whether `command` runs this tool itself, with or without a path
pub fn is_self_invocation(command: &str) -> bool {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| {
            Regex::new(&format!(
                r"(^|\s)(\S*/)?{}(\s|$)",
                regex::escape(TOOL_NAME)
            ))
            .ok()
        })
        .as_ref()
        .map(|re| re.is_match(command))
        .unwrap_or(false)
}

/// Decode history bytes: UTF-8 first, Latin-1 when that fails.
///
/// The fallback is windows-1252, the Latin-1 superset that maps 0x80..=0x9F
/// to printable characters (smart quotes, dashes) instead of C1 controls.
pub fn decode_bytes(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(_) => {
            tracing::debug!("history is not valid UTF-8, decoding as Latin-1");
            let (text, _) = encoding_rs::WINDOWS_1252.decode_without_bom_handling(bytes);
            text.into_owned()
        }
    }
}

/// Decode raw history text for `kind` into (timestamp, command) pairs
pub fn parse_history(
    kind: ShellKind,
    source: &HistorySource,
    text: &str,
    now: DateTime<Utc>,
) -> Vec<(DateTime<Utc>, String)> {
    if let HistorySource::Injected(_) = source {
        return match kind {
            // raw extended-history records, e.g. `tail -n 30 $HISTFILE`
            ShellKind::Zsh if text.trim_start().starts_with(": ") => zsh::parse(text),
            _ => bash::parse_builtin(text, now),
        };
    }

    match kind {
        ShellKind::Zsh => zsh::parse(text),
        ShellKind::Bash => bash::parse_file(text, now),
        ShellKind::Fish => fish::parse(text),
        ShellKind::Csh | ShellKind::Tcsh => plain::parse_tcsh(text, now),
        ShellKind::Ksh | ShellKind::PosixSh | ShellKind::Dash | ShellKind::PowerShell => {
            plain::parse(text, now)
        }
    }
}

/// Keep at most the last [`MAX_ENTRIES`] commands that don't run this tool
pub fn recent_entries(parsed: Vec<(DateTime<Utc>, String)>) -> Vec<HistoryEntry> {
    let filtered: Vec<HistoryEntry> = parsed
        .into_iter()
        .filter(|(_, command)| !is_self_invocation(command))
        .map(|(timestamp, command)| HistoryEntry::new(command, timestamp))
        .collect();
    let skip = filtered.len().saturating_sub(MAX_ENTRIES);
    filtered.into_iter().skip(skip).collect()
}

/// Attach `result` to every entry whose text equals the most recent command
pub fn attach_result(entries: &mut [HistoryEntry], result: &ExecutionResult) {
    let Some(last) = entries.last().map(|e| e.command.clone()) else {
        return;
    };
    for entry in entries.iter_mut().filter(|e| e.command == last) {
        entry.result = Some(result.clone());
    }
}

/// Reads a shell's recent history and re-runs its latest command
pub struct HistoryReader<'a, E: Execute + ?Sized> {
    kind: ShellKind,
    source: HistorySource,
    executor: &'a E,
}

impl<'a, E: Execute + ?Sized> HistoryReader<'a, E> {
    pub fn new(kind: ShellKind, source: HistorySource, executor: &'a E) -> Self {
        Self {
            kind,
            source,
            executor,
        }
    }

    /// Load the recent window without running anything.
    ///
    /// An unreadable source yields an empty list.
    pub fn recent_commands(&self) -> Vec<HistoryEntry> {
        let now = Utc::now();
        let text = match &self.source {
            HistorySource::Injected(blob) => blob.clone(),
            HistorySource::File(path) => match std::fs::read(path) {
                Ok(bytes) if self.kind == ShellKind::Zsh => decode_bytes(&zsh::unmetafy(&bytes)),
                Ok(bytes) => decode_bytes(&bytes),
                Err(err) => {
                    tracing::warn!(path = %path.display(), error = %err, "could not read history file");
                    return Vec::new();
                }
            },
            HistorySource::Unavailable => {
                tracing::warn!(shell = %self.kind, "no history source available");
                return Vec::new();
            }
        };

        let parsed = parse_history(self.kind, &self.source, &text, now);
        tracing::debug!(shell = %self.kind, parsed = parsed.len(), "parsed history");
        recent_entries(parsed)
    }

    /// Recent history with the latest command re-run and its result attached.
    ///
    /// An explicit command bypasses history and is the only entry.
    pub async fn get_history(&self, explicit: Option<&str>) -> Vec<HistoryEntry> {
        let mut entries = match explicit {
            Some(command) => vec![HistoryEntry::new(command, Utc::now())],
            None => self.recent_commands(),
        };

        let Some(last) = entries.last().map(|e| e.command.clone()) else {
            return entries;
        };

        let result = self.executor.execute(&last).await;
        attach_result(&mut entries, &result);
        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::collections::HashMap;
    use std::io::Write;
    use std::sync::Mutex;

    struct RecordingExecutor {
        calls: Mutex<Vec<String>>,
        exit_code: i32,
    }

    impl RecordingExecutor {
        fn new(exit_code: i32) -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                exit_code,
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait::async_trait]
    impl Execute for RecordingExecutor {
        async fn execute(&self, command: &str) -> ExecutionResult {
            self.calls.lock().unwrap().push(command.to_string());
            ExecutionResult {
                stdout: String::new(),
                stderr: "boom".to_string(),
                exit_code: self.exit_code,
                timed_out: false,
            }
        }
    }

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_self_invocation() {
        assert!(is_self_invocation("woqu"));
        assert!(is_self_invocation("woqu --dry-run"));
        assert!(is_self_invocation("/usr/local/bin/woqu -p openai"));
        assert!(is_self_invocation("sudo woqu"));
        assert!(is_self_invocation("./target/release/woqu"));
        assert!(!is_self_invocation("woquX"));
        assert!(!is_self_invocation("cat woqu.log"));
        assert!(!is_self_invocation("git status"));
    }

    #[test]
    fn test_resolve_prefers_injected_history() {
        let env = env_from(&[(HISTORY_ENV, "  1  ls\n"), ("HISTFILE", "/tmp/h")]);
        let source = HistorySource::resolve(ShellKind::Bash, env, Some(Path::new("/home/u")), None);
        assert_eq!(source, HistorySource::Injected("  1  ls\n".to_string()));
    }

    #[test]
    fn test_resolve_histfile_override() {
        let env = env_from(&[("HISTFILE", "/tmp/custom_history")]);
        let source = HistorySource::resolve(ShellKind::Zsh, env, Some(Path::new("/home/u")), None);
        assert_eq!(source, HistorySource::File(PathBuf::from("/tmp/custom_history")));
    }

    #[test]
    fn test_resolve_default_file() {
        let source =
            HistorySource::resolve(ShellKind::Bash, env_from(&[]), Some(Path::new("/home/u")), None);
        assert_eq!(source, HistorySource::File(PathBuf::from("/home/u/.bash_history")));
    }

    #[test]
    fn test_resolve_fish_session() {
        let env = env_from(&[("fish_history", "work")]);
        let source = HistorySource::resolve(ShellKind::Fish, env, Some(Path::new("/home/u")), None);
        assert_eq!(
            source,
            HistorySource::File(PathBuf::from("/home/u/.local/share/fish/work_history"))
        );
    }

    #[test]
    fn test_resolve_without_home() {
        let source = HistorySource::resolve(ShellKind::Zsh, env_from(&[]), None, None);
        assert_eq!(source, HistorySource::Unavailable);
    }

    #[test]
    fn test_decode_bytes_latin1_fallback() {
        let bytes = b"echo caf\xe9";
        assert_eq!(decode_bytes(bytes), "echo café");
        assert_eq!(decode_bytes("echo ok".as_bytes()), "echo ok");
    }

    #[test]
    fn test_decode_bytes_maps_c1_range_to_printable() {
        let bytes = b"echo \x93hi\x94 \x80";
        assert_eq!(decode_bytes(bytes), "echo \u{201c}hi\u{201d} \u{20ac}");
    }

    #[test]
    fn test_recent_entries_window_and_filter() {
        let ts = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let mut parsed: Vec<_> = (0..15).map(|i| (ts, format!("cmd {i}"))).collect();
        parsed.push((ts, "woqu".to_string()));
        let entries = recent_entries(parsed);
        assert_eq!(entries.len(), MAX_ENTRIES);
        assert_eq!(entries.first().unwrap().command, "cmd 5");
        assert_eq!(entries.last().unwrap().command, "cmd 14");
    }

    #[test]
    fn test_attach_result_matches_last_command_text() {
        let ts = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let mut entries = vec![
            HistoryEntry::new("make", ts),
            HistoryEntry::new("vim Makefile", ts),
            HistoryEntry::new("make", ts),
        ];
        let result = ExecutionResult {
            stdout: String::new(),
            stderr: "err".to_string(),
            exit_code: 2,
            timed_out: false,
        };
        attach_result(&mut entries, &result);
        assert!(entries[0].result.is_some());
        assert!(entries[1].result.is_none());
        assert!(entries[2].result.is_some());
    }

    #[tokio::test]
    async fn test_get_history_explicit_command_bypasses_history() {
        let executor = RecordingExecutor::new(1);
        let reader = HistoryReader::new(ShellKind::Zsh, HistorySource::Unavailable, &executor);
        let entries = reader.get_history(Some("git pshu")).await;

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].command, "git pshu");
        assert_eq!(entries[0].result.as_ref().unwrap().exit_code, 1);
        assert_eq!(executor.calls(), vec!["git pshu"]);
    }

    #[tokio::test]
    async fn test_get_history_reads_zsh_file_and_reruns_last_once() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, ": 1700000000:0;cd /missing").unwrap();
        writeln!(file, ": 1700000001:0;woqu").unwrap();
        writeln!(file, ": 1700000002:0;ls -la").unwrap();
        writeln!(file, ": 1700000003:0;git status").unwrap();
        writeln!(file, ": 1700000004:0;ls -la").unwrap();

        let executor = RecordingExecutor::new(1);
        let reader = HistoryReader::new(
            ShellKind::Zsh,
            HistorySource::File(file.path().to_path_buf()),
            &executor,
        );
        let entries = reader.get_history(None).await;

        let commands: Vec<_> = entries.iter().map(|e| e.command.as_str()).collect();
        assert_eq!(commands, vec!["cd /missing", "ls -la", "git status", "ls -la"]);
        assert_eq!(entries[3].timestamp.timestamp(), 1700000004);
        assert!(entries[0].result.is_none());
        assert!(entries[1].result.is_some());
        assert!(entries[2].result.is_none());
        assert!(entries[3].result.is_some());
        assert_eq!(executor.calls(), vec!["ls -la"]);
    }

    #[tokio::test]
    async fn test_get_history_latin1_zsh_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b": 1700000000:0;cat caf\xe9.txt\n").unwrap();

        let executor = RecordingExecutor::new(1);
        let reader = HistoryReader::new(
            ShellKind::Zsh,
            HistorySource::File(file.path().to_path_buf()),
            &executor,
        );
        let entries = reader.recent_commands();
        assert_eq!(entries[0].command, "cat café.txt");
    }

    #[tokio::test]
    async fn test_get_history_missing_file_is_empty() {
        let executor = RecordingExecutor::new(1);
        let reader = HistoryReader::new(
            ShellKind::Bash,
            HistorySource::File(PathBuf::from("/nonexistent/woqu/history")),
            &executor,
        );
        assert!(reader.get_history(None).await.is_empty());
        assert!(executor.calls().is_empty());
    }

    #[tokio::test]
    async fn test_get_history_injected_bash_blob() {
        let executor = RecordingExecutor::new(127);
        let blob = "  10  cd project\n  11  woqu\n  12  carg build\n".to_string();
        let reader =
            HistoryReader::new(ShellKind::Bash, HistorySource::Injected(blob), &executor);
        let entries = reader.get_history(None).await;

        let commands: Vec<_> = entries.iter().map(|e| e.command.as_str()).collect();
        assert_eq!(commands, vec!["cd project", "carg build"]);
        assert_eq!(executor.calls(), vec!["carg build"]);
    }

    #[test]
    fn test_parse_history_dispatch() {
        let now = Utc.timestamp_opt(1_800_000_000, 0).unwrap();
        let fish = parse_history(
            ShellKind::Fish,
            &HistorySource::File(PathBuf::from("x")),
            "- cmd: ls\n  when: 1700000000\n",
            now,
        );
        assert_eq!(fish.len(), 1);

        let tcsh = parse_history(
            ShellKind::Tcsh,
            &HistorySource::File(PathBuf::from("x")),
            "#+1700000000\nls\n",
            now,
        );
        assert_eq!(tcsh[0].0.timestamp(), 1700000000);
    }
}
