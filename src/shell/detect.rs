//! Detect the interactive shell that launched this process.
//!
//! The walk itself is platform-neutral: it only needs a way to turn a pid into
//! an executable name and a parent pid. Each platform supplies that through
//! [`ProcessTable`].

use std::collections::HashSet;

use super::ShellKind;

/// Name and parent of a single process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessInfo {
    pub name: String,
    pub parent: Option<u32>,
}

/// Read-only view of the OS process table
pub trait ProcessTable {
    /// Look up a process, returning `None` if it no longer exists or can't be read
    fn lookup(&self, pid: u32) -> Option<ProcessInfo>;
}

/// Detect the shell for the current process using the platform process table
pub fn detect_shell() -> Option<ShellKind> {
    let shell = detect_shell_with(&SystemProcessTable, std::process::id());
    match shell {
        Some(kind) => tracing::debug!(shell = %kind, "detected shell from process tree"),
        None => tracing::debug!("no shell found in process tree"),
    }
    shell
}

/// Walk from `start` towards the root until a known shell is found.
///
/// Stops on a failed lookup, a process that is its own parent, or a pid that
/// was already visited.
pub fn detect_shell_with(table: &impl ProcessTable, start: u32) -> Option<ShellKind> {
    let mut visited = HashSet::new();
    let mut pid = start;

    loop {
        if !visited.insert(pid) {
            tracing::debug!(pid, "process tree cycle detected");
            return None;
        }

        let info = table.lookup(pid)?;
        if let Some(kind) = ShellKind::from_process_name(&info.name) {
            return Some(kind);
        }

        match info.parent {
            Some(parent) if parent != pid && parent != 0 => pid = parent,
            _ => return None,
        }
    }
}

/// Process table backed by the running OS
pub struct SystemProcessTable;

#[cfg(target_os = "linux")]
impl ProcessTable for SystemProcessTable {
    fn lookup(&self, pid: u32) -> Option<ProcessInfo> {
        let stat = std::fs::read_to_string(format!("/proc/{pid}/stat")).ok()?;
        parse_proc_stat(&stat)
    }
}

#[cfg(all(unix, not(target_os = "linux")))]
impl ProcessTable for SystemProcessTable {
    fn lookup(&self, pid: u32) -> Option<ProcessInfo> {
        let output = std::process::Command::new("ps")
            .args(["-o", "ppid=", "-o", "comm=", "-p", &pid.to_string()])
            .output()
            .ok()?;
        if !output.status.success() {
            return None;
        }
        parse_ps_line(&String::from_utf8_lossy(&output.stdout))
    }
}

#[cfg(not(unix))]
impl ProcessTable for SystemProcessTable {
    fn lookup(&self, _pid: u32) -> Option<ProcessInfo> {
        None
    }
}

/// Parse `/proc/<pid>/stat`: `pid (comm) state ppid ...`.
///
/// `comm` may itself contain spaces and parentheses, so the name ends at the
/// last `)` in the line.
#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
fn parse_proc_stat(stat: &str) -> Option<ProcessInfo> {
    let open = stat.find('(')?;
    let close = stat.rfind(')')?;
    if close <= open {
        return None;
    }
    let name = stat[open + 1..close].to_string();
    let mut rest = stat[close + 1..].split_whitespace();
    let _state = rest.next()?;
    let parent = rest.next().and_then(|p| p.parse().ok());
    Some(ProcessInfo { name, parent })
}

/// Parse one line of `ps -o ppid= -o comm=` output
#[cfg_attr(not(all(unix, not(target_os = "linux"))), allow(dead_code))]
fn parse_ps_line(line: &str) -> Option<ProcessInfo> {
    let line = line.trim();
    let (ppid, comm) = line.split_once(char::is_whitespace)?;
    Some(ProcessInfo {
        name: comm.trim().to_string(),
        parent: ppid.trim().parse().ok(),
    })
}
