//! Shell kinds and the per-shell facts the rest of the crate needs.

pub mod detect;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

pub use detect::{detect_shell, detect_shell_with, ProcessTable};

/// Interactive shells the tool knows how to read history from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ShellKind {
    /// POSIX `sh`
    #[value(name = "sh")]
    #[serde(rename = "sh")]
    PosixSh,
    Bash,
    Zsh,
    Fish,
    Csh,
    Tcsh,
    Ksh,
    Dash,
    #[value(name = "powershell", alias = "pwsh")]
    PowerShell,
}

/// Process executable names mapped to the shell they identify
const PROCESS_NAMES: &[(&str, ShellKind)] = &[
    ("sh", ShellKind::PosixSh),
    ("bash", ShellKind::Bash),
    ("zsh", ShellKind::Zsh),
    ("fish", ShellKind::Fish),
    ("csh", ShellKind::Csh),
    ("tcsh", ShellKind::Tcsh),
    ("ksh", ShellKind::Ksh),
    ("ksh93", ShellKind::Ksh),
    ("mksh", ShellKind::Ksh),
    ("dash", ShellKind::Dash),
    ("pwsh", ShellKind::PowerShell),
    ("powershell", ShellKind::PowerShell),
];

impl ShellKind {
    /// Shell used when detection finds nothing
    pub const FALLBACK: ShellKind = ShellKind::Zsh;

    /// Map a process executable name (or path) to a shell kind.
    ///
    /// Login shells show up as `-zsh`, and Windows names carry `.exe`; both
    /// decorations are ignored.
    pub fn from_process_name(name: &str) -> Option<Self> {
        let base = Path::new(name.trim())
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("");
        let base = base.trim_start_matches('-');
        let base = base.strip_suffix(".exe").unwrap_or(base);

        PROCESS_NAMES
            .iter()
            .find(|(candidate, _)| candidate.eq_ignore_ascii_case(base))
            .map(|(_, kind)| *kind)
    }

    /// Short lowercase name, as used in config and on the command line
    pub fn name(&self) -> &'static str {
        match self {
            ShellKind::PosixSh => "sh",
            ShellKind::Bash => "bash",
            ShellKind::Zsh => "zsh",
            ShellKind::Fish => "fish",
            ShellKind::Csh => "csh",
            ShellKind::Tcsh => "tcsh",
            ShellKind::Ksh => "ksh",
            ShellKind::Dash => "dash",
            ShellKind::PowerShell => "powershell",
        }
    }

    /// Interpreter binary looked up on `PATH`
    pub fn binary(&self) -> &'static str {
        match self {
            ShellKind::PowerShell => "pwsh",
            other => other.name(),
        }
    }

    /// Arguments that make the interpreter run a single command string
    pub fn command_flag(&self) -> &'static [&'static str] {
        match self {
            ShellKind::PowerShell => &["-NoProfile", "-Command"],
            _ => &["-c"],
        }
    }

    /// Default on-disk history location, relative to the home directory
    pub fn default_history_file(&self, home: &Path, data_dir: Option<&Path>) -> Option<PathBuf> {
        match self {
            ShellKind::Zsh => Some(home.join(".zsh_history")),
            ShellKind::Bash => Some(home.join(".bash_history")),
            ShellKind::Fish => Some(
                data_dir
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| home.join(".local").join("share"))
                    .join("fish")
                    .join("fish_history"),
            ),
            ShellKind::Csh | ShellKind::Tcsh => Some(home.join(".history")),
            ShellKind::Ksh | ShellKind::PosixSh | ShellKind::Dash => {
                Some(home.join(".sh_history"))
            }
            ShellKind::PowerShell => Some(
                data_dir
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| home.join(".local").join("share"))
                    .join("powershell")
                    .join("PSReadLine")
                    .join("ConsoleHost_history.txt"),
            ),
        }
    }

    /// Environment variable that overrides the history file, if the shell has one
    pub fn history_file_env(&self) -> Option<&'static str> {
        match self {
            ShellKind::Fish | ShellKind::PowerShell => None,
            _ => Some("HISTFILE"),
        }
    }
}

impl fmt::Display for ShellKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for ShellKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ShellKind::from_process_name(s).ok_or_else(|| {
            format!(
                "Unknown shell: {}. Valid options: sh, bash, zsh, fish, csh, tcsh, ksh, dash, powershell",
                s
            )
        })
    }
}
