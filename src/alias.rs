//! Shell alias functions that hand recent history to `woqu`.
//!
//! Reading the history file misses commands the running shell has not
//! flushed yet, so the alias exports the shell's own `history` output in
//! `WOQU_HISTORY` for the duration of one call.

use std::path::{Path, PathBuf};

use crate::error::{Result, WoquError};
use crate::history::{HISTORY_ENV, TOOL_NAME};
use crate::shell::ShellKind;

/// Marker comments around an installed alias
pub const ALIAS_MARKER_START: &str = "# >>> woqu alias >>>";
pub const ALIAS_MARKER_END: &str = "# <<< woqu alias <<<";

/// History lines exported per call
const HISTORY_WINDOW: usize = 30;

/// Generate the alias function for `shell`
pub fn generate_alias(shell: ShellKind) -> Result<String> {
    let name = TOOL_NAME;
    let var = HISTORY_ENV;
    let n = HISTORY_WINDOW;

    let script = match shell {
        ShellKind::Bash => format!(
            r#"{name}() {{
    export {var}="$(HISTTIMEFORMAT= history {n})"
    command {name} "$@"
    local status=$?
    unset {var}
    return $status
}}
"#
        ),
        ShellKind::Zsh | ShellKind::Ksh => format!(
            r#"{name}() {{
    export {var}="$(fc -l -{n})"
    command {name} "$@"
    typeset status_=$?
    unset {var}
    return $status_
}}
"#
        ),
        ShellKind::Fish => format!(
            r#"function {name} --description 'Fix the last failed command'
    set -lx {var} (history --max={n} --reverse | string collect)
    command {name} $argv
end
"#
        ),
        ShellKind::PowerShell => format!(
            r#"function {name} {{
    $env:{var} = (Get-History -Count {n} | ForEach-Object {{ $_.CommandLine }}) -join "`n"
    try {{
        & (Get-Command {name} -CommandType Application | Select-Object -First 1) @args
    }} finally {{
        Remove-Item Env:{var} -ErrorAction SilentlyContinue
    }}
}}
"#
        ),
        ShellKind::PosixSh | ShellKind::Dash | ShellKind::Csh | ShellKind::Tcsh => {
            return Err(WoquError::Config(format!(
                "alias generation is not supported for {shell}"
            )))
        }
    };
    Ok(script)
}

/// The alias wrapped with marker comments
pub fn generate_alias_with_markers(shell: ShellKind) -> Result<String> {
    let mut output = String::new();
    output.push_str(ALIAS_MARKER_START);
    output.push('\n');
    output.push_str(&generate_alias(shell)?);
    output.push_str(ALIAS_MARKER_END);
    output.push('\n');
    Ok(output)
}

/// Startup file the alias is installed into
pub fn rc_file(
    shell: ShellKind,
    home: &Path,
    config_dir: Option<&Path>,
    zdotdir: Option<&Path>,
) -> Option<PathBuf> {
    let config_dir = config_dir
        .map(Path::to_path_buf)
        .unwrap_or_else(|| home.join(".config"));
    match shell {
        ShellKind::Bash => Some(home.join(".bashrc")),
        ShellKind::Zsh => Some(zdotdir.unwrap_or(home).join(".zshrc")),
        ShellKind::Ksh => Some(home.join(".kshrc")),
        ShellKind::Fish => Some(config_dir.join("fish").join("conf.d").join("woqu.fish")),
        ShellKind::PowerShell => Some(
            config_dir
                .join("powershell")
                .join("Microsoft.PowerShell_profile.ps1"),
        ),
        ShellKind::PosixSh | ShellKind::Dash | ShellKind::Csh | ShellKind::Tcsh => None,
    }
}

/// [`rc_file`] for the current user
pub fn default_rc_file(shell: ShellKind) -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| WoquError::Config("could not determine home directory".to_string()))?;
    let zdotdir = std::env::var_os("ZDOTDIR").map(PathBuf::from);
    rc_file(
        shell,
        &home,
        dirs::config_dir().as_deref(),
        zdotdir.as_deref(),
    )
    .ok_or_else(|| WoquError::Config(format!("no startup file known for {shell}")))
}

/// Check if the alias is already installed in a file
pub fn alias_installed(rc_path: &Path) -> bool {
    std::fs::read_to_string(rc_path)
        .map(|contents| contents.lines().any(|l| l.trim() == ALIAS_MARKER_START))
        .unwrap_or(false)
}

/// Append the marked alias to `rc_path`. Returns false if it was already there.
pub fn install_alias(shell: ShellKind, rc_path: &Path) -> Result<bool> {
    let block = generate_alias_with_markers(shell)?;
    if alias_installed(rc_path) {
        return Ok(false);
    }

    if let Some(parent) = rc_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut content = match std::fs::read_to_string(rc_path) {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(err) => return Err(err.into()),
    };
    if !content.is_empty() {
        if !content.ends_with('\n') {
            content.push('\n');
        }
        content.push('\n');
    }
    content.push_str(&block);

    std::fs::write(rc_path, content)?;
    tracing::debug!(path = %rc_path.display(), %shell, "installed alias");
    Ok(true)
}

/// Remove the marked alias block from `rc_path`. Returns false if none was found.
pub fn uninstall_alias(rc_path: &Path) -> Result<bool> {
    if !alias_installed(rc_path) {
        return Ok(false);
    }

    let content = std::fs::read_to_string(rc_path)?;
    let mut new_content = String::with_capacity(content.len());
    let mut in_block = false;

    for line in content.lines() {
        match line.trim() {
            ALIAS_MARKER_START => in_block = true,
            ALIAS_MARKER_END => in_block = false,
            _ if !in_block => {
                new_content.push_str(line);
                new_content.push('\n');
            }
            _ => {}
        }
    }

    // drop the separator line install added
    while new_content.ends_with("\n\n") {
        new_content.pop();
    }

    std::fs::write(rc_path, new_content)?;
    tracing::debug!(path = %rc_path.display(), "removed alias");
    Ok(true)
}
