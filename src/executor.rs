//! Run shell commands under the detected interpreter with a wall-clock limit.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};

use crate::shell::ShellKind;

/// Default limit for a single command
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Time a command gets to exit after SIGTERM before it is killed outright
const KILL_GRACE: Duration = Duration::from_secs(2);

/// Time allowed for output to drain once the shell itself has exited
const DRAIN_GRACE: Duration = Duration::from_millis(200);

/// Exit code reported for a process terminated by SIGTERM
#[cfg(unix)]
pub const SIGTERM_EXIT: i32 = libc::SIGTERM;
#[cfg(not(unix))]
pub const SIGTERM_EXIT: i32 = 15;

/// Exit code reported when the interpreter could not be started
pub const SPAWN_FAILED_EXIT: i32 = 127;

/// Captured outcome of one command run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub stdout: String,
    pub stderr: String,
    /// Exit status, or the signal number if the process was killed by a signal
    pub exit_code: i32,
    /// True only when this executor terminated the process for running too long
    pub timed_out: bool,
}

impl ExecutionResult {
    pub fn success(&self) -> bool {
        self.exit_code == 0 && !self.timed_out
    }
}

/// Something that can run a command string and capture its outcome
#[async_trait]
pub trait Execute: Send + Sync {
    async fn execute(&self, command: &str) -> ExecutionResult;
}

/// Runs commands as `<shell> -c <command>`, one at a time
#[derive(Debug, Clone)]
pub struct CommandExecutor {
    shell: ShellKind,
    timeout: Duration,
}

impl CommandExecutor {
    pub fn new(shell: ShellKind) -> Self {
        Self {
            shell,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn spawn(&self, command: &str) -> std::io::Result<Child> {
        let mut cmd = Command::new(self.shell.binary());
        cmd.args(self.shell.command_flag())
            .arg(command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        cmd.process_group(0);
        cmd.spawn()
    }

    async fn run(&self, command: &str) -> ExecutionResult {
        let mut child = match self.spawn(command) {
            Ok(child) => child,
            Err(err) => {
                tracing::warn!(shell = %self.shell, error = %err, "failed to start shell");
                return ExecutionResult {
                    stdout: String::new(),
                    stderr: format!("failed to start {}: {}", self.shell.binary(), err),
                    exit_code: SPAWN_FAILED_EXIT,
                    timed_out: false,
                };
            }
        };
        let group = ProcessGroup::of(&child);

        let mut stdout = child.stdout.take();
        let mut stderr = child.stderr.take();
        let mut out = Vec::new();
        let mut err = Vec::new();

        let status = {
            let io = async {
                tokio::join!(
                    read_pipe(stdout.as_mut(), &mut out),
                    read_pipe(stderr.as_mut(), &mut err)
                );
            };
            tokio::pin!(io);
            let deadline = tokio::time::sleep(self.timeout);
            tokio::pin!(deadline);
            let mut io_done = false;

            // Only the shell's own exit races the deadline. Background jobs
            // can hold the pipes open long after it.
            let status = loop {
                tokio::select! {
                    status = child.wait() => break Some(status),
                    () = &mut io, if !io_done => io_done = true,
                    () = &mut deadline => break None,
                }
            };

            if status.is_some() && !io_done {
                if tokio::time::timeout(DRAIN_GRACE, &mut io).await.is_err() {
                    group.kill();
                    if tokio::time::timeout(DRAIN_GRACE, &mut io).await.is_err() {
                        tracing::debug!("output pipes still open after exit, dropping them");
                    }
                }
            }
            status
        };

        match status {
            Some(Ok(status)) => ExecutionResult {
                stdout: decode(out),
                stderr: decode(err),
                exit_code: exit_code(status),
                timed_out: false,
            },
            Some(Err(err)) => {
                tracing::warn!(error = %err, "failed while waiting for command");
                ExecutionResult {
                    stdout: String::new(),
                    stderr: err.to_string(),
                    exit_code: 1,
                    timed_out: false,
                }
            }
            None => {
                tracing::warn!(
                    command,
                    timeout_secs = self.timeout.as_secs_f64(),
                    "command timed out, terminating"
                );
                let exit_code = terminate(&mut child, &group).await;
                ExecutionResult {
                    stdout: String::new(),
                    stderr: format!(
                        "Command timed out after {} seconds",
                        self.timeout.as_secs_f64()
                    ),
                    exit_code,
                    timed_out: true,
                }
            }
        }
    }
}

#[async_trait]
impl Execute for CommandExecutor {
    async fn execute(&self, command: &str) -> ExecutionResult {
        tracing::debug!(shell = %self.shell, command, "executing command");
        self.run(command).await
    }
}

async fn read_pipe<R>(pipe: Option<&mut R>, buf: &mut Vec<u8>)
where
    R: AsyncRead + Unpin,
{
    if let Some(pipe) = pipe {
        if let Err(err) = pipe.read_to_end(buf).await {
            tracing::debug!(error = %err, "failed reading command output");
        }
    }
}

/// The process group a command runs in. Whatever is left of it is killed
/// when the run finishes or its future is dropped.
#[cfg(unix)]
struct ProcessGroup(Option<libc::pid_t>);

#[cfg(unix)]
impl ProcessGroup {
    fn of(child: &Child) -> Self {
        Self(child.id().and_then(|pid| libc::pid_t::try_from(pid).ok()))
    }

    fn signal(&self, signal: libc::c_int) {
        if let Some(pgid) = self.0 {
            unsafe {
                libc::kill(-pgid, signal);
            }
        }
    }

    fn terminate(&self) {
        self.signal(libc::SIGTERM);
    }

    fn kill(&self) {
        self.signal(libc::SIGKILL);
    }
}

#[cfg(unix)]
impl Drop for ProcessGroup {
    fn drop(&mut self) {
        self.kill();
    }
}

#[cfg(not(unix))]
struct ProcessGroup;

#[cfg(not(unix))]
impl ProcessGroup {
    fn of(_child: &Child) -> Self {
        Self
    }

    fn terminate(&self) {}

    fn kill(&self) {}
}

/// Send SIGTERM to the group, give it a moment, then kill it.
async fn terminate(child: &mut Child, group: &ProcessGroup) -> i32 {
    group.terminate();
    #[cfg(not(unix))]
    {
        let _ = child.start_kill();
    }

    match tokio::time::timeout(KILL_GRACE, child.wait()).await {
        Ok(Ok(status)) => exit_code(status),
        _ => {
            group.kill();
            let _ = child.kill().await;
            child
                .try_wait()
                .ok()
                .flatten()
                .map(exit_code)
                .unwrap_or(SIGTERM_EXIT)
        }
    }
}

fn decode(bytes: Vec<u8>) -> String {
    String::from_utf8(bytes).unwrap_or_default()
}

#[cfg(unix)]
fn exit_code(status: ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;
    status.code().or_else(|| status.signal()).unwrap_or(1)
}

#[cfg(not(unix))]
fn exit_code(status: ExitStatus) -> i32 {
    status.code().unwrap_or(1)
}
