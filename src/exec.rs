//! Shell command execution with cooperative cancellation.
use std::io::Read;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::error::ExecError;

/// How often a running child is polled for exit or cancellation.
const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Shared cancellation flag threaded through every executor.
///
/// Cloning yields a handle to the same flag; the `ctrlc` handler installed
/// by the `run` command holds one clone.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Create a token that is not cancelled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Return `true` once cancellation was requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Fail with [`ExecError::Cancelled`] if cancellation was requested.
    ///
    /// # Errors
    ///
    /// Returns [`ExecError::Cancelled`] when the token is cancelled.
    pub fn check(&self) -> Result<(), ExecError> {
        if self.is_cancelled() {
            Err(ExecError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// A command line to run through a shell.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandSpec {
    /// Command text handed to the shell.
    pub command: String,
    /// Shell program; the platform default when `None`.
    pub shell: Option<String>,
    /// Working directory.
    pub cwd: Option<PathBuf>,
    /// Extra environment variables.
    pub env: Vec<(String, String)>,
    /// Run as this user instead of the current one.
    pub user: Option<String>,
}

impl CommandSpec {
    /// A spec for `command` with every option at its default.
    #[must_use]
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            ..Self::default()
        }
    }

    /// Use `shell` instead of the platform default.
    #[must_use]
    pub fn with_shell(mut self, shell: Option<String>) -> Self {
        self.shell = shell;
        self
    }
}

/// Result of a command execution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecResult {
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
    /// `true` if the process exited with status 0.
    pub success: bool,
    /// Exit code, `None` when the process was killed by a signal.
    pub code: Option<i32>,
    /// Process id of the child.
    pub pid: Option<u32>,
}

/// Runs shell commands on behalf of executors.
///
/// A non-zero exit is a normal `Ok` result with `success == false`; only a
/// failure to launch or a cancellation is an `Err`.
#[cfg_attr(test, mockall::automock)]
pub trait CommandRunner: Send + Sync + std::fmt::Debug {
    /// Run `spec` to completion, killing the child if `cancel` fires.
    ///
    /// # Errors
    ///
    /// Returns [`ExecError::Launch`] if the process cannot be started and
    /// [`ExecError::Cancelled`] if the run was cancelled.
    fn run(&self, spec: &CommandSpec, cancel: &CancelToken) -> Result<ExecResult, ExecError>;
}

/// [`CommandRunner`] backed by [`std::process::Command`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

/// Program and flag used to hand a command string to `shell`.
fn shell_invocation(shell: Option<&str>) -> (String, &'static str) {
    let Some(shell) = shell else {
        return if cfg!(windows) {
            ("cmd".to_string(), "/C")
        } else {
            ("sh".to_string(), "-c")
        };
    };
    // `/` or `\` may separate path components.
    let file = shell.rsplit(['/', '\\']).next().unwrap_or(shell).to_ascii_lowercase();
    let stem = file.strip_suffix(".exe").unwrap_or(&file);
    let flag = match stem {
        "cmd" => "/C",
        "powershell" | "pwsh" => "-Command",
        _ => "-c",
    };
    (shell.to_string(), flag)
}

fn launch_error(spec: &CommandSpec, reason: impl std::fmt::Display) -> ExecError {
    ExecError::Launch {
        command: spec.command.clone(),
        reason: reason.to_string(),
    }
}

fn build_command(spec: &CommandSpec) -> Result<Command, ExecError> {
    let (shell, flag) = shell_invocation(spec.shell.as_deref());
    let shell_path = which::which(&shell)
        .map_err(|e| launch_error(spec, format!("shell '{shell}' not found: {e}")))?;

    let mut cmd = match spec.user.as_deref() {
        None => Command::new(shell_path),
        Some(user) if cfg!(unix) => {
            let mut cmd = Command::new("sudo");
            cmd.args(["-n", "-u", user, "--"]).arg(shell_path);
            cmd
        }
        Some(user) => {
            return Err(ExecError::Unsupported(format!(
                "running commands as user '{user}' is not supported on this platform"
            )));
        }
    };
    cmd.arg(flag).arg(&spec.command);
    if let Some(cwd) = &spec.cwd {
        cmd.current_dir(cwd);
    }
    for (key, value) in &spec.env {
        cmd.env(key, value);
    }
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    Ok(cmd)
}

/// Drain a child pipe on its own thread so a full pipe never blocks the child.
fn spawn_reader<R: Read + Send + 'static>(mut reader: R) -> JoinHandle<String> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf).ok();
        String::from_utf8_lossy(&buf).into_owned()
    })
}

fn collect(handle: Option<JoinHandle<String>>) -> String {
    handle
        .and_then(|h| h.join().ok())
        .unwrap_or_default()
}

impl CommandRunner for SystemRunner {
    fn run(&self, spec: &CommandSpec, cancel: &CancelToken) -> Result<ExecResult, ExecError> {
        cancel.check()?;
        let mut child = build_command(spec)?
            .spawn()
            .map_err(|e| launch_error(spec, e))?;
        let pid = child.id();
        let stdout = child.stdout.take().map(spawn_reader);
        let stderr = child.stderr.take().map(spawn_reader);

        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) => {}
                Err(e) => return Err(ExecError::io(format!("failed to wait for pid {pid}"), e)),
            }
            if cancel.is_cancelled() {
                child.kill().ok();
                child.wait().ok();
                return Err(ExecError::Cancelled);
            }
            thread::sleep(POLL_INTERVAL);
        };

        Ok(ExecResult {
            stdout: collect(stdout),
            stderr: collect(stderr),
            success: status.success(),
            code: status.code(),
            pid: Some(pid),
        })
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn cancel_token_clones_share_state() {
        let token = CancelToken::new();
        let other = token.clone();
        assert!(token.check().is_ok());
        other.cancel();
        assert!(token.is_cancelled());
        assert!(matches!(token.check(), Err(ExecError::Cancelled)));
    }

    #[test]
    fn shell_invocation_picks_flag_by_program() {
        assert_eq!(shell_invocation(Some("bash")).1, "-c");
        assert_eq!(shell_invocation(Some("cmd.exe")).1, "/C");
        assert_eq!(shell_invocation(Some("pwsh")).1, "-Command");
        assert_eq!(
            shell_invocation(Some("C:\\Windows\\powershell.exe")).1,
            "-Command"
        );
        assert_eq!(shell_invocation(Some("C:\\Windows\\System32\\CMD.EXE")).1, "/C");
        assert_eq!(shell_invocation(Some("/usr/bin/pwsh")).1, "-Command");
        assert_eq!(shell_invocation(Some("/bin/sh")).1, "-c");
    }

    #[test]
    fn run_echo() {
        let result = SystemRunner
            .run(&CommandSpec::new("echo hello"), &CancelToken::new())
            .unwrap();
        assert!(result.success, "echo command should succeed");
        assert_eq!(result.stdout.trim(), "hello");
        assert!(result.pid.is_some());
    }

    #[test]
    fn non_zero_exit_is_ok_result() {
        let result = SystemRunner
            .run(&CommandSpec::new("exit 3"), &CancelToken::new())
            .unwrap();
        assert!(!result.success);
        assert_eq!(result.code, Some(3));
    }

    #[test]
    fn missing_shell_is_launch_error() {
        let spec = CommandSpec::new("true").with_shell(Some("no-such-shell-12345".into()));
        let err = SystemRunner.run(&spec, &CancelToken::new()).unwrap_err();
        assert!(matches!(err, ExecError::Launch { .. }), "{err}");
    }

    #[test]
    fn cancelled_token_refuses_to_start() {
        let token = CancelToken::new();
        token.cancel();
        let err = SystemRunner
            .run(&CommandSpec::new("echo never"), &token)
            .unwrap_err();
        assert!(matches!(err, ExecError::Cancelled));
    }

    #[cfg(unix)]
    #[test]
    fn cancellation_kills_running_child() {
        let token = CancelToken::new();
        let trigger = token.clone();
        let canceller = thread::spawn(move || {
            thread::sleep(Duration::from_millis(100));
            trigger.cancel();
        });
        let started = std::time::Instant::now();
        let err = SystemRunner
            .run(&CommandSpec::new("sleep 10"), &token)
            .unwrap_err();
        canceller.join().unwrap();
        assert!(matches!(err, ExecError::Cancelled));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[cfg(unix)]
    #[test]
    fn cwd_and_env_are_applied() {
        let dir = tempfile::tempdir().unwrap();
        let spec = CommandSpec {
            command: "pwd; echo $GREETING".into(),
            cwd: Some(dir.path().to_path_buf()),
            env: vec![("GREETING".into(), "hi".into())],
            ..CommandSpec::default()
        };
        let result = SystemRunner.run(&spec, &CancelToken::new()).unwrap();
        let canonical = dir.path().canonicalize().unwrap();
        assert!(
            result.stdout.contains(canonical.to_str().unwrap()),
            "{}",
            result.stdout
        );
        assert!(result.stdout.contains("hi"));
    }
}
