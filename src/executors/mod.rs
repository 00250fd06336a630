//! Per-kind executors and the router that dispatches tasks to them.
//!
//! Every executor follows the same shape: a sequence of skip gates, an
//! apply phase with side effects, and a structured [`ExecutionResult`].
pub mod cmd_run;
pub mod conditions;
mod context;
pub mod file_managed;
pub mod vnc_config;
pub mod win_reg;

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

pub use cmd_run::CmdRunExecutor;
pub use context::Context;
pub use file_managed::FileManagedExecutor;
pub use vnc_config::VncConfigExecutor;
pub use win_reg::WinRegExecutor;

use crate::error::{ExecError, RunError};
use crate::tasks::{CmdRunTask, FileManagedTask, Task, VncConfigTask, WinRegTask};

/// Output of a `cmd.run` task.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandChanges {
    /// Pid of the last command started.
    pub pid: Option<u32>,
    /// Exit code of the last command.
    pub retcode: Option<i32>,
    /// Trimmed standard output of every command.
    pub stdout: String,
    /// Trimmed standard error of every command.
    pub stderr: String,
}

/// What a `file.managed` task changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileChanges {
    /// The body was written.
    pub updated: bool,
    /// Diff of literal contents against the previous body.
    pub diff: Option<String>,
    /// New permission bits, when they changed.
    pub mode: Option<String>,
    /// New `user:group`, when ownership changed.
    pub owner: Option<String>,
}

/// Structured change record, one shape per task kind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Changes {
    /// Nothing was touched.
    #[default]
    None,
    /// Commands ran.
    Command(CommandChanges),
    /// A file was reconciled.
    File(FileChanges),
    /// A registry entry was updated.
    Registry {
        /// Description of the entry.
        description: String,
    },
    /// Config values were rewritten.
    Config {
        /// Number of parameters changed.
        applied: usize,
    },
}

impl Changes {
    /// `true` if the record describes a modification of the system.
    #[must_use]
    pub const fn is_change(&self) -> bool {
        match self {
            Self::None => false,
            Self::Command(_) | Self::Registry { .. } => true,
            Self::File(f) => f.updated || f.mode.is_some() || f.owner.is_some(),
            Self::Config { applied } => *applied > 0,
        }
    }

    /// Flatten into the string map used by the run summary.
    #[must_use]
    pub fn to_map(&self) -> BTreeMap<String, String> {
        let mut map = BTreeMap::new();
        match self {
            Self::None => {}
            Self::Command(c) => {
                if let Some(pid) = c.pid {
                    map.insert("pid".to_string(), pid.to_string());
                }
                if let Some(code) = c.retcode {
                    map.insert("retcode".to_string(), code.to_string());
                }
                map.insert("stdout".to_string(), c.stdout.clone());
                map.insert("stderr".to_string(), c.stderr.clone());
            }
            Self::File(f) => {
                if let Some(diff) = &f.diff {
                    map.insert("diff".to_string(), diff.clone());
                }
                if let Some(mode) = &f.mode {
                    map.insert("mode".to_string(), mode.clone());
                }
                if let Some(owner) = &f.owner {
                    map.insert("owner".to_string(), owner.clone());
                }
                if f.updated && f.diff.is_none() {
                    map.insert("updated".to_string(), "true".to_string());
                }
            }
            Self::Registry { description } => {
                map.insert("registry".to_string(), description.clone());
            }
            Self::Config { applied } => {
                map.insert(
                    "count".to_string(),
                    format!("{applied} config value change(s) applied"),
                );
            }
        }
        map
    }
}

/// Outcome of one task execution.
#[derive(Debug, Default)]
pub struct ExecutionResult {
    /// Set when the task failed.
    pub err: Option<ExecError>,
    /// Set when a skip gate ended the task.
    pub skip_reason: Option<String>,
    /// One-line description for the summary.
    pub comment: String,
    /// Wall time spent in the executor.
    pub duration: Duration,
    /// What was changed.
    pub changes: Changes,
}

impl ExecutionResult {
    /// A skipped, successful result.
    #[must_use]
    pub fn skipped(reason: impl Into<String>) -> Self {
        let reason = reason.into();
        Self {
            comment: reason.clone(),
            skip_reason: Some(reason),
            ..Self::default()
        }
    }

    /// A failed result.
    #[must_use]
    pub fn failed(err: ExecError) -> Self {
        Self {
            comment: err.to_string(),
            err: Some(err),
            ..Self::default()
        }
    }

    /// Replace the comment.
    #[must_use]
    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = comment.into();
        self
    }

    /// `true` unless the task failed.
    #[must_use]
    pub const fn succeeded(&self) -> bool {
        self.err.is_none()
    }

    /// `true` if a skip gate ended the task.
    #[must_use]
    pub const fn is_skipped(&self) -> bool {
        self.skip_reason.is_some()
    }

    /// `true` if the task was interrupted by cancellation.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self.err, Some(ExecError::Cancelled))
    }
}

/// Reconciles one task kind.
pub trait Execute<T>: Send + Sync + std::fmt::Debug {
    /// Run the skip gates and, if none matches, apply the task.
    fn execute(&self, task: &T, ctx: &Context) -> ExecutionResult;
}

/// Resolves and invokes the executor for a task's kind.
///
/// A kind with no executor is a fatal [`RunError::UnresolvedExecutor`].
#[derive(Debug, Default)]
pub struct ExecutorRouter {
    cmd_run: Option<Box<dyn Execute<CmdRunTask>>>,
    file_managed: Option<Box<dyn Execute<FileManagedTask>>>,
    win_reg: Option<Box<dyn Execute<WinRegTask>>>,
    vnc_config: Option<Box<dyn Execute<VncConfigTask>>>,
}

impl ExecutorRouter {
    /// Router with no executors.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Router with the built-in executor for every kind.
    #[must_use]
    pub fn with_default_executors() -> Self {
        Self::new()
            .with_cmd_run(CmdRunExecutor)
            .with_file_managed(FileManagedExecutor)
            .with_win_reg(WinRegExecutor)
            .with_vnc_config(VncConfigExecutor)
    }

    /// Set the `cmd.run` executor.
    #[must_use]
    pub fn with_cmd_run(mut self, executor: impl Execute<CmdRunTask> + 'static) -> Self {
        self.cmd_run = Some(Box::new(executor));
        self
    }

    /// Set the `file.managed` executor.
    #[must_use]
    pub fn with_file_managed(
        mut self,
        executor: impl Execute<FileManagedTask> + 'static,
    ) -> Self {
        self.file_managed = Some(Box::new(executor));
        self
    }

    /// Set the `win_reg.*` executor.
    #[must_use]
    pub fn with_win_reg(mut self, executor: impl Execute<WinRegTask> + 'static) -> Self {
        self.win_reg = Some(Box::new(executor));
        self
    }

    /// Set the `realvnc_server.config_update` executor.
    #[must_use]
    pub fn with_vnc_config(mut self, executor: impl Execute<VncConfigTask> + 'static) -> Self {
        self.vnc_config = Some(Box::new(executor));
        self
    }

    /// Execute `task` with its kind's executor, timing the call.
    ///
    /// # Errors
    ///
    /// Returns [`RunError::UnresolvedExecutor`] if no executor is set for
    /// the task's kind.
    pub fn execute(&self, task: &Task, ctx: &Context) -> Result<ExecutionResult, RunError> {
        let unresolved = || RunError::UnresolvedExecutor(task.type_name().to_string());
        let started = Instant::now();
        let mut result = match task {
            Task::CmdRun(t) => self.cmd_run.as_ref().ok_or_else(unresolved)?.execute(t, ctx),
            Task::FileManaged(t) => self
                .file_managed
                .as_ref()
                .ok_or_else(unresolved)?
                .execute(t, ctx),
            Task::WinReg(t) => self.win_reg.as_ref().ok_or_else(unresolved)?.execute(t, ctx),
            Task::VncConfig(t) => self
                .vnc_config
                .as_ref()
                .ok_or_else(unresolved)?
                .execute(t, ctx),
        };
        result.duration = started.elapsed();
        Ok(result)
    }
}
