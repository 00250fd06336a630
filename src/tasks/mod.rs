//! Typed tasks built from raw script declarations.
//!
//! A [`Script`] groups [`Task`]s; every task kind is one variant of the
//! closed [`Task`] enum, built by the [`registry::TaskRegistry`] through the
//! declarative [`mapper`].
pub mod cmd_run;
pub mod file_managed;
pub mod mapper;
pub mod registry;
pub mod tracker;
pub mod value;
pub mod vnc_config;
pub mod win_reg;

use std::fmt;

pub use cmd_run::CmdRunTask;
pub use file_managed::FileManagedTask;
pub use registry::TaskRegistry;
pub use value::Value;
pub use vnc_config::VncConfigTask;
pub use win_reg::WinRegTask;

/// `cmd.run`
pub const CMD_RUN: &str = "cmd.run";
/// `file.managed`
pub const FILE_MANAGED: &str = "file.managed";
/// `win_reg.present`
pub const WIN_REG_PRESENT: &str = "win_reg.present";
/// `win_reg.absent`
pub const WIN_REG_ABSENT: &str = "win_reg.absent";
/// `win_reg.absent_key`
pub const WIN_REG_ABSENT_KEY: &str = "win_reg.absent_key";
/// `realvnc_server.config_update`
pub const VNC_CONFIG_UPDATE: &str = "realvnc_server.config_update";

/// Attributes every task kind carries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskCommon {
    /// Task type name as declared (e.g. `file.managed`).
    pub type_name: String,
    /// Diagnostic source-location label (`<script>.<type>`).
    pub path: String,
    /// Script ids this task's script depends on.
    pub require: Vec<String>,
    /// Marker files; any existing one skips the task.
    pub creates: Vec<String>,
    /// Condition commands that must all succeed.
    pub onlyif: Vec<String>,
    /// Condition commands of which any success skips the task.
    pub unless: Vec<String>,
    /// Shell used for commands and conditions.
    pub shell: Option<String>,
}

impl TaskCommon {
    /// Common part for a task of `type_name` declared at `path`.
    #[must_use]
    pub fn new(type_name: &str, path: &str) -> Self {
        Self {
            type_name: type_name.to_string(),
            path: path.to_string(),
            ..Self::default()
        }
    }
}

/// Concrete task kinds, used to route tasks to executors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskKind {
    /// `cmd.run`
    CmdRun,
    /// `file.managed`
    FileManaged,
    /// `win_reg.*`
    WinReg,
    /// `realvnc_server.config_update`
    VncConfig,
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::CmdRun => CMD_RUN,
            Self::FileManaged => FILE_MANAGED,
            Self::WinReg => "win_reg",
            Self::VncConfig => VNC_CONFIG_UPDATE,
        })
    }
}

/// One declarative unit of desired state.
#[derive(Debug, Clone)]
pub enum Task {
    /// Run shell commands.
    CmdRun(CmdRunTask),
    /// Manage a file's contents and attributes.
    FileManaged(FileManagedTask),
    /// Edit the Windows registry.
    WinReg(WinRegTask),
    /// Patch a `RealVNC` server configuration.
    VncConfig(VncConfigTask),
}

impl Task {
    /// Attributes shared by every kind.
    #[must_use]
    pub const fn common(&self) -> &TaskCommon {
        match self {
            Self::CmdRun(t) => &t.common,
            Self::FileManaged(t) => &t.common,
            Self::WinReg(t) => &t.common,
            Self::VncConfig(t) => &t.common,
        }
    }

    /// Executor routing key.
    #[must_use]
    pub const fn kind(&self) -> TaskKind {
        match self {
            Self::CmdRun(_) => TaskKind::CmdRun,
            Self::FileManaged(_) => TaskKind::FileManaged,
            Self::WinReg(_) => TaskKind::WinReg,
            Self::VncConfig(_) => TaskKind::VncConfig,
        }
    }

    /// Declared type name.
    #[must_use]
    pub fn type_name(&self) -> &str {
        &self.common().type_name
    }

    /// Source-location label.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.common().path
    }

    /// Script ids this task requires, in declaration order.
    #[must_use]
    pub fn requirements(&self) -> &[String] {
        &self.common().require
    }

    /// Whether a failure of this task stops the run after its script.
    #[must_use]
    pub const fn abort_on_error(&self) -> bool {
        match self {
            Self::CmdRun(t) => t.abort_on_error,
            Self::FileManaged(_) | Self::WinReg(_) | Self::VncConfig(_) => false,
        }
    }

    /// Human label for reports: the command(s), target file or key.
    #[must_use]
    pub fn display_name(&self) -> String {
        match self {
            Self::CmdRun(t) => t.commands().join("; "),
            Self::FileManaged(t) => t.name.clone(),
            Self::WinReg(t) => match &t.name {
                Some(name) => format!("{}\\{name}", t.reg_path),
                None => t.reg_path.clone(),
            },
            Self::VncConfig(t) => t.config_file().display().to_string(),
        }
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task '{}' at path '{}'", self.type_name(), self.path())
    }
}

/// A named, ordered group of tasks.
#[derive(Debug, Clone)]
pub struct Script {
    /// Unique script id.
    pub id: String,
    /// Tasks in declaration order.
    pub tasks: Vec<Task>,
}

impl Script {
    /// Requirements of every task, concatenated in declaration order.
    /// Duplicates are kept.
    pub fn requirements(&self) -> impl Iterator<Item = &str> {
        self.tasks
            .iter()
            .flat_map(Task::requirements)
            .map(String::as_str)
    }
}
