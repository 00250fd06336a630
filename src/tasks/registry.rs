//! Task type registry: type name to builder.
use std::collections::BTreeMap;

use super::mapper::build_task;
use super::value::Value;
use super::{
    CMD_RUN, CmdRunTask, FILE_MANAGED, FileManagedTask, Task, VNC_CONFIG_UPDATE, VncConfigTask,
    WIN_REG_ABSENT, WIN_REG_ABSENT_KEY, WIN_REG_PRESENT, WinRegTask,
};
use crate::error::BuildError;

/// Builds a [`Task`] from `(type name, path, declarations)`.
pub type BuildFn = fn(&str, &str, &[(String, Value)]) -> Result<Task, BuildError>;

fn build_cmd_run(type_name: &str, path: &str, decls: &[(String, Value)]) -> Result<Task, BuildError> {
    build_task(CmdRunTask::new(type_name, path), path, decls).map(Task::CmdRun)
}

fn build_file_managed(
    type_name: &str,
    path: &str,
    decls: &[(String, Value)],
) -> Result<Task, BuildError> {
    build_task(FileManagedTask::new(type_name, path), path, decls).map(Task::FileManaged)
}

fn build_win_reg(type_name: &str, path: &str, decls: &[(String, Value)]) -> Result<Task, BuildError> {
    build_task(WinRegTask::new(type_name, path), path, decls).map(Task::WinReg)
}

fn build_vnc_config(
    type_name: &str,
    path: &str,
    decls: &[(String, Value)],
) -> Result<Task, BuildError> {
    build_task(VncConfigTask::new(type_name, path), path, decls).map(Task::VncConfig)
}

/// Registry of task builders, constructed once at startup and passed by
/// reference.
#[derive(Debug, Default, Clone)]
pub struct TaskRegistry {
    builders: BTreeMap<String, BuildFn>,
}

impl TaskRegistry {
    /// Empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in task kind.
    #[must_use]
    pub fn with_default_kinds() -> Self {
        let mut registry = Self::new();
        registry.register(CMD_RUN, build_cmd_run);
        registry.register(FILE_MANAGED, build_file_managed);
        for name in [WIN_REG_PRESENT, WIN_REG_ABSENT, WIN_REG_ABSENT_KEY] {
            registry.register(name, build_win_reg);
        }
        registry.register(VNC_CONFIG_UPDATE, build_vnc_config);
        registry
    }

    /// Register (or replace) the builder for `type_name`.
    pub fn register(&mut self, type_name: &str, build: BuildFn) {
        self.builders.insert(type_name.to_string(), build);
    }

    /// Registered type names, sorted.
    pub fn type_names(&self) -> impl Iterator<Item = &str> {
        self.builders.keys().map(String::as_str)
    }

    /// Build a task of `type_name` declared at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::UnknownTaskType`] for unregistered types and
    /// the builder's field or validation errors otherwise.
    pub fn build(
        &self,
        type_name: &str,
        path: &str,
        declarations: &[(String, Value)],
    ) -> Result<Task, BuildError> {
        let build = self
            .builders
            .get(type_name)
            .ok_or_else(|| BuildError::UnknownTaskType(type_name.to_string()))?;
        build(type_name, path, declarations)
    }
}
