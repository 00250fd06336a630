//! Executor for `realvnc_server.config_update`.
//!
//! Only parameters the tracker marked as set or cleared are touched; the
//! rest of the file is preserved.
use super::conditions::check_all;
use super::{Changes, Context, Execute, ExecutionResult};
use crate::error::ExecError;
use crate::exec::CommandSpec;
use crate::resources::config_file::{Edit, backup_path, patch, read_existing, write_with_backup};
use crate::tasks::VncConfigTask;
use crate::tasks::vnc_config::ConfigEdit;

/// Patches the server config file and reloads the server.
#[derive(Debug, Default, Clone, Copy)]
pub struct VncConfigExecutor;

fn reload(task: &VncConfigTask, ctx: &Context) -> Result<(), ExecError> {
    let (program, args) = task.reload_command();
    let command = if program.contains(' ') {
        format!("\"{program}\" {}", args.join(" "))
    } else {
        format!("{program} {}", args.join(" "))
    };
    ctx.log.debug(&format!("reloading server: {command}"));
    let spec = CommandSpec::new(command.clone()).with_shell(task.common.shell.clone());
    let out = ctx.runner.run(&spec, &ctx.cancel)?;
    if out.success {
        Ok(())
    } else {
        Err(ExecError::Command {
            command,
            exit_code: out.code.unwrap_or(-1),
            stderr: out.stderr.trim().to_string(),
        })
    }
}

fn reconcile(task: &VncConfigTask, ctx: &Context) -> Result<ExecutionResult, ExecError> {
    if let Some(reason) = check_all(&task.common, None, ctx)? {
        return Ok(ExecutionResult::skipped(reason));
    }

    let edits = task.edits();
    let edits: Vec<(&str, Edit<'_>)> = edits
        .iter()
        .map(|(param, edit)| {
            let edit = match edit {
                ConfigEdit::Set(value) => Edit::Set(value),
                ConfigEdit::Remove => Edit::Remove,
            };
            (*param, edit)
        })
        .collect();

    let path = task.config_file();
    let current = read_existing(path)?;
    let existed = current.is_some();
    let (patched, applied) = patch(current.as_deref().unwrap_or_default(), &edits);
    if applied == 0 {
        return Ok(ExecutionResult {
            comment: "Config not updated".to_string(),
            changes: Changes::Config { applied },
            ..ExecutionResult::default()
        });
    }

    let backup = (!task.skip_backup).then(|| backup_path(path, &task.backup_extension));
    write_with_backup(path, &patched, existed, backup.as_deref())?;
    ctx.log.info(&format!(
        "{applied} config value change(s) applied to '{}'",
        path.display()
    ));

    let mut result = ExecutionResult {
        comment: "Config updated".to_string(),
        changes: Changes::Config { applied },
        ..ExecutionResult::default()
    };
    if task.skip_reload {
        ctx.log.debug("server reload skipped");
    } else if let Err(e) = reload(task, ctx) {
        result.err = Some(e);
    }
    Ok(result)
}

impl Execute<VncConfigTask> for VncConfigExecutor {
    fn execute(&self, task: &VncConfigTask, ctx: &Context) -> ExecutionResult {
        reconcile(task, ctx).unwrap_or_else(ExecutionResult::failed)
    }
}
