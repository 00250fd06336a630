//! Executor for `cmd.run`.
use super::conditions::check_all;
use super::{Changes, CommandChanges, Context, Execute, ExecutionResult};
use crate::error::ExecError;
use crate::exec::CommandSpec;
use crate::tasks::CmdRunTask;

/// Runs each declared command in order, stopping at the first failure.
#[derive(Debug, Default, Clone, Copy)]
pub struct CmdRunExecutor;

impl CmdRunExecutor {
    fn spec(task: &CmdRunTask, command: &str) -> CommandSpec {
        CommandSpec {
            command: command.to_string(),
            shell: task.common.shell.clone(),
            cwd: task.cwd.clone(),
            env: task.env.clone(),
            user: task.user.clone(),
        }
    }
}

fn append(buf: &mut String, text: &str) {
    let text = text.trim();
    if text.is_empty() {
        return;
    }
    if !buf.is_empty() {
        buf.push('\n');
    }
    buf.push_str(text);
}

impl Execute<CmdRunTask> for CmdRunExecutor {
    fn execute(&self, task: &CmdRunTask, ctx: &Context) -> ExecutionResult {
        let names = task.commands().join("; ");
        match check_all(&task.common, task.user.as_deref(), ctx) {
            Err(e) => return ExecutionResult::failed(e),
            Ok(Some(reason)) => {
                ctx.log.debug(&format!("skipping {}: {reason}", task.common.path));
                return ExecutionResult::skipped(reason.clone())
                    .with_comment(format!("Command \"{names}\" did not run: {reason}"));
            }
            Ok(None) => {}
        }

        let mut changes = CommandChanges::default();
        let mut err = None;
        for command in task.commands() {
            ctx.log.debug(&format!("running: {command}"));
            match ctx.runner.run(&Self::spec(task, command), &ctx.cancel) {
                Ok(out) => {
                    changes.pid = out.pid;
                    changes.retcode = out.code;
                    append(&mut changes.stdout, &out.stdout);
                    append(&mut changes.stderr, &out.stderr);
                    if !out.success {
                        err = Some(ExecError::Command {
                            command: command.to_string(),
                            exit_code: out.code.unwrap_or(-1),
                            stderr: out.stderr.trim().to_string(),
                        });
                        break;
                    }
                }
                Err(e) => {
                    err = Some(e);
                    break;
                }
            }
        }

        ExecutionResult {
            err,
            comment: format!("Command \"{names}\" run"),
            changes: Changes::Command(changes),
            ..ExecutionResult::default()
        }
    }
}
