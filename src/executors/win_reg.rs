//! Executor for `win_reg.present`, `win_reg.absent` and `win_reg.absent_key`.
use super::conditions::check_all;
use super::{Changes, Context, Execute, ExecutionResult};
use crate::error::ExecError;
use crate::resources::registry::RegistryResource;
use crate::resources::{Resource, ResourceChange};
use crate::tasks::WinRegTask;

/// Reconciles one registry value or key.
#[derive(Debug, Default, Clone, Copy)]
pub struct WinRegExecutor;

fn reconcile(task: &WinRegTask, ctx: &Context) -> Result<ExecutionResult, ExecError> {
    if !ctx.platform.has_registry() {
        return Err(ExecError::Unsupported(
            "win_reg tasks only supported on Microsoft Windows".to_string(),
        ));
    }
    if let Some(reason) = check_all(&task.common, None, ctx)? {
        return Ok(ExecutionResult::skipped(reason));
    }

    let (key, action) = task.registry_action().map_err(ExecError::Unsupported)?;
    let resource = RegistryResource::new(key, action, ctx.runner.as_ref(), &ctx.cancel);
    let description = resource.description();
    ctx.log.debug(&format!("reconciling {description}"));
    Ok(match resource.reconcile()? {
        ResourceChange::Applied => ExecutionResult {
            comment: "registry updated".to_string(),
            changes: Changes::Registry { description },
            ..ExecutionResult::default()
        },
        ResourceChange::AlreadyCorrect => {
            ExecutionResult::default().with_comment("registry not updated")
        }
        ResourceChange::Skipped { reason } => ExecutionResult::skipped(reason),
    })
}

impl Execute<WinRegTask> for WinRegExecutor {
    fn execute(&self, task: &WinRegTask, ctx: &Context) -> ExecutionResult {
        reconcile(task, ctx).unwrap_or_else(ExecutionResult::failed)
    }
}
