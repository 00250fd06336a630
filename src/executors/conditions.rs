//! Skip gates shared by every executor: `creates`, `onlyif` and `unless`.
//!
//! A gate returns `Ok(Some(reason))` to skip, `Ok(None)` to continue. A
//! condition that exits non-zero is a normal skip decision; one that cannot
//! be launched at all is an [`ExecError::ConditionLaunch`].
use std::path::Path;

use super::Context;
use crate::error::ExecError;
use crate::exec::CommandSpec;
use crate::resources::fs::file_exists;
use crate::tasks::TaskCommon;

/// Skip reason when an `onlyif` command exits non-zero.
pub const ONLYIF_FAILED: &str = "onlyif condition failed";

/// Skip reason when an `unless` command succeeds.
pub const UNLESS_SUCCEEDED: &str = "unless condition succeeded";

/// Skip if any marker file already exists.
///
/// # Errors
///
/// Returns an error if existence of a marker cannot be determined.
pub fn creates_gate(creates: &[String], ctx: &Context) -> Result<Option<String>, ExecError> {
    for marker in creates {
        if file_exists(Path::new(marker))? {
            ctx.log.debug(&format!("creates marker '{marker}' exists"));
            return Ok(Some(format!("file '{marker}' exists")));
        }
    }
    Ok(None)
}

fn condition_holds(
    command: &str,
    common: &TaskCommon,
    user: Option<&str>,
    ctx: &Context,
) -> Result<bool, ExecError> {
    let spec = CommandSpec {
        user: user.map(str::to_string),
        ..CommandSpec::new(command).with_shell(common.shell.clone())
    };
    match ctx.runner.run(&spec, &ctx.cancel) {
        Ok(out) => {
            ctx.log.debug(&format!(
                "condition '{command}' exited with {}",
                out.code.map_or_else(|| "signal".to_string(), |c| c.to_string())
            ));
            Ok(out.success)
        }
        Err(ExecError::Cancelled) => Err(ExecError::Cancelled),
        Err(ExecError::Launch { command, reason }) => {
            Err(ExecError::ConditionLaunch { command, reason })
        }
        Err(other) => Err(ExecError::ConditionLaunch {
            command: command.to_string(),
            reason: other.to_string(),
        }),
    }
}

/// Skip unless every `onlyif` command succeeds.
///
/// # Errors
///
/// Returns [`ExecError::ConditionLaunch`] if a condition cannot be launched and
/// [`ExecError::Cancelled`] if the run was interrupted.
pub fn onlyif_gate(
    common: &TaskCommon,
    user: Option<&str>,
    ctx: &Context,
) -> Result<Option<String>, ExecError> {
    for command in &common.onlyif {
        if !condition_holds(command, common, user, ctx)? {
            return Ok(Some(ONLYIF_FAILED.to_string()));
        }
    }
    Ok(None)
}

/// Skip if any `unless` command succeeds.
///
/// # Errors
///
/// Same as [`onlyif_gate`].
pub fn unless_gate(
    common: &TaskCommon,
    user: Option<&str>,
    ctx: &Context,
) -> Result<Option<String>, ExecError> {
    for command in &common.unless {
        if condition_holds(command, common, user, ctx)? {
            return Ok(Some(UNLESS_SUCCEEDED.to_string()));
        }
    }
    Ok(None)
}

/// `onlyif` then `unless`.
///
/// # Errors
///
/// Same as [`onlyif_gate`].
pub fn command_gates(
    common: &TaskCommon,
    user: Option<&str>,
    ctx: &Context,
) -> Result<Option<String>, ExecError> {
    if let Some(reason) = onlyif_gate(common, user, ctx)? {
        return Ok(Some(reason));
    }
    unless_gate(common, user, ctx)
}

/// `creates`, then `onlyif`, then `unless`.
///
/// # Errors
///
/// Same as [`creates_gate`] and [`onlyif_gate`].
pub fn check_all(
    common: &TaskCommon,
    user: Option<&str>,
    ctx: &Context,
) -> Result<Option<String>, ExecError> {
    if let Some(reason) = creates_gate(&common.creates, ctx)? {
        return Ok(Some(reason));
    }
    command_gates(common, user, ctx)
}
