//! Sequential run of ordered scripts.
use std::time::Instant;

use chrono::Local;
use thiserror::Error;

use super::scheduler::{SchedulePolicy, order};
use super::summary::{RunSummary, TaskRecord};
use crate::error::RunError;
use crate::executors::{Context, ExecutionResult, ExecutorRouter};
use crate::logging::TASK_SPAN;
use crate::tasks::{Script, Task};

/// A run that stopped early, with everything recorded up to that point.
#[derive(Error, Debug)]
#[error("{error}")]
pub struct RunFailure {
    /// Partial summary.
    pub summary: RunSummary,
    /// Why the run stopped.
    pub error: RunError,
}

/// Drives scripts through the executor router one task at a time.
#[derive(Debug)]
pub struct Orchestrator<'a> {
    router: &'a ExecutorRouter,
    ctx: &'a Context,
    policy: SchedulePolicy,
    abort_on_error: bool,
}

impl<'a> Orchestrator<'a> {
    /// Orchestrator with default policies and no global abort.
    #[must_use]
    pub fn new(router: &'a ExecutorRouter, ctx: &'a Context) -> Self {
        Self {
            router,
            ctx,
            policy: SchedulePolicy::default(),
            abort_on_error: false,
        }
    }

    /// Scheduler policies.
    #[must_use]
    pub const fn with_policy(mut self, policy: SchedulePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Stop after the current script once any task failed.
    #[must_use]
    pub const fn with_abort_on_error(mut self, abort: bool) -> Self {
        self.abort_on_error = abort;
        self
    }

    /// Order `scripts` and execute every task.
    ///
    /// Task failures are recorded and do not stop the run unless an abort
    /// flag applies. The run stops early only after the script that
    /// triggered the abort has finished.
    ///
    /// # Errors
    ///
    /// Returns [`RunFailure`] when scripts cannot be ordered, a task kind
    /// has no executor, or the run is cancelled.
    pub fn run(&self, config: &str, scripts: Vec<Script>) -> Result<RunSummary, Box<RunFailure>> {
        let started = Instant::now();
        let mut summary = RunSummary::new(config);

        let scripts = match order(scripts, self.policy) {
            Ok(scripts) => scripts,
            Err(e) => return Err(fail(summary, started, e.into())),
        };

        for script in &scripts {
            if self.ctx.cancel.is_cancelled() {
                return Err(fail(summary, started, RunError::Cancelled));
            }
            self.ctx.log.debug(&format!("will run script '{}'", script.id));

            let mut abort = false;
            for task in &script.tasks {
                let result = match self.run_task(&script.id, task, &mut summary) {
                    Ok(result) => result,
                    Err(e) => return Err(fail(summary, started, e)),
                };
                if result.is_cancelled() {
                    return Err(fail(summary, started, RunError::Cancelled));
                }
                abort |= task.abort_on_error() && !result.succeeded();
            }

            if abort || (self.abort_on_error && summary.has_failures()) {
                self.ctx.log.warn(&format!(
                    "aborting run after script '{}' due to task failure",
                    script.id
                ));
                break;
            }
            self.ctx.log.debug(&format!("finished script '{}'", script.id));
        }

        summary.summary.total_run_time = started.elapsed();
        Ok(summary)
    }

    fn run_task(
        &self,
        script_id: &str,
        task: &Task,
        summary: &mut RunSummary,
    ) -> Result<ExecutionResult, RunError> {
        let started = Local::now();
        let _span = tracing::info_span!(TASK_SPAN, path = %task.common().path).entered();
        self.ctx.log.debug(&format!("will run {task}"));
        let result = self.router.execute(task, self.ctx)?;

        match (&result.err, &result.skip_reason) {
            (Some(err), _) => self.ctx.log.error(&format!("{task}: {err}")),
            (None, Some(reason)) => self.ctx.log.info(&format!("{task} skipped: {reason}")),
            (None, None) => self.ctx.log.debug(&format!("finished {task}: {}", result.comment)),
        }

        summary.record(
            TaskRecord::new(script_id, task, &result, started),
            result.changes.is_change(),
        );
        Ok(result)
    }
}

fn fail(mut summary: RunSummary, started: Instant, error: RunError) -> Box<RunFailure> {
    summary.summary.total_run_time = started.elapsed();
    Box::new(RunFailure { summary, error })
}
