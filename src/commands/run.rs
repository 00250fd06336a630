//! Command: execute a script document and print the run summary.
use std::sync::Arc;

use anyhow::{Context as _, Result};

use super::CommandSetup;
use super::orchestrator::{Orchestrator, RunFailure};
use super::summary::RunSummary;
use crate::cli::{GlobalOpts, RunOpts};
use crate::config::Config;
use crate::exec::CancelToken;
use crate::executors::{Context, ExecutorRouter};
use crate::logging::Log;
use crate::resources::download::Downloader;

/// Run the `run` command.
///
/// The summary is printed to stdout even when tasks failed or the run
/// stopped early.
///
/// # Errors
///
/// Returns an error if loading fails, the run stopped early, or any task
/// failed.
pub fn run(global: &GlobalOpts, opts: &RunOpts, log: &Arc<dyn Log>) -> Result<()> {
    let setup = CommandSetup::init(&opts.file, global.settings.as_deref(), log.as_ref())?;
    let settings = &setup.config.settings;
    let output = opts.output.unwrap_or(settings.output);

    let cancel = CancelToken::new();
    install_interrupt_handler(&cancel)?;
    let ctx = Context::new(
        Arc::clone(log),
        Downloader::new(settings.http.timeouts()),
        cancel,
    );
    let router = ExecutorRouter::with_default_executors();

    log.stage("Running scripts");
    let (summary, stopped) = match execute(setup.config, &router, &ctx, opts.abort_on_error) {
        Ok(summary) => (summary, None),
        Err(failure) => {
            let RunFailure { summary, error } = *failure;
            (summary, Some(error))
        }
    };

    print!("{}", summary.render(output)?);

    if let Some(error) = stopped {
        return Err(error).context("run stopped");
    }
    if summary.has_failures() {
        anyhow::bail!("{} task(s) failed", summary.summary.failed);
    }
    Ok(())
}

/// Order and execute every script in `config`.
///
/// `abort_on_error` is combined with the settings flag.
///
/// # Errors
///
/// Returns [`RunFailure`] with the partial summary when the run stops
/// early.
pub fn execute(
    config: Config,
    router: &ExecutorRouter,
    ctx: &Context,
    abort_on_error: bool,
) -> Result<RunSummary, Box<RunFailure>> {
    let Config {
        document,
        settings,
        scripts,
    } = config;
    Orchestrator::new(router, ctx)
        .with_policy(settings.schedule_policy())
        .with_abort_on_error(abort_on_error || settings.abort_on_error)
        .run(&document.display().to_string(), scripts)
}

fn install_interrupt_handler(cancel: &CancelToken) -> Result<()> {
    let token = cancel.clone();
    ctrlc::set_handler(move || {
        tracing::warn!("interrupt received, cancelling run");
        token.cancel();
    })
    .context("installing interrupt handler")
}
