//! Command: build and order a script document without executing it.
use std::fmt::Write as _;

use anyhow::{Context as _, Result};

use super::CommandSetup;
use super::scheduler::order;
use crate::cli::{GlobalOpts, ValidateOpts};
use crate::logging::Log;
use crate::tasks::Script;

/// Run the `validate` command, printing the execution order to stdout.
///
/// # Errors
///
/// Returns an error if the document fails to load, any task fails to
/// build, or the scripts cannot be ordered.
pub fn run(global: &GlobalOpts, opts: &ValidateOpts, log: &dyn Log) -> Result<()> {
    let setup = CommandSetup::init(&opts.file, global.settings.as_deref(), log)?;
    let policy = setup.config.settings.schedule_policy();

    log.stage("Ordering scripts");
    let ordered = order(setup.config.scripts, policy).context("ordering scripts")?;

    print!("{}", render_order(&ordered));
    log.info(&format!("{} is valid", opts.file.display()));
    Ok(())
}

/// One line per script, followed by its tasks.
#[must_use]
pub fn render_order(scripts: &[Script]) -> String {
    let mut out = String::new();
    for (i, script) in scripts.iter().enumerate() {
        let _ = writeln!(out, "{}. {}", i + 1, script.id);
        for task in &script.tasks {
            let _ = writeln!(out, "   - {} '{}'", task.type_name(), task.display_name());
        }
    }
    out
}
