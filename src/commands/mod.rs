pub mod orchestrator;
pub mod run;
pub mod scheduler;
pub mod summary;
pub mod validate;
pub mod version;

use std::path::Path;

use anyhow::{Context as _, Result};

use crate::config::Config;
use crate::logging::Log;
use crate::tasks::TaskRegistry;

/// Shared state produced by the common command setup sequence.
///
/// Encapsulates the task registry and configuration loading so that each
/// command does not have to repeat the boilerplate.
#[derive(Debug)]
pub struct CommandSetup {
    pub registry: TaskRegistry,
    pub config: Config,
}

impl CommandSetup {
    /// Load settings and the script document, building every task.
    ///
    /// # Errors
    ///
    /// Returns an error if either file fails to load or any task fails to
    /// build.
    pub fn init(document: &Path, settings: Option<&Path>, log: &dyn Log) -> Result<Self> {
        let registry = TaskRegistry::with_default_kinds();

        log.stage("Loading configuration");
        let config = Config::load(document, settings, &registry)
            .with_context(|| format!("loading {}", document.display()))?;

        for script in &config.scripts {
            log.debug(&format!(
                "script '{}': {} task(s)",
                script.id,
                script.tasks.len()
            ));
        }
        log.info(&format!(
            "loaded {} script(s), {} task(s)",
            config.scripts.len(),
            config.task_count()
        ));

        Ok(Self { registry, config })
    }
}
