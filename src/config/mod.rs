//! Run settings and script documents.
pub mod document;
pub mod settings;
mod toml_loader;

use std::path::{Path, PathBuf};

use crate::error::{ConfigError, TaskBuildFailure};
use crate::tasks::{Script, TaskRegistry};

use document::RawScript;
use settings::Settings;

/// Everything a command needs before scripts are ordered.
#[derive(Debug)]
pub struct Config {
    /// Script document path, as given.
    pub document: PathBuf,
    /// Run settings.
    pub settings: Settings,
    /// Built scripts in document order.
    pub scripts: Vec<Script>,
}

impl Config {
    /// Load settings and the script document, then build every task.
    ///
    /// # Errors
    ///
    /// Returns an error if either file cannot be loaded or any task fails
    /// to build. Build failures of all tasks are reported together.
    pub fn load(
        document: &Path,
        settings: Option<&Path>,
        registry: &TaskRegistry,
    ) -> Result<Self, ConfigError> {
        let settings = Settings::load(settings, document)?;
        let raw = document::load_document(document)?;
        Ok(Self {
            document: document.to_path_buf(),
            settings,
            scripts: build_scripts(raw, registry)?,
        })
    }

    /// Total number of tasks across all scripts.
    #[must_use]
    pub fn task_count(&self) -> usize {
        self.scripts.iter().map(|s| s.tasks.len()).sum()
    }
}

/// Build every declared task.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidTasks`] listing every task that failed,
/// in document order.
pub fn build_scripts(
    raw: Vec<RawScript>,
    registry: &TaskRegistry,
) -> Result<Vec<Script>, ConfigError> {
    let mut failures = Vec::new();
    let mut scripts = Vec::with_capacity(raw.len());
    for script in raw {
        let mut tasks = Vec::with_capacity(script.tasks.len());
        for task in script.tasks {
            match registry.build(&task.type_name, &task.path, &task.declarations) {
                Ok(built) => tasks.push(built),
                Err(error) => failures.push(TaskBuildFailure {
                    path: task.path,
                    error,
                }),
            }
        }
        scripts.push(Script {
            id: script.id,
            tasks,
        });
    }

    if failures.is_empty() {
        Ok(scripts)
    } else {
        Err(ConfigError::InvalidTasks(failures))
    }
}
