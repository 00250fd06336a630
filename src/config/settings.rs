//! Run settings loaded from `taskscript.toml`.
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use super::toml_loader::load_config;
use crate::commands::scheduler::{CyclePolicy, SchedulePolicy, UnknownRequirementPolicy};
use crate::error::ConfigError;
use crate::resources::download::Timeouts;

/// File name looked up next to the script document.
pub const DEFAULT_SETTINGS_FILE: &str = "taskscript.toml";

/// Rendering of the run summary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// YAML document.
    #[default]
    Yaml,
    /// Pretty-printed JSON.
    Json,
}

/// Network timeouts for remote sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HttpSettings {
    /// Connection timeout in seconds.
    pub connect_timeout_secs: u64,
    /// Whole-transfer timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 30,
            timeout_secs: 600,
        }
    }
}

impl HttpSettings {
    /// Timeouts for the downloader.
    #[must_use]
    pub const fn timeouts(&self) -> Timeouts {
        Timeouts {
            connect: Duration::from_secs(self.connect_timeout_secs),
            overall: Duration::from_secs(self.timeout_secs),
        }
    }
}

/// Settings for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Stop after the current script once any task failed.
    pub abort_on_error: bool,
    /// Summary rendering.
    pub output: OutputFormat,
    /// Requirements naming no known script.
    pub unknown_requirements: UnknownRequirementPolicy,
    /// Requirement cycles.
    pub cycles: CyclePolicy,
    /// Remote source timeouts.
    pub http: HttpSettings,
}

impl Settings {
    /// Load settings.
    ///
    /// An explicit path must exist. Without one, `taskscript.toml` next to
    /// `document` is used when present and defaults otherwise.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(explicit: Option<&Path>, document: &Path) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            if !path.exists() {
                return Err(ConfigError::Io {
                    path: path.to_path_buf(),
                    source: std::io::Error::from(std::io::ErrorKind::NotFound),
                });
            }
            return load_config(path);
        }
        load_config(&Self::default_path(document))
    }

    /// `taskscript.toml` in the document's directory.
    #[must_use]
    pub fn default_path(document: &Path) -> PathBuf {
        document
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join(DEFAULT_SETTINGS_FILE)
    }

    /// Scheduler policies.
    #[must_use]
    pub const fn schedule_policy(&self) -> SchedulePolicy {
        SchedulePolicy {
            unknown_requirements: self.unknown_requirements,
            cycles: self.cycles,
        }
    }
}
