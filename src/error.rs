//! Domain-specific error types for the task engine.
//!
//! Internal modules return these typed errors while the command handlers at
//! the CLI boundary convert them to [`anyhow::Error`] via `?`.
//!
//! # Error hierarchy
//!
//! ```text
//! ConfigError    — settings file and script document loading
//! BuildError     — turning raw declarations into typed tasks
//! ├── FieldErrors     (aggregated, one FieldError per bad key)
//! └── ValidationError (required fields, cross-field rules)
//! ScheduleError  — requirement cycles, unknown requirements
//! ExecError      — a single task execution failure
//! RunError       — failures that stop the whole run
//! ```

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Errors that arise from loading settings and script documents.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A file could not be read.
    #[error("IO error reading {path}: {source}")]
    Io {
        /// Path to the file that could not be read.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The script document is not valid YAML.
    #[error("invalid YAML in {path}: {source}")]
    Yaml {
        /// Path to the document.
        path: PathBuf,
        /// Underlying parser error.
        source: serde_yaml::Error,
    },

    /// The settings file is not valid TOML.
    #[error("invalid TOML in {path}: {source}")]
    Toml {
        /// Path to the settings file.
        path: PathBuf,
        /// Underlying parser error.
        source: toml::de::Error,
    },

    /// The document parsed but does not have the expected shape.
    #[error("invalid script document at '{location}': {message}")]
    InvalidDocument {
        /// Dotted location inside the document.
        location: String,
        /// What was wrong.
        message: String,
    },

    /// Two scripts share the same identifier.
    #[error("duplicate script id '{0}'")]
    DuplicateScript(String),

    /// One or more tasks could not be built.
    #[error("{}", render_build_failures(.0))]
    InvalidTasks(Vec<TaskBuildFailure>),
}

/// A task that failed to build, with its source-location label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskBuildFailure {
    /// Source-location label of the task.
    pub path: String,
    /// Why it failed.
    pub error: BuildError,
}

fn render_build_failures(failures: &[TaskBuildFailure]) -> String {
    let mut out = format!("{} task(s) failed to build", failures.len());
    for failure in failures {
        out.push_str(&format!("\n  {}: {}", failure.path, failure.error));
    }
    out
}

/// A raw value could not be coerced into the field's type.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("cannot convert {value} to {expected}")]
pub struct TypeError {
    /// Name of the target type (`bool`, `int`, `string`, `list`).
    pub expected: &'static str,
    /// Rendering of the offending value.
    pub value: String,
}

/// A clear or new-value mark was requested for a field that is not tracked.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TrackingError {
    /// The field is not one of the task kind's change fields.
    #[error("field '{0}' is not a change field")]
    NotChangeField(String),
}

/// Why a single declaration was rejected.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FieldReason {
    /// Scalar/list coercion failed.
    #[error(transparent)]
    Type(#[from] TypeError),
    /// The tracker refused the mark.
    #[error(transparent)]
    Tracking(#[from] TrackingError),
    /// A custom field parser rejected the value.
    #[error("{0}")]
    Invalid(String),
}

/// One rejected declaration, annotated with its key and task location.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{reason} at path '{path}.{key}'")]
pub struct FieldError {
    /// Declaration key as written in the document.
    pub key: String,
    /// Source-location label of the task.
    pub path: String,
    /// What went wrong.
    pub reason: FieldReason,
}

/// Every field failure collected during one mapping pass.
#[derive(Error, Debug, Default, Clone, PartialEq, Eq)]
pub struct FieldErrors(Vec<FieldError>);

impl FieldErrors {
    /// Append a failure.
    pub fn push(&mut self, err: FieldError) {
        self.0.push(err);
    }

    /// `true` when no field failed.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of failed fields.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.0.len()
    }

    /// Iterate the failures in declaration order.
    pub fn iter(&self) -> std::slice::Iter<'_, FieldError> {
        self.0.iter()
    }

    /// `Ok(())` when empty, otherwise `Err(self)`.
    ///
    /// # Errors
    ///
    /// Returns the collected errors when at least one field failed.
    pub fn into_result(self) -> Result<(), Self> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, err) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{err}")?;
        }
        Ok(())
    }
}

/// A task was mapped successfully but its values are inconsistent.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{}", .messages.join("; "))]
pub struct ValidationError {
    /// One message per violated rule.
    pub messages: Vec<String>,
}

/// Errors raised while building a task from its declarations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BuildError {
    /// No builder is registered for the task type.
    #[error("no builders registered for task type '{0}'")]
    UnknownTaskType(String),
    /// One or more declarations could not be mapped.
    #[error(transparent)]
    Fields(#[from] FieldErrors),
    /// The mapped task is invalid.
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// Errors raised while ordering scripts.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScheduleError {
    /// A requirement chain leads back to a script still being placed.
    #[error("requirement cycle detected: {}", .0.join(" -> "))]
    Cycle(Vec<String>),
    /// A requirement names no known script.
    #[error("script '{script}' requires unknown script '{requirement}'")]
    UnknownRequirement {
        /// Script declaring the requirement.
        script: String,
        /// The unresolved identifier.
        requirement: String,
    },
}

/// Checksum declaration or computation problems.
#[derive(Error, Debug)]
pub enum HashError {
    /// Declaration is not `<algorithm>=<hexdigest>`.
    #[error("invalid hash format '{0}', expected '<algorithm>=<hash>'")]
    InvalidFormat(String),
    /// Algorithm name is not supported.
    #[error("unknown hash algorithm '{algorithm}' in '{declared}'")]
    UnknownAlgorithm {
        /// Requested algorithm.
        algorithm: String,
        /// Full declaration.
        declared: String,
    },
    /// The file to hash could not be read.
    #[error("failed to read '{path}' for hashing: {source}")]
    Io {
        /// File that was being hashed.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
}

/// Character-set transcoding problems.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EncodingError {
    /// The encoding name is not known.
    #[error("unknown encoding: '{0}'")]
    Unknown(String),
    /// The text contains characters the target charset cannot represent.
    #[error("contents cannot be represented in encoding '{0}'")]
    Unmappable(String),
    /// The bytes are not valid in the source charset.
    #[error("malformed input for encoding '{0}'")]
    Malformed(String),
}

/// Errors that abort a single task execution.
#[derive(Error, Debug)]
pub enum ExecError {
    /// A command could not be launched at all.
    #[error("failed to launch '{command}': {reason}")]
    Launch {
        /// Command line that failed to start.
        command: String,
        /// Why it failed.
        reason: String,
    },
    /// An `onlyif`/`unless` command could not be launched.
    #[error("failed to run condition '{command}': {reason}")]
    ConditionLaunch {
        /// Condition command.
        command: String,
        /// Why it could not run.
        reason: String,
    },
    /// A command ran and exited non-zero.
    #[error("command '{command}' failed (exit {exit_code}): {stderr}")]
    Command {
        /// Command line.
        command: String,
        /// Exit code (-1 when terminated by a signal).
        exit_code: i32,
        /// Captured standard error.
        stderr: String,
    },
    /// Unsupported scheme or a network failure.
    #[error("{0}")]
    Acquisition(String),
    /// Content did not match its declared checksum.
    #[error("{0}")]
    Verification(String),
    /// Checksum declaration or hashing failure.
    #[error(transparent)]
    Hash(#[from] HashError),
    /// Transcoding failure.
    #[error(transparent)]
    Encoding(#[from] EncodingError),
    /// Mode or ownership could not be applied.
    #[error("{0}")]
    Attribute(String),
    /// Filesystem failure.
    #[error("{context}: {source}")]
    Io {
        /// What was being done.
        context: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// The operation is not available on this platform.
    #[error("{0}")]
    Unsupported(String),
    /// The run was cancelled while the task was in flight.
    #[error("operation cancelled")]
    Cancelled,
}

impl ExecError {
    /// Wrap an [`std::io::Error`] with a short description of the operation.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }
}

/// Failures that stop the whole run.
#[derive(Error, Debug)]
pub enum RunError {
    /// No executor is configured for a task kind.
    #[error("no executor registered for task type '{0}'")]
    UnresolvedExecutor(String),
    /// The run was cancelled.
    #[error("run cancelled")]
    Cancelled,
    /// Scripts could not be ordered.
    #[error(transparent)]
    Schedule(#[from] ScheduleError),
}
