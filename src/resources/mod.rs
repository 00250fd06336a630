//! Idempotent resource primitives (check + apply pattern) and the
//! lower-level helpers the executors build on.
pub mod attributes;
mod charmap;
pub mod checksum;
pub mod config_file;
pub mod content;
pub mod download;
pub mod encoding;
pub mod fs;
pub mod location;
pub mod registry;

use crate::error::ExecError;

/// State of a resource (file attribute, registry entry, etc.).
///
/// # Examples
///
/// ```
/// use taskscript_cli::resources::ResourceState;
///
/// let missing = ResourceState::Missing;
/// let wrong = ResourceState::Incorrect { current: "644".into() };
///
/// assert_ne!(missing, ResourceState::Correct);
/// assert_ne!(wrong, ResourceState::Correct);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceState {
    /// Resource does not exist or is not present.
    Missing,
    /// Resource exists and matches the desired state.
    Correct,
    /// Resource exists but does not match the desired state.
    Incorrect {
        /// The current value of the resource.
        current: String,
    },
    /// Resource cannot be managed here (e.g. unsupported platform).
    Invalid {
        /// Reason why the resource cannot be applied.
        reason: String,
    },
}

/// Result of reconciling a resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceChange {
    /// Resource was created or updated.
    Applied,
    /// Resource was already correct (no change needed).
    AlreadyCorrect,
    /// Resource was left alone.
    Skipped {
        /// Reason why the resource was skipped.
        reason: String,
    },
}

/// Unified interface for resources that can be checked and applied.
pub trait Resource {
    /// Human-readable description of this resource.
    fn description(&self) -> String;

    /// Check the current state of the resource.
    ///
    /// # Errors
    ///
    /// Returns an error if the state cannot be determined.
    fn current_state(&self) -> Result<ResourceState, ExecError>;

    /// Bring the resource to its desired state.
    ///
    /// # Errors
    ///
    /// Returns an error if the change cannot be applied.
    fn apply(&self) -> Result<ResourceChange, ExecError>;

    /// Apply only if the current state differs from the desired one.
    ///
    /// # Errors
    ///
    /// Propagates errors from [`current_state`](Self::current_state) and
    /// [`apply`](Self::apply).
    fn reconcile(&self) -> Result<ResourceChange, ExecError> {
        match self.current_state()? {
            ResourceState::Correct => Ok(ResourceChange::AlreadyCorrect),
            ResourceState::Invalid { reason } => Ok(ResourceChange::Skipped { reason }),
            ResourceState::Missing | ResourceState::Incorrect { .. } => self.apply(),
        }
    }
}
