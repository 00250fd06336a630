use std::sync::Arc;

use crate::exec::{CancelToken, CommandRunner, SystemRunner};
use crate::logging::Log;
use crate::platform::Platform;
use crate::resources::download::Downloader;

/// Shared context for task execution.
#[derive(Clone)]
pub struct Context {
    /// Detected platform information.
    pub platform: Arc<Platform>,
    /// Logger for progress and gate decisions.
    pub log: Arc<dyn Log>,
    /// Runs task and condition commands.
    pub runner: Arc<dyn CommandRunner>,
    /// Fetches remote sources.
    pub downloader: Downloader,
    /// Set when the run is interrupted.
    pub cancel: CancelToken,
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("platform", &self.platform)
            .field("log", &"<dyn Log>")
            .field("runner", &self.runner)
            .field("downloader", &self.downloader)
            .field("cancel", &self.cancel.is_cancelled())
            .finish()
    }
}

impl Context {
    /// Context for the current system using the real command runner.
    #[must_use]
    pub fn new(log: Arc<dyn Log>, downloader: Downloader, cancel: CancelToken) -> Self {
        Self {
            platform: Arc::new(Platform::detect()),
            log,
            runner: Arc::new(SystemRunner),
            downloader,
            cancel,
        }
    }

    /// Replace the command runner.
    #[must_use]
    pub fn with_runner(mut self, runner: Arc<dyn CommandRunner>) -> Self {
        self.runner = runner;
        self
    }

    /// Replace the platform.
    #[must_use]
    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = Arc::new(platform);
        self
    }
}
