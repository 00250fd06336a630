//! The [`Log`] trait shared by executors, the orchestrator and commands.

/// Abstraction over logging backends.
///
/// Executors and the orchestrator log through this trait so tests can
/// substitute an isolated logger without touching the global subscriber.
pub trait Log: Send + Sync {
    /// Log a stage header (major section).
    fn stage(&self, msg: &str);
    /// Log an informational message.
    fn info(&self, msg: &str);
    /// Log a debug message (may be suppressed on console).
    fn debug(&self, msg: &str);
    /// Log a warning message.
    fn warn(&self, msg: &str);
    /// Log an error message.
    fn error(&self, msg: &str);
}
