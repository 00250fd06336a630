//! Command: print version information.

/// Version string, overridable at build time with `TASKSCRIPT_VERSION`.
#[must_use]
pub fn version() -> &'static str {
    option_env!("TASKSCRIPT_VERSION").unwrap_or(env!("CARGO_PKG_VERSION"))
}

/// Print the taskscript version to stdout.
pub fn run() {
    println!("taskscript {}", version());
}
