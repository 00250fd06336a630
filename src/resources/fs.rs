//! File-system helpers shared by the file executors.
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::ExecError;

/// Mode given to directories created for `makedirs` when no mode is declared.
pub const DEFAULT_DIR_MODE: u32 = 0o755;

/// Directory mode derived from a file mode: every class that may read the
/// file may also search the directory (`0o744` becomes `0o755`).
#[must_use]
pub const fn dir_mode_for(file_mode: u32) -> u32 {
    file_mode | ((file_mode & 0o444) >> 2)
}

/// `true` if `path` exists (following symlinks).
///
/// # Errors
///
/// Returns an error if existence cannot be determined (e.g. permissions).
pub fn file_exists(path: &Path) -> Result<bool, ExecError> {
    path.try_exists()
        .map_err(|e| ExecError::io(format!("failed to check if '{}' exists", path.display()), e))
}

/// Ensure the parent directory of `path` exists, creating it (and any
/// ancestors) with `mode` on Unix.
///
/// # Errors
///
/// Returns an error if the directory cannot be created.
pub fn ensure_parent_dir(path: &Path, mode: u32) -> Result<(), ExecError> {
    let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) else {
        return Ok(());
    };
    if parent.is_dir() {
        return Ok(());
    }
    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt as _;
        builder.mode(mode);
    }
    #[cfg(not(unix))]
    let _ = mode;
    builder
        .create(parent)
        .map_err(|e| ExecError::io(format!("create parent: {}", parent.display()), e))
}

/// Copy `src` over `dst`.
///
/// # Errors
///
/// Returns an error if the copy fails.
pub fn copy_file(src: &Path, dst: &Path) -> Result<(), ExecError> {
    fs::copy(src, dst).map(|_| ()).map_err(|e| {
        ExecError::io(
            format!("copying {} to {}", src.display(), dst.display()),
            e,
        )
    })
}

/// Move `src` to `dst`, falling back to copy and remove when a rename is
/// not possible (e.g. across file systems).
///
/// # Errors
///
/// Returns an error if neither rename nor copy succeeds.
pub fn move_file(src: &Path, dst: &Path) -> Result<(), ExecError> {
    if fs::rename(src, dst).is_ok() {
        return Ok(());
    }
    copy_file(src, dst)?;
    fs::remove_file(src)
        .map_err(|e| ExecError::io(format!("remove moved file: {}", src.display()), e))
}

/// Read `path`, treating a missing file as empty.
///
/// # Errors
///
/// Returns an error for any failure other than the file being absent.
pub fn read_or_empty(path: &Path) -> Result<Vec<u8>, ExecError> {
    match fs::read(path) {
        Ok(bytes) => Ok(bytes),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(e) => Err(ExecError::io(format!("reading {}", path.display()), e)),
    }
}

/// `true` if both paths resolve to the same file on disk.
///
/// Paths that cannot be resolved (e.g. a missing target) never match.
#[must_use]
pub fn same_file(a: &Path, b: &Path) -> bool {
    match (dunce::canonicalize(a), dunce::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// A scratch file that is removed when the guard drops.
///
/// Removal failures are logged, never escalated.
#[derive(Debug)]
pub struct TempFile {
    path: PathBuf,
}

impl TempFile {
    /// Claim `<target>_temp` as scratch space next to `target`.
    #[must_use]
    pub fn beside(target: &Path) -> Self {
        let mut name = target.as_os_str().to_os_string();
        name.push("_temp");
        Self {
            path: PathBuf::from(name),
        }
    }

    /// Path of the scratch file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempFile {
    fn drop(&mut self) {
        match fs::remove_file(&self.path) {
            Ok(()) => tracing::debug!("removed temp file '{}'", self.path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(
                "failed to remove temp file '{}': {e}",
                self.path.display()
            ),
        }
    }
}
