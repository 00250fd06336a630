//! `Key=Value` config files patched one parameter at a time.
use std::fs;
use std::path::{Path, PathBuf};

use super::fs::{DEFAULT_DIR_MODE, copy_file, ensure_parent_dir, file_exists};
use crate::error::ExecError;

/// Mode given to config files this module creates.
pub const NEW_FILE_MODE: u32 = 0o600;

/// A parameter edit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Edit<'a> {
    /// Ensure `key=value`, replacing the first existing line for `key`.
    Set(&'a str),
    /// Remove every line for `key`.
    Remove,
}

fn line_key(line: &str) -> Option<&str> {
    let trimmed = line.trim_start();
    if trimmed.starts_with('#') || trimmed.starts_with(';') {
        return None;
    }
    trimmed.split_once('=').map(|(k, _)| k.trim())
}

/// Apply `edits` to `text`, returning the new text and the number of
/// parameters that actually changed.
///
/// Keys compare case-insensitively. Comments and unrelated lines are kept
/// as they are.
#[must_use]
pub fn patch(text: &str, edits: &[(&str, Edit<'_>)]) -> (String, usize) {
    let mut lines: Vec<String> = text.lines().map(str::to_string).collect();
    let mut changed = 0;
    for (key, edit) in edits {
        let is_key = |line: &String| line_key(line).is_some_and(|k| k.eq_ignore_ascii_case(key));
        match edit {
            Edit::Set(value) => {
                let wanted = format!("{key}={value}");
                let mut seen = false;
                let mut dirty = false;
                lines.retain_mut(|line| {
                    if !is_key(line) {
                        return true;
                    }
                    if seen {
                        dirty = true;
                        return false;
                    }
                    seen = true;
                    if *line != wanted {
                        line.clone_from(&wanted);
                        dirty = true;
                    }
                    true
                });
                if !seen {
                    lines.push(wanted);
                    dirty = true;
                }
                if dirty {
                    changed += 1;
                }
            }
            Edit::Remove => {
                let before = lines.len();
                lines.retain(|line| !is_key(line));
                if lines.len() != before {
                    changed += 1;
                }
            }
        }
    }
    let mut out = lines.join("\n");
    if !out.is_empty() {
        out.push('\n');
    }
    (out, changed)
}

/// Path of the backup written before `path` is modified.
#[must_use]
pub fn backup_path(path: &Path, extension: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".");
    name.push(extension);
    PathBuf::from(name)
}

/// Read `path`, or `None` when it does not exist.
///
/// # Errors
///
/// Returns an error if an existing file cannot be read.
pub fn read_existing(path: &Path) -> Result<Option<String>, ExecError> {
    if !file_exists(path)? {
        return Ok(None);
    }
    fs::read_to_string(path)
        .map(Some)
        .map_err(|e| ExecError::io(format!("reading {}", path.display()), e))
}

/// Write `text` to `path`, copying the previous file to `backup` first.
///
/// A file that did not exist is created (with its parent directories) with
/// [`NEW_FILE_MODE`].
///
/// # Errors
///
/// Returns an error if the backup or the write fails.
pub fn write_with_backup(
    path: &Path,
    text: &str,
    existed: bool,
    backup: Option<&Path>,
) -> Result<(), ExecError> {
    if existed {
        if let Some(backup) = backup {
            copy_file(path, backup)?;
        }
    } else {
        ensure_parent_dir(path, DEFAULT_DIR_MODE)?;
    }
    fs::write(path, text).map_err(|e| ExecError::io(format!("writing {}", path.display()), e))?;
    #[cfg(unix)]
    if !existed {
        use std::os::unix::fs::PermissionsExt as _;
        fs::set_permissions(path, fs::Permissions::from_mode(NEW_FILE_MODE))
            .map_err(|e| ExecError::io(format!("chmod {}", path.display()), e))?;
    }
    Ok(())
}
