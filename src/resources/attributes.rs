//! File mode and ownership resources (Unix only).
use std::cell::OnceCell;
use std::path::{Path, PathBuf};

use super::{Resource, ResourceChange, ResourceState};
use crate::error::ExecError;
use crate::exec::{CancelToken, CommandRunner, CommandSpec};

/// Parse a declared file mode.
///
/// Strings are read as octal (`"0644"`, `"644"`). Integers are read by
/// their decimal digits as octal, so YAML `644` means `0o644`.
///
/// # Errors
///
/// Returns `invalid file mode value '<v>'` for anything else.
pub fn parse_mode(raw: &str) -> Result<u32, String> {
    let trimmed = raw.trim();
    let digits = trimmed
        .strip_prefix("0o")
        .or_else(|| trimmed.strip_prefix("0O"))
        .unwrap_or(trimmed);
    u32::from_str_radix(digits, 8)
        .ok()
        .filter(|m| !digits.is_empty() && *m <= 0o7777)
        .ok_or_else(|| format!("invalid file mode value '{raw}'"))
}

/// A permission mode on a single file.
#[derive(Debug, Clone)]
pub struct ModeResource {
    path: PathBuf,
    mode: u32,
}

impl ModeResource {
    /// Desired `mode` on `path`.
    #[must_use]
    pub const fn new(path: PathBuf, mode: u32) -> Self {
        Self { path, mode }
    }
}

impl Resource for ModeResource {
    fn description(&self) -> String {
        format!("mode {:o} {}", self.mode, self.path.display())
    }

    fn current_state(&self) -> Result<ResourceState, ExecError> {
        if !self.path.exists() {
            return Ok(ResourceState::Invalid {
                reason: format!("target does not exist: {}", self.path.display()),
            });
        }

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let meta = std::fs::metadata(&self.path)
                .map_err(|e| ExecError::io(format!("stat {}", self.path.display()), e))?;
            let current = meta.permissions().mode() & 0o7777;
            if current == self.mode {
                Ok(ResourceState::Correct)
            } else {
                Ok(ResourceState::Incorrect {
                    current: format!("{current:o}"),
                })
            }
        }

        #[cfg(not(unix))]
        Ok(ResourceState::Invalid {
            reason: "file modes not supported on this platform".to_string(),
        })
    }

    fn apply(&self) -> Result<ResourceChange, ExecError> {
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&self.path, std::fs::Permissions::from_mode(self.mode))
                .map_err(|e| {
                    ExecError::Attribute(format!(
                        "failed to set mode {:o} on '{}': {e}",
                        self.mode,
                        self.path.display()
                    ))
                })?;
            Ok(ResourceChange::Applied)
        }

        #[cfg(not(unix))]
        Ok(ResourceChange::Skipped {
            reason: "file modes not supported on this platform".to_string(),
        })
    }
}

/// Owner and/or group of a single file.
///
/// Names are resolved to numeric ids with `id -u` and `getent group`;
/// purely numeric values are used as-is.
#[derive(Debug)]
pub struct OwnershipResource<'a> {
    path: &'a Path,
    user: Option<&'a str>,
    group: Option<&'a str>,
    runner: &'a dyn CommandRunner,
    cancel: &'a CancelToken,
    ids: OnceCell<(Option<u32>, Option<u32>)>,
}

/// Single-quote `s` for a POSIX shell.
fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', r"'\''"))
}

impl<'a> OwnershipResource<'a> {
    /// Desired `user`/`group` on `path`.
    #[must_use]
    pub const fn new(
        path: &'a Path,
        user: Option<&'a str>,
        group: Option<&'a str>,
        runner: &'a dyn CommandRunner,
        cancel: &'a CancelToken,
    ) -> Self {
        Self {
            path,
            user,
            group,
            runner,
            cancel,
            ids: OnceCell::new(),
        }
    }

    fn lookup(&self, command: String, what: &str, name: &str) -> Result<u32, ExecError> {
        let out = self.runner.run(&CommandSpec::new(command), self.cancel)?;
        if !out.success {
            return Err(ExecError::Attribute(format!("unknown {what} '{name}'")));
        }
        out.stdout
            .split(':')
            .nth(if what == "group" { 2 } else { 0 })
            .and_then(|id| id.trim().parse().ok())
            .ok_or_else(|| ExecError::Attribute(format!("cannot resolve {what} '{name}'")))
    }

    fn resolve_uid(&self) -> Result<Option<u32>, ExecError> {
        self.user
            .map(|u| match u.parse() {
                Ok(id) => Ok(id),
                Err(_) => self.lookup(format!("id -u {}", shell_quote(u)), "user", u),
            })
            .transpose()
    }

    fn resolve_gid(&self) -> Result<Option<u32>, ExecError> {
        self.group
            .map(|g| match g.parse() {
                Ok(id) => Ok(id),
                Err(_) => self.lookup(format!("getent group {}", shell_quote(g)), "group", g),
            })
            .transpose()
    }

    /// Uid and gid, resolved on first use.
    fn ids(&self) -> Result<(Option<u32>, Option<u32>), ExecError> {
        if let Some(ids) = self.ids.get() {
            return Ok(*ids);
        }
        let ids = (self.resolve_uid()?, self.resolve_gid()?);
        Ok(*self.ids.get_or_init(|| ids))
    }
}

impl Resource for OwnershipResource<'_> {
    fn description(&self) -> String {
        format!(
            "owner {}:{} {}",
            self.user.unwrap_or("-"),
            self.group.unwrap_or("-"),
            self.path.display()
        )
    }

    fn current_state(&self) -> Result<ResourceState, ExecError> {
        if !self.path.exists() {
            return Ok(ResourceState::Invalid {
                reason: format!("target does not exist: {}", self.path.display()),
            });
        }

        #[cfg(unix)]
        {
            use std::os::unix::fs::MetadataExt;
            let meta = std::fs::metadata(self.path)
                .map_err(|e| ExecError::io(format!("stat {}", self.path.display()), e))?;
            let (uid, gid) = self.ids()?;
            let uid_ok = uid.is_none_or(|uid| uid == meta.uid());
            let gid_ok = gid.is_none_or(|gid| gid == meta.gid());
            if uid_ok && gid_ok {
                Ok(ResourceState::Correct)
            } else {
                Ok(ResourceState::Incorrect {
                    current: format!("{}:{}", meta.uid(), meta.gid()),
                })
            }
        }

        #[cfg(not(unix))]
        Ok(ResourceState::Invalid {
            reason: "file ownership not supported on this platform".to_string(),
        })
    }

    fn apply(&self) -> Result<ResourceChange, ExecError> {
        #[cfg(unix)]
        {
            let (uid, gid) = self.ids()?;
            std::os::unix::fs::chown(self.path, uid, gid).map_err(|e| {
                ExecError::Attribute(format!(
                    "failed to change owner of '{}': {e}",
                    self.path.display()
                ))
            })?;
            Ok(ResourceChange::Applied)
        }

        #[cfg(not(unix))]
        Ok(ResourceChange::Skipped {
            reason: "file ownership not supported on this platform".to_string(),
        })
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::exec::{ExecResult, MockCommandRunner};

    #[test]
    fn parse_mode_accepts_octal_forms() {
        assert_eq!(parse_mode("0644").unwrap(), 0o644);
        assert_eq!(parse_mode("755").unwrap(), 0o755);
        assert_eq!(parse_mode("0o600").unwrap(), 0o600);
    }

    #[test]
    fn parse_mode_rejects_non_octal() {
        assert_eq!(
            parse_mode("rwxr-xr-x").unwrap_err(),
            "invalid file mode value 'rwxr-xr-x'"
        );
        assert!(parse_mode("0999").is_err());
        assert!(parse_mode("").is_err());
        assert!(parse_mode("77777").is_err());
    }

    #[test]
    fn mode_resource_invalid_when_target_missing() {
        let dir = tempfile::tempdir().unwrap();
        let r = ModeResource::new(dir.path().join("missing"), 0o600);
        assert!(matches!(
            r.current_state().unwrap(),
            ResourceState::Invalid { .. }
        ));
    }

    #[cfg(unix)]
    #[test]
    fn mode_resource_reconciles() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("f");
        std::fs::write(&file, "x").unwrap();
        std::fs::set_permissions(&file, std::fs::Permissions::from_mode(0o644)).unwrap();

        let r = ModeResource::new(file.clone(), 0o600);
        assert_eq!(
            r.current_state().unwrap(),
            ResourceState::Incorrect {
                current: "644".into()
            }
        );
        assert_eq!(r.reconcile().unwrap(), ResourceChange::Applied);
        assert_eq!(r.reconcile().unwrap(), ResourceChange::AlreadyCorrect);
    }

    #[cfg(unix)]
    #[test]
    fn ownership_with_current_numeric_ids_is_correct() {
        use std::os::unix::fs::MetadataExt;

        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("f");
        std::fs::write(&file, "x").unwrap();
        let meta = std::fs::metadata(&file).unwrap();
        let uid = meta.uid().to_string();
        let gid = meta.gid().to_string();

        let mut runner = MockCommandRunner::new();
        runner.expect_run().never();
        let cancel = CancelToken::new();
        let r = OwnershipResource::new(&file, Some(&uid), Some(&gid), &runner, &cancel);
        assert_eq!(r.current_state().unwrap(), ResourceState::Correct);
    }

    #[cfg(unix)]
    #[test]
    fn ownership_resolves_group_name_through_getent() {
        use std::os::unix::fs::MetadataExt;

        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("f");
        std::fs::write(&file, "x").unwrap();
        let gid = std::fs::metadata(&file).unwrap().gid();

        let mut runner = MockCommandRunner::new();
        runner
            .expect_run()
            .withf(|spec, _| spec.command == "getent group 'staff'")
            .returning(move |_, _| {
                Ok(ExecResult {
                    stdout: format!("staff:x:{gid}:\n"),
                    success: true,
                    code: Some(0),
                    ..ExecResult::default()
                })
            });
        let cancel = CancelToken::new();
        let r = OwnershipResource::new(&file, None, Some("staff"), &runner, &cancel);
        assert_eq!(r.current_state().unwrap(), ResourceState::Correct);
    }

    #[cfg(unix)]
    #[test]
    fn names_are_quoted_and_resolved_once() {
        use std::os::unix::fs::MetadataExt;

        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("f");
        std::fs::write(&file, "x").unwrap();
        let uid = std::fs::metadata(&file).unwrap().uid();

        let mut runner = MockCommandRunner::new();
        runner
            .expect_run()
            .withf(|spec, _| spec.command == r"id -u 'o'\''brien; true'")
            .times(1)
            .returning(move |_, _| {
                Ok(ExecResult {
                    stdout: format!("{uid}\n"),
                    success: true,
                    code: Some(0),
                    ..ExecResult::default()
                })
            });
        let cancel = CancelToken::new();
        let r = OwnershipResource::new(&file, Some("o'brien; true"), None, &runner, &cancel);
        assert_eq!(r.current_state().unwrap(), ResourceState::Correct);
        assert_eq!(r.apply().unwrap(), ResourceChange::Applied);
    }

    #[test]
    fn shell_quote_wraps_and_escapes() {
        assert_eq!(shell_quote("staff"), "'staff'");
        assert_eq!(shell_quote("a'b"), r"'a'\''b'");
    }

    #[test]
    fn unknown_user_is_attribute_error() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("f");
        std::fs::write(&file, "x").unwrap();

        let mut runner = MockCommandRunner::new();
        runner.expect_run().returning(|_, _| {
            Ok(ExecResult {
                success: false,
                code: Some(1),
                ..ExecResult::default()
            })
        });
        let cancel = CancelToken::new();
        let r = OwnershipResource::new(&file, Some("nobody-here"), None, &runner, &cancel);
        if cfg!(unix) {
            let err = r.current_state().unwrap_err();
            assert_eq!(err.to_string(), "unknown user 'nobody-here'");
        }
    }
}
