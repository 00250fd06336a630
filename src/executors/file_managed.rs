//! Executor for `file.managed`.
//!
//! Gates, in order: `creates` marker, target already matching
//! `source_hash`, `onlyif`/`unless` conditions, literal contents already on
//! disk. The first gate that matches ends the task as a successful skip.
//!
//! The apply phase replaces the body (unless `replace: false` and the
//! target exists), then reconciles mode and ownership regardless.
use std::fs;
use std::path::Path;

use url::Url;

use super::conditions::{command_gates, creates_gate};
use super::{Changes, Context, Execute, ExecutionResult, FileChanges};
use crate::error::ExecError;
use crate::resources::attributes::{ModeResource, OwnershipResource};
use crate::resources::checksum::same_contents;
use crate::resources::content::{diff_against_file, encode_text};
use crate::resources::encoding::Charset;
use crate::resources::fs::{
    DEFAULT_DIR_MODE, TempFile, copy_file, dir_mode_for, ensure_parent_dir, file_exists,
    move_file, same_file,
};
use crate::resources::location::Location;
use crate::resources::{Resource, ResourceChange};
use crate::tasks::FileManagedTask;

/// Reconciles a single file against its declaration.
#[derive(Debug, Default, Clone, Copy)]
pub struct FileManagedExecutor;

/// Outcome of the gate sequence.
enum Gate {
    Skip(String),
    /// Continue; carries the contents diff when literal contents are declared.
    Proceed(Option<String>),
}

fn gates(
    task: &FileManagedTask,
    target: &Path,
    charset: Option<Charset>,
    ctx: &Context,
) -> Result<Gate, ExecError> {
    if let Some(reason) = creates_gate(&task.common.creates, ctx)? {
        return Ok(Gate::Skip(reason));
    }

    if let Some(hash) = &task.source_hash {
        let verification = hash.verify_file(target)?;
        if verification.matched {
            return Ok(Gate::Skip(format!(
                "hash '{}' matches the hash sum of file at '{}', will not update it",
                hash.declared(),
                target.display()
            )));
        }
        ctx.log.debug(&format!(
            "target '{}' has checksum {}, expected {}",
            target.display(),
            verification.actual_or_missing(),
            hash.declared()
        ));
    }

    if let Some(reason) = command_gates(&task.common, task.user.as_deref(), ctx)? {
        return Ok(Gate::Skip(reason));
    }

    let Some(contents) = &task.contents else {
        return Ok(Gate::Proceed(None));
    };
    let diff = diff_against_file(target, contents, charset)?;
    if diff.is_empty() {
        return Ok(Gate::Skip(format!(
            "file '{}' matched with the expected contents, will skip the execution",
            target.display()
        )));
    }
    ctx.log.info(&format!(
        "file '{}' differs from the expected contents:\n{}",
        target.display(),
        diff.trim_end()
    ));
    Ok(Gate::Proceed(Some(diff)))
}

fn verify_source(
    task: &FileManagedTask,
    file: &Path,
    origin: &str,
    source: &str,
) -> Result<(), ExecError> {
    let Some(hash) = &task.source_hash else {
        return Ok(());
    };
    let verification = hash.verify_file(file)?;
    if verification.matched {
        return Ok(());
    }
    Err(ExecError::Verification(format!(
        "checksum '{}' didn't match with checksum '{}' of the {origin} source '{source}'",
        hash.declared(),
        verification.actual_or_missing()
    )))
}

/// Copy a local source into place. Returns whether the target changed.
fn copy_local(
    task: &FileManagedTask,
    source: &Location,
    path: &Path,
    target: &Path,
    ctx: &Context,
) -> Result<bool, ExecError> {
    if !file_exists(path)? {
        return Err(ExecError::Acquisition(format!(
            "source file '{}' does not exist",
            source.raw()
        )));
    }
    if task.skip_verify || task.source_hash.is_none() {
        if same_contents(path, target)? {
            ctx.log.debug(&format!(
                "'{}' already has the contents of '{}'",
                target.display(),
                source.raw()
            ));
            return Ok(false);
        }
    } else {
        verify_source(task, path, "local", source.raw())?;
    }
    if same_file(path, target) {
        ctx.log.debug(&format!("'{}' is the source itself", target.display()));
        return Ok(false);
    }
    ctx.log.debug(&format!("copying '{}' to '{}'", source.raw(), target.display()));
    copy_file(path, target)?;
    Ok(true)
}

/// Download a remote source next to the target, verify it, then move it
/// into place. The scratch file is removed on every exit path.
fn download(
    task: &FileManagedTask,
    source: &Location,
    url: &Url,
    target: &Path,
    ctx: &Context,
) -> Result<bool, ExecError> {
    let temp = TempFile::beside(target);
    ctx.log.debug(&format!(
        "downloading '{url}' to '{}'",
        temp.path().display()
    ));
    let bytes = ctx
        .downloader
        .fetch(url, temp.path(), task.skip_tls_verify, &ctx.cancel)?;
    ctx.log.debug(&format!("downloaded {bytes} bytes from '{url}'"));
    verify_source(task, temp.path(), "remote", source.raw())?;
    move_file(temp.path(), target)?;
    Ok(true)
}

fn write_contents(target: &Path, contents: &str, charset: Option<Charset>) -> Result<(), ExecError> {
    let bytes = encode_text(contents, charset)?;
    fs::write(target, bytes)
        .map_err(|e| ExecError::io(format!("writing {}", target.display()), e))
}

fn apply_attributes(
    task: &FileManagedTask,
    target: &Path,
    changes: &mut FileChanges,
    ctx: &Context,
) -> Result<(), ExecError> {
    if let Some(mode) = task.mode {
        match ModeResource::new(target.to_path_buf(), mode).reconcile()? {
            ResourceChange::Applied => changes.mode = Some(format!("{mode:04o}")),
            ResourceChange::AlreadyCorrect => {}
            ResourceChange::Skipped { reason } => {
                ctx.log.warn(&format!("mode not applied to '{}': {reason}", target.display()));
            }
        }
    }

    if task.user.is_none() && task.group.is_none() {
        return Ok(());
    }
    let ownership = OwnershipResource::new(
        target,
        task.user.as_deref(),
        task.group.as_deref(),
        ctx.runner.as_ref(),
        &ctx.cancel,
    );
    match ownership.reconcile()? {
        ResourceChange::Applied => {
            changes.owner = Some(format!(
                "{}:{}",
                task.user.as_deref().unwrap_or_default(),
                task.group.as_deref().unwrap_or_default()
            ));
        }
        ResourceChange::AlreadyCorrect => {}
        ResourceChange::Skipped { reason } => {
            ctx.log.warn(&format!(
                "ownership not applied to '{}': {reason}",
                target.display()
            ));
        }
    }
    Ok(())
}

fn reconcile(task: &FileManagedTask, ctx: &Context) -> Result<ExecutionResult, ExecError> {
    let target = Path::new(&task.name);
    let charset = task.encoding.as_deref().map(Charset::lookup).transpose()?;

    let diff = match gates(task, target, charset, ctx)? {
        Gate::Skip(reason) => {
            ctx.log.debug(&format!("skipping {}: {reason}", task.common.path));
            return Ok(ExecutionResult::skipped(reason));
        }
        Gate::Proceed(diff) => diff,
    };

    let mut changes = FileChanges::default();
    if !task.replace && file_exists(target)? {
        ctx.log.debug(&format!(
            "'{}' exists and replace is false, leaving its contents",
            target.display()
        ));
    } else {
        if task.makedirs {
            ensure_parent_dir(target, task.mode.map_or(DEFAULT_DIR_MODE, dir_mode_for))?;
        }
        changes.updated = match (&task.source, &task.contents) {
            (Some(source), _) => match (source.url(), source.local_path()) {
                (Some(url), _) => download(task, source, url, target, ctx)?,
                (None, Some(path)) => copy_local(task, source, path, target, ctx)?,
                (None, None) => false,
            },
            (None, Some(contents)) => {
                write_contents(target, contents, charset)?;
                changes.diff = diff;
                true
            }
            (None, None) => false,
        };
    }

    apply_attributes(task, target, &mut changes, ctx)?;

    let comment = if changes.updated {
        format!("File '{}' updated", target.display())
    } else if changes.mode.is_some() || changes.owner.is_some() {
        format!("File '{}' attributes updated", target.display())
    } else {
        format!("File '{}' is in the correct state", target.display())
    };
    Ok(ExecutionResult {
        comment,
        changes: Changes::File(changes),
        ..ExecutionResult::default()
    })
}

impl Execute<FileManagedTask> for FileManagedExecutor {
    fn execute(&self, task: &FileManagedTask, ctx: &Context) -> ExecutionResult {
        reconcile(task, ctx).unwrap_or_else(ExecutionResult::failed)
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::exec::{ExecResult, MockCommandRunner};
    use crate::executors::conditions::ONLYIF_FAILED;
    use crate::executors::test_support::context;
    use crate::resources::checksum::{Checksum, HashAlgorithm, hash_file};

    fn task(target: &Path) -> FileManagedTask {
        let mut t = FileManagedTask::new("file.managed", "site.file.managed");
        t.name = target.display().to_string();
        t
    }

    fn sha256_of(path: &Path) -> Checksum {
        let hex = hash_file(HashAlgorithm::Sha256, path).unwrap();
        Checksum::parse(&format!("sha256={hex}")).unwrap()
    }

    fn run(t: &FileManagedTask) -> ExecutionResult {
        FileManagedExecutor.execute(t, &context(MockCommandRunner::new()))
    }

    fn scratch() -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("app.conf");
        (dir, target)
    }

    #[test]
    fn writes_contents_then_skips() {
        let (_dir, target) = scratch();
        let mut t = task(&target);
        t.contents = Some("port=80\n".into());

        let first = run(&t);
        assert!(first.succeeded(), "{:?}", first.err);
        assert!(!first.is_skipped());
        assert_eq!(std::fs::read_to_string(&target).unwrap(), "port=80\n");
        assert!(first.changes.is_change());

        let second = run(&t);
        assert!(second.is_skipped());
        assert_eq!(
            second.skip_reason.unwrap(),
            format!(
                "file '{}' matched with the expected contents, will skip the execution",
                target.display()
            )
        );
    }

    #[test]
    fn contents_change_records_diff() {
        let (_dir, target) = scratch();
        std::fs::write(&target, "port=80\n").unwrap();
        let mut t = task(&target);
        t.contents = Some("port=8080\n".into());
        let result = run(&t);
        assert!(matches!(
            result.changes,
            Changes::File(FileChanges { updated: true, diff: Some(ref d), .. })
                if d == "-port=80\n+port=8080\n"
        ));
    }

    #[test]
    fn creates_marker_skips_before_anything_else() {
        let (dir, target) = scratch();
        let marker = dir.path().join("installed");
        std::fs::write(&marker, "").unwrap();
        let mut t = task(&target);
        t.contents = Some("x".into());
        t.common.creates = vec![marker.display().to_string()];
        let result = run(&t);
        assert_eq!(
            result.skip_reason.unwrap(),
            format!("file '{}' exists", marker.display())
        );
        assert!(!target.exists());
    }

    #[test]
    fn matching_target_hash_skips() {
        let (dir, target) = scratch();
        std::fs::write(&target, "payload").unwrap();
        let source = dir.path().join("src.bin");
        std::fs::write(&source, "other").unwrap();
        let mut t = task(&target);
        t.source = Some(Location::parse(source.to_str().unwrap()).unwrap());
        t.source_hash = Some(sha256_of(&target));
        let result = run(&t);
        let reason = result.skip_reason.unwrap();
        assert!(reason.starts_with("hash 'sha256="), "{reason}");
        assert!(reason.ends_with("will not update it"), "{reason}");
        assert_eq!(std::fs::read_to_string(&target).unwrap(), "payload");
    }

    #[test]
    fn failing_onlyif_skips() {
        let (_dir, target) = scratch();
        let mut runner = MockCommandRunner::new();
        runner.expect_run().returning(|_, _| {
            Ok(ExecResult {
                success: false,
                code: Some(1),
                ..ExecResult::default()
            })
        });
        let mut t = task(&target);
        t.contents = Some("x".into());
        t.common.onlyif = vec!["false".into()];
        let result = FileManagedExecutor.execute(&t, &context(runner));
        assert_eq!(result.skip_reason.as_deref(), Some(ONLYIF_FAILED));
        assert!(!target.exists());
    }

    #[test]
    fn conditions_run_as_the_owning_user() {
        let (_dir, target) = scratch();
        let mut runner = MockCommandRunner::new();
        runner
            .expect_run()
            .withf(|spec, _| {
                spec.command == "test -d /srv" && spec.user.as_deref() == Some("deploy")
            })
            .times(1)
            .returning(|_, _| {
                Ok(ExecResult {
                    success: false,
                    code: Some(1),
                    ..ExecResult::default()
                })
            });
        let mut t = task(&target);
        t.contents = Some("x".into());
        t.user = Some("deploy".into());
        t.common.onlyif = vec!["test -d /srv".into()];
        let result = FileManagedExecutor.execute(&t, &context(runner));
        assert_eq!(result.skip_reason.as_deref(), Some(ONLYIF_FAILED));
    }

    #[test]
    fn local_source_is_verified_and_copied() {
        let (dir, target) = scratch();
        let source = dir.path().join("src.conf");
        std::fs::write(&source, "from source").unwrap();
        let mut t = task(&target);
        t.source = Some(Location::parse(source.to_str().unwrap()).unwrap());
        t.source_hash = Some(sha256_of(&source));
        let result = run(&t);
        assert!(result.succeeded(), "{:?}", result.err);
        assert_eq!(std::fs::read_to_string(&target).unwrap(), "from source");
    }

    #[test]
    fn local_source_hash_mismatch_fails() {
        let (dir, target) = scratch();
        let source = dir.path().join("src.conf");
        std::fs::write(&source, "tampered").unwrap();
        let mut t = task(&target);
        t.source = Some(Location::parse(source.to_str().unwrap()).unwrap());
        t.source_hash = Some(Checksum::parse("md5=00000000000000000000000000000000").unwrap());
        let err = run(&t).err.unwrap();
        assert!(matches!(err, ExecError::Verification(_)));
        let msg = err.to_string();
        assert!(
            msg.starts_with(
                "checksum 'md5=00000000000000000000000000000000' didn't match with checksum 'md5="
            ),
            "{msg}"
        );
        assert!(msg.contains("of the local source"), "{msg}");
        assert!(!target.exists());
    }

    #[test]
    fn skip_verify_copies_only_when_different() {
        let (dir, target) = scratch();
        let source = dir.path().join("src.conf");
        std::fs::write(&source, "same").unwrap();
        std::fs::write(&target, "same").unwrap();
        let mut t = task(&target);
        t.source = Some(Location::parse(source.to_str().unwrap()).unwrap());
        t.source_hash = Some(Checksum::parse("md5=00000000000000000000000000000000").unwrap());
        t.skip_verify = true;
        let result = run(&t);
        assert!(result.succeeded(), "{:?}", result.err);
        assert!(!result.changes.is_change());
    }

    #[test]
    fn missing_local_source_fails() {
        let (dir, target) = scratch();
        let mut t = task(&target);
        let missing = dir.path().join("nope");
        t.source = Some(Location::parse(missing.to_str().unwrap()).unwrap());
        assert!(matches!(run(&t).err, Some(ExecError::Acquisition(_))));
    }

    #[test]
    fn replace_false_keeps_existing_body() {
        let (_dir, target) = scratch();
        std::fs::write(&target, "hand edited").unwrap();
        let mut t = task(&target);
        t.contents = Some("managed".into());
        t.replace = false;
        let result = run(&t);
        assert!(result.succeeded());
        assert_eq!(std::fs::read_to_string(&target).unwrap(), "hand edited");
    }

    #[test]
    fn replace_false_still_creates_missing_file() {
        let (_dir, target) = scratch();
        let mut t = task(&target);
        t.contents = Some("managed".into());
        t.replace = false;
        assert!(run(&t).succeeded());
        assert_eq!(std::fs::read_to_string(&target).unwrap(), "managed");
    }

    #[test]
    fn missing_parent_without_makedirs_fails() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("sub/app.conf");
        let mut t = task(&target);
        t.contents = Some("x".into());
        assert!(matches!(run(&t).err, Some(ExecError::Io { .. })));
    }

    #[cfg(unix)]
    #[test]
    fn makedirs_and_mode_are_applied() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("nested/app.conf");
        let mut t = task(&target);
        t.contents = Some("x".into());
        t.makedirs = true;
        t.mode = Some(0o640);
        let result = run(&t);
        assert!(result.succeeded(), "{:?}", result.err);
        let mode = std::fs::metadata(&target).unwrap().permissions().mode() & 0o7777;
        assert_eq!(mode, 0o640);
        assert!(matches!(
            result.changes,
            Changes::File(FileChanges { mode: Some(ref m), .. }) if m == "0640"
        ));
    }

    #[test]
    fn unknown_encoding_fails() {
        let (_dir, target) = scratch();
        let mut t = task(&target);
        t.contents = Some("x".into());
        t.encoding = Some("klingon".into());
        let err = run(&t).err.unwrap();
        assert_eq!(err.to_string(), "unknown encoding: 'klingon'");
    }

    #[test]
    fn contents_are_transcoded() {
        let (_dir, target) = scratch();
        let mut t = task(&target);
        t.contents = Some("café".into());
        t.encoding = Some("iso8859_1".into());
        assert!(run(&t).succeeded());
        assert_eq!(std::fs::read(&target).unwrap(), b"caf\xe9");
        assert!(run(&t).is_skipped());
    }

    #[test]
    fn unsupported_scheme_is_acquisition_error() {
        let (_dir, target) = scratch();
        let mut t = task(&target);
        t.source = Some(Location::parse("gopher://example.com/file").unwrap());
        t.source_hash = Some(Checksum::parse("md5=00000000000000000000000000000000").unwrap());
        let err = run(&t).err.unwrap();
        assert!(
            err.to_string()
                .starts_with("unknown or unsupported protocol 'gopher'"),
            "{err}"
        );
        assert!(!target.exists());
    }
}
