#![allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::wildcard_imports,
    clippy::indexing_slicing
)]
//! Integration tests for `file.managed` reconciliation.
//!
//! Tasks are declared in a YAML document, built through the registry and
//! executed through the router, so each test covers the full path from
//! declaration to file on disk.

mod common;

use common::{Workspace, context, serve_once};
use taskscript_cli::error::ExecError;
use taskscript_cli::executors::{Changes, ExecutionResult, ExecutorRouter};
use taskscript_cli::resources::encoding::Charset;
use taskscript_cli::tasks::Task;

/// The single task of the single script in `ws`.
fn only_task(ws: &Workspace) -> Task {
    let mut config = ws.load();
    assert_eq!(config.scripts.len(), 1);
    config.scripts.remove(0).tasks.remove(0)
}

fn execute(task: &Task) -> ExecutionResult {
    ExecutorRouter::with_default_executors()
        .execute(task, &context())
        .unwrap()
}

// ---------------------------------------------------------------------------
// Idempotence
// ---------------------------------------------------------------------------

#[test]
fn second_run_is_skipped_with_content_match() {
    let ws = Workspace::new().with_document(concat!(
        "motd:\n",
        "  file.managed:\n",
        "    - name: {root}/etc/motd\n",
        "    - makedirs: true\n",
        "    - contents: |\n",
        "        welcome\n",
        "        to the host\n",
    ));
    let task = only_task(&ws);

    let first = execute(&task);
    assert!(first.succeeded(), "{:?}", first.err);
    assert!(!first.is_skipped());
    assert!(first.changes.is_change());
    assert_eq!(ws.read("etc/motd"), "welcome\nto the host\n");

    let second = execute(&task);
    assert!(second.succeeded());
    let target = ws.path("etc/motd");
    assert_eq!(
        second.skip_reason.as_deref(),
        Some(
            format!(
                "file '{}' matched with the expected contents, will skip the execution",
                target.display()
            )
            .as_str()
        )
    );
    assert!(!second.changes.is_change());
}

#[test]
fn local_source_with_matching_hash_copies_once() {
    let ws = Workspace::new()
        .with_file("src/app.conf", b"port=80\n")
        .with_document(concat!(
            "app:\n",
            "  file.managed:\n",
            "    - name: {root}/app.conf\n",
            "    - source: {root}/src/app.conf\n",
            "    - source_hash: md5=16eace3cd5e757939f94c6cb42ba509c\n",
        ));
    let task = only_task(&ws);
    let first = execute(&task);
    assert!(first.succeeded(), "{:?}", first.err);
    assert_eq!(ws.read("app.conf"), "port=80\n");

    let second = execute(&task);
    assert!(second.is_skipped());
    assert!(
        second
            .skip_reason
            .as_deref()
            .unwrap()
            .starts_with("hash 'md5=16eace3cd5e757939f94c6cb42ba509c' matches the hash sum of file at"),
        "{:?}",
        second.skip_reason
    );
}

#[test]
fn creates_marker_skips() {
    let ws = Workspace::new()
        .with_file("installed.flag", b"")
        .with_document(concat!(
            "app:\n",
            "  file.managed:\n",
            "    - name: {root}/never\n",
            "    - contents: x\n",
            "    - creates: {root}/installed.flag\n",
        ));
    let result = execute(&only_task(&ws));
    assert!(result.is_skipped());
    assert!(!ws.exists("never"));
}

// ---------------------------------------------------------------------------
// Remote sources
// ---------------------------------------------------------------------------

const REMOTE_BODY: &[u8] = b"remote body\n";
const REMOTE_SHA256: &str = "2ab4cb18aa5528138e52d3a7c4ddb364929db99171bd95184913998cfcd5b379";

#[test]
fn remote_checksum_mismatch_leaves_target_untouched() {
    let (base, server) = serve_once(REMOTE_BODY);
    let ws = Workspace::new()
        .with_file("target.txt", b"original\n")
        .with_document(&format!(
            concat!(
                "fetch:\n",
                "  file.managed:\n",
                "    - name: {{root}}/target.txt\n",
                "    - source: {base}/payload\n",
                "    - source_hash: sha256={hash}\n",
            ),
            base = base,
            hash = "0".repeat(64),
        ));

    let result = execute(&only_task(&ws));
    server.join().unwrap();

    assert!(
        matches!(result.err, Some(ExecError::Verification(_))),
        "{:?}",
        result.err
    );
    assert_eq!(ws.read("target.txt"), "original\n");
    assert!(!ws.exists("target.txt_temp"));
}

#[test]
fn remote_source_with_matching_checksum_is_installed() {
    let (base, server) = serve_once(REMOTE_BODY);
    let ws = Workspace::new().with_document(&format!(
        concat!(
            "fetch:\n",
            "  file.managed:\n",
            "    - name: {{root}}/target.txt\n",
            "    - source: {base}/payload\n",
            "    - source_hash: sha256={hash}\n",
        ),
        base = base,
        hash = REMOTE_SHA256,
    ));

    let result = execute(&only_task(&ws));
    server.join().unwrap();

    assert!(result.succeeded(), "{:?}", result.err);
    assert_eq!(ws.read("target.txt"), "remote body\n");
    assert!(!ws.exists("target.txt_temp"));
    assert!(matches!(result.changes, Changes::File(ref f) if f.updated));
}

#[test]
fn unsupported_scheme_is_an_acquisition_error() {
    let ws = Workspace::new().with_document(concat!(
        "fetch:\n",
        "  file.managed:\n",
        "    - name: {root}/target.txt\n",
        "    - source: gopher://example.org/file\n",
        "    - source_hash: sha256=00\n",
    ));
    let result = execute(&only_task(&ws));
    assert!(
        matches!(result.err, Some(ExecError::Acquisition(ref m)) if m.contains("gopher")),
        "{:?}",
        result.err
    );
    assert!(!ws.exists("target.txt"));
}

// ---------------------------------------------------------------------------
// Encodings
// ---------------------------------------------------------------------------

#[test]
fn contents_are_written_in_requested_encoding() {
    let ws = Workspace::new().with_document(concat!(
        "legacy:\n",
        "  file.managed:\n",
        "    - name: {root}/latin1.txt\n",
        "    - contents: \"café\"\n",
        "    - encoding: windows1252\n",
    ));
    let task = only_task(&ws);
    assert!(execute(&task).succeeded());

    let bytes = std::fs::read(ws.path("latin1.txt")).unwrap();
    assert_eq!(bytes, b"caf\xe9");
    let charset = Charset::lookup("windows1252").unwrap();
    assert_eq!(charset.decode(&bytes).unwrap(), "café");
}

#[test]
fn unknown_encoding_fails_the_task() {
    let ws = Workspace::new().with_document(concat!(
        "legacy:\n",
        "  file.managed:\n",
        "    - name: {root}/x.txt\n",
        "    - contents: x\n",
        "    - encoding: ebcdic\n",
    ));
    let result = execute(&only_task(&ws));
    assert!(matches!(result.err, Some(ExecError::Encoding(_))), "{:?}", result.err);
    assert!(!ws.exists("x.txt"));
}

// ---------------------------------------------------------------------------
// Attributes
// ---------------------------------------------------------------------------

#[cfg(unix)]
#[test]
fn mode_is_applied_even_when_body_matches() {
    use std::os::unix::fs::PermissionsExt;

    let ws = Workspace::new()
        .with_file("script.sh", b"#!/bin/sh\n")
        .with_document(concat!(
            "perm:\n",
            "  file.managed:\n",
            "    - name: {root}/script.sh\n",
            "    - source: {root}/script.sh\n",
            "    - skip_verify: true\n",
            "    - mode: 755\n",
        ));
    let result = execute(&only_task(&ws));
    assert!(result.succeeded(), "{:?}", result.err);
    let mode = std::fs::metadata(ws.path("script.sh")).unwrap().permissions().mode();
    assert_eq!(mode & 0o777, 0o755);
}
