#![allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::wildcard_imports,
    clippy::indexing_slicing
)]
//! Integration tests for script ordering.
//!
//! Documents are loaded from disk, built through the default registry and
//! ordered by the scheduler, exactly as the `run` and `validate` commands
//! do.

mod common;

use common::Workspace;
use taskscript_cli::commands::scheduler::{SchedulePolicy, order};
use taskscript_cli::commands::validate::render_order;
use taskscript_cli::error::ScheduleError;

/// Script document with one `cmd.run` task per script.
fn document(scripts: &[(&str, &[&str])]) -> String {
    let mut out = String::new();
    for (id, require) in scripts {
        out.push_str(&format!("\"{id}\":\n  cmd.run:\n    - name: echo {id}\n"));
        if !require.is_empty() {
            out.push_str("    - require:\n");
            for r in *require {
                out.push_str(&format!("      - \"{r}\"\n"));
            }
        }
    }
    out
}

fn ordered_ids(scripts: &[(&str, &[&str])]) -> Vec<String> {
    let ws = Workspace::new().with_document(&document(scripts));
    let config = ws.load();
    order(config.scripts, SchedulePolicy::default())
        .unwrap()
        .into_iter()
        .map(|s| s.id)
        .collect()
}

#[test]
fn transitive_prerequisites_in_declaration_order() {
    let ids = ordered_ids(&[
        ("7", &["5", "6", "1"]),
        ("5", &[]),
        ("6", &[]),
        ("4", &[]),
        ("8", &["1"]),
        ("1", &[]),
        ("9", &[]),
    ]);
    assert_eq!(ids, ["5", "6", "1", "7", "4", "8", "9"]);
}

#[test]
fn leading_script_moves_behind_its_requirements() {
    let ids = ordered_ids(&[("1", &["2", "3"]), ("2", &[]), ("3", &[])]);
    assert_eq!(ids, ["2", "3", "1"]);
}

#[test]
fn duplicate_requirement_is_placed_once() {
    let ids = ordered_ids(&[("12", &["10", "10", "11"]), ("10", &["11"]), ("11", &[])]);
    assert_eq!(ids, ["11", "10", "12"]);
}

/// Every input script appears exactly once and after everything it requires.
#[test]
fn every_script_placed_once_after_its_requirements() {
    let input: &[(&str, &[&str])] = &[
        ("a", &["d", "c"]),
        ("b", &["a"]),
        ("c", &["d"]),
        ("d", &[]),
        ("e", &["b", "ghost"]),
    ];
    let ids = ordered_ids(input);
    assert_eq!(ids.len(), input.len());
    let position = |id: &str| ids.iter().position(|x| x == id).unwrap();
    for (id, require) in input {
        for r in *require {
            if *r != "ghost" {
                assert!(position(*r) < position(*id), "{r} must precede {id}: {ids:?}");
            }
        }
    }
}

#[test]
fn cycle_is_reported_with_its_path() {
    let ws = Workspace::new().with_document(&document(&[("a", &["b"]), ("b", &["a"])]));
    let err = order(ws.load().scripts, SchedulePolicy::default()).unwrap_err();
    assert_eq!(err, ScheduleError::Cycle(vec!["a".into(), "b".into(), "a".into()]));
}

#[test]
fn settings_can_make_unknown_requirements_fatal() {
    let ws = Workspace::new()
        .with_document(&document(&[("a", &["ghost"])]))
        .with_settings("unknown_requirements = \"error\"\n");
    let config = ws.load();
    let err = order(config.scripts, config.settings.schedule_policy()).unwrap_err();
    assert_eq!(err.to_string(), "script 'a' requires unknown script 'ghost'");
}

/// Snapshot of the `validate` listing for a small document.
#[test]
fn validate_listing() {
    let ws = Workspace::new().with_document(&document(&[("web", &["db"]), ("db", &[])]));
    let ordered = order(ws.load().scripts, SchedulePolicy::default()).unwrap();
    insta::assert_snapshot!(render_order(&ordered), @r"
    1. db
       - cmd.run 'echo db'
    2. web
       - cmd.run 'echo web'
    ");
}
