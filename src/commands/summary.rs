//! Run summary document.
//!
//! Rendered to stdout after every run, including failed and aborted ones:
//!
//! ```yaml
//! Summary:
//!   Config: site.yaml
//!   Succeeded: 2
//!   Failed: 0
//!   Changes: 1
//!   TotalFunctionsRun: 2
//!   TotalRunTime: 4.21ms
//! Results:
//! - ID: web
//!   Function: cmd.run
//!   Name: systemctl reload nginx
//!   Result: true
//!   Comment: Command "systemctl reload nginx" run
//!   Started: 14:03:07.120391
//!   Duration: 3.9ms
//!   Changes:
//!     pid: '4121'
//!     retcode: '0'
//!     stderr: ''
//!     stdout: 
//! ```
use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Local};
use serde::{Serialize, Serializer};

use crate::config::settings::OutputFormat;
use crate::executors::ExecutionResult;
use crate::tasks::Task;

/// Aggregate counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Totals {
    /// Script document the run was loaded from.
    pub config: String,
    /// Tasks that succeeded or were skipped.
    pub succeeded: usize,
    /// Tasks that returned an error.
    pub failed: usize,
    /// Tasks that modified the system.
    pub changes: usize,
    /// Tasks executed.
    pub total_functions_run: usize,
    /// Wall time of the whole run.
    #[serde(serialize_with = "serialize_duration")]
    pub total_run_time: Duration,
}

/// Outcome of one task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct TaskRecord {
    /// Owning script.
    #[serde(rename = "ID")]
    pub id: String,
    /// Task type name.
    pub function: String,
    /// Task label.
    pub name: String,
    /// `true` unless the task failed.
    pub result: bool,
    /// Human-readable outcome, including the error when it failed.
    pub comment: String,
    /// Local wall-clock start, `HH:MM:SS.ffffff`.
    pub started: String,
    /// Executor time.
    #[serde(serialize_with = "serialize_duration")]
    pub duration: Duration,
    /// Flattened change record.
    pub changes: BTreeMap<String, String>,
}

impl TaskRecord {
    /// Record `result` of `task` in script `script_id`.
    #[must_use]
    pub fn new(
        script_id: &str,
        task: &Task,
        result: &ExecutionResult,
        started: DateTime<Local>,
    ) -> Self {
        let comment = match &result.err {
            Some(err) if result.comment.is_empty() => err.to_string(),
            Some(err) => format!("{}: {err}", result.comment),
            None => result.comment.clone(),
        };
        Self {
            id: script_id.to_string(),
            function: task.type_name().to_string(),
            name: task.display_name(),
            result: result.succeeded(),
            comment,
            started: started.format("%H:%M:%S%.6f").to_string(),
            duration: result.duration,
            changes: result.changes.to_map(),
        }
    }
}

/// The full summary document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct RunSummary {
    /// Counters.
    pub summary: Totals,
    /// Per-task records in execution order.
    pub results: Vec<TaskRecord>,
}

impl RunSummary {
    /// Empty summary for the document at `config`.
    #[must_use]
    pub fn new(config: impl Into<String>) -> Self {
        Self {
            summary: Totals {
                config: config.into(),
                ..Totals::default()
            },
            results: Vec::new(),
        }
    }

    /// Append a record and update the counters.
    pub fn record(&mut self, record: TaskRecord, changed: bool) {
        if record.result {
            self.summary.succeeded += 1;
        } else {
            self.summary.failed += 1;
        }
        if changed {
            self.summary.changes += 1;
        }
        self.summary.total_functions_run += 1;
        self.results.push(record);
    }

    /// `true` if any recorded task failed.
    #[must_use]
    pub const fn has_failures(&self) -> bool {
        self.summary.failed > 0
    }

    /// Render in the requested format.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn render(&self, format: OutputFormat) -> anyhow::Result<String> {
        Ok(match format {
            OutputFormat::Yaml => serde_yaml::to_string(self)?,
            OutputFormat::Json => {
                let mut out = serde_json::to_string_pretty(self)?;
                out.push('\n');
                out
            }
        })
    }
}

fn serialize_duration<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&human_duration(*d))
}

/// `value / unit` with up to `digits` fractional digits, trailing zeros
/// trimmed.
fn decimal(value: u128, unit: u128, digits: usize, suffix: &str) -> String {
    let whole = value / unit;
    let frac = value % unit;
    if frac == 0 {
        return format!("{whole}{suffix}");
    }
    let frac = format!("{frac:0digits$}");
    format!("{whole}.{}{suffix}", frac.trim_end_matches('0'))
}

/// Short human-readable duration: `350ns`, `12.5µs`, `1.2ms`, `2.05s`,
/// `1m30s`, `2h0m5.5s`.
#[must_use]
pub fn human_duration(d: Duration) -> String {
    let nanos = d.as_nanos();
    match nanos {
        0 => "0s".to_string(),
        1..1_000 => format!("{nanos}ns"),
        1_000..1_000_000 => decimal(nanos, 1_000, 3, "µs"),
        1_000_000..1_000_000_000 => decimal(nanos, 1_000_000, 6, "ms"),
        _ => {
            let secs = d.as_secs();
            let (hours, minutes) = (secs / 3600, secs / 60 % 60);
            let mut out = String::new();
            if hours > 0 {
                out.push_str(&format!("{hours}h"));
            }
            if hours > 0 || minutes > 0 {
                out.push_str(&format!("{minutes}m"));
            }
            let rest = u128::from(secs % 60) * 1_000_000_000 + u128::from(d.subsec_nanos());
            out.push_str(&decimal(rest, 1_000_000_000, 9, "s"));
            out
        }
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::error::ExecError;
    use crate::executors::{Changes, CommandChanges};
    use crate::tasks::{CMD_RUN, CmdRunTask};

    fn task() -> Task {
        let mut t = CmdRunTask::new(CMD_RUN, "web.cmd.run");
        t.name = Some("echo hi".into());
        Task::CmdRun(t)
    }

    fn started() -> DateTime<Local> {
        Local
            .with_ymd_and_hms(2024, 5, 1, 14, 3, 7)
            .unwrap()
            .checked_add_signed(chrono::TimeDelta::microseconds(120_391))
            .unwrap()
    }

    #[test]
    fn durations_are_compact() {
        assert_eq!(human_duration(Duration::ZERO), "0s");
        assert_eq!(human_duration(Duration::from_nanos(350)), "350ns");
        assert_eq!(human_duration(Duration::from_nanos(12_500)), "12.5µs");
        assert_eq!(human_duration(Duration::from_micros(1_200)), "1.2ms");
        assert_eq!(human_duration(Duration::from_millis(2_050)), "2.05s");
        assert_eq!(human_duration(Duration::from_secs(90)), "1m30s");
        assert_eq!(human_duration(Duration::from_millis(7_205_500)), "2h0m5.5s");
    }

    #[test]
    fn record_carries_error_in_comment() {
        let result = ExecutionResult {
            comment: "Command \"false\" run".into(),
            ..ExecutionResult::failed(ExecError::Command {
                command: "false".into(),
                exit_code: 1,
                stderr: String::new(),
            })
        };
        let record = TaskRecord::new("web", &task(), &result, started());
        assert!(!record.result);
        assert_eq!(
            record.comment,
            "Command \"false\" run: command 'false' failed (exit 1): "
        );
        assert_eq!(record.started, "14:03:07.120391");
    }

    #[test]
    fn counters_follow_records() {
        let mut summary = RunSummary::new("site.yaml");
        let ok = ExecutionResult::default().with_comment("done");
        let bad = ExecutionResult::failed(ExecError::Cancelled);
        summary.record(TaskRecord::new("a", &task(), &ok, started()), true);
        summary.record(TaskRecord::new("a", &task(), &bad, started()), false);
        assert_eq!(summary.summary.succeeded, 1);
        assert_eq!(summary.summary.failed, 1);
        assert_eq!(summary.summary.changes, 1);
        assert_eq!(summary.summary.total_functions_run, 2);
        assert!(summary.has_failures());
    }

    #[test]
    fn yaml_uses_pascal_case_keys() {
        let mut summary = RunSummary::new("site.yaml");
        let result = ExecutionResult {
            comment: "Command \"echo hi\" run".into(),
            duration: Duration::from_micros(3_900),
            changes: Changes::Command(CommandChanges {
                pid: Some(4121),
                retcode: Some(0),
                stdout: "hi".into(),
                stderr: String::new(),
            }),
            ..ExecutionResult::default()
        };
        summary.record(TaskRecord::new("web", &task(), &result, started()), true);
        summary.summary.total_run_time = Duration::from_micros(4_210);

        insta::assert_snapshot!(summary.render(OutputFormat::Yaml).unwrap(), @r#"
        Summary:
          Config: site.yaml
          Succeeded: 1
          Failed: 0
          Changes: 1
          TotalFunctionsRun: 1
          TotalRunTime: 4.21ms
        Results:
        - ID: web
          Function: cmd.run
          Name: echo hi
          Result: true
          Comment: Command "echo hi" run
          Started: 14:03:07.120391
          Duration: 3.9ms
          Changes:
            pid: '4121'
            retcode: '0'
            stderr: ''
            stdout: hi
        "#);
    }

    #[test]
    fn json_is_pretty_with_trailing_newline() {
        let out = RunSummary::new("x.yaml").render(OutputFormat::Json).unwrap();
        assert!(out.starts_with("{\n  \"Summary\": {\n    \"Config\": \"x.yaml\""));
        assert!(out.ends_with("}\n"));
    }
}
