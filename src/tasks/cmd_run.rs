//! `cmd.run`: run one or more shell commands.
use std::path::PathBuf;

use super::TaskCommon;
use super::mapper::{FieldParser, FieldSpec, Mappable, Setter, Violations, non_empty};
use super::value::Value;
use crate::error::ValidationError;

/// Declared `cmd.run` task.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CmdRunTask {
    /// Shared attributes.
    pub common: TaskCommon,
    /// Single command (`name`).
    pub name: Option<String>,
    /// Additional commands (`names`).
    pub names: Vec<String>,
    /// Working directory.
    pub cwd: Option<PathBuf>,
    /// User to run as.
    pub user: Option<String>,
    /// Extra environment, in declaration order.
    pub env: Vec<(String, String)>,
    /// Stop the run after this script if the task fails.
    pub abort_on_error: bool,
}

impl CmdRunTask {
    /// Empty task of `type_name` at `path`.
    #[must_use]
    pub fn new(type_name: &str, path: &str) -> Self {
        Self {
            common: TaskCommon::new(type_name, path),
            ..Self::default()
        }
    }

    /// `name` followed by `names`.
    #[must_use]
    pub fn commands(&self) -> Vec<&str> {
        self.name
            .iter()
            .chain(&self.names)
            .map(String::as_str)
            .filter(|c| !c.trim().is_empty())
            .collect()
    }
}

fn env_pair(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((k, v)) if !k.trim().is_empty() => Ok((k.trim().to_string(), v.to_string())),
        _ => Err(format!("invalid env entry '{raw}', expected KEY=VALUE")),
    }
}

fn map_pair(key: &str, value: &Value) -> Result<(String, String), String> {
    value
        .to_text()
        .map(|v| (key.to_string(), v))
        .map_err(|e| e.to_string())
}

/// `env` accepts `KEY=VALUE` strings, single-key mappings, or one mapping.
fn parse_env(task: &mut CmdRunTask, _path: &str, value: &Value) -> Result<(), String> {
    let mut env = Vec::new();
    match value {
        Value::Str(s) => env.push(env_pair(s)?),
        Value::Map(entries) => {
            for (k, v) in entries {
                env.push(map_pair(k, v)?);
            }
        }
        Value::List(items) => {
            for item in items {
                match item {
                    Value::Str(s) => env.push(env_pair(s)?),
                    Value::Map(entries) => {
                        for (k, v) in entries {
                            env.push(map_pair(k, v)?);
                        }
                    }
                    other => {
                        return Err(format!("invalid env entry {}", other.describe()));
                    }
                }
            }
        }
        Value::Null => {}
        other => return Err(format!("invalid env value {}", other.describe())),
    }
    task.env = env;
    Ok(())
}

impl Mappable for CmdRunTask {
    const FIELDS: &'static [FieldSpec<Self>] = &[
        FieldSpec {
            key: "name",
            setter: Setter::Str(|t, v| t.name = non_empty(v)),
        },
        FieldSpec {
            key: "names",
            setter: Setter::List(|t, v| t.names = v),
        },
        FieldSpec {
            key: "cwd",
            setter: Setter::Str(|t, v| t.cwd = non_empty(v).map(PathBuf::from)),
        },
        FieldSpec {
            key: "user",
            setter: Setter::Str(|t, v| t.user = non_empty(v)),
        },
        FieldSpec {
            key: "abort_on_error",
            setter: Setter::Bool(|t, v| t.abort_on_error = v),
        },
    ];

    const PARSERS: &'static [(&'static str, FieldParser<Self>)] = &[("env", parse_env)];

    fn common_mut(&mut self) -> &mut TaskCommon {
        &mut self.common
    }

    fn validate(&self) -> Result<(), ValidationError> {
        let mut v = Violations::default();
        if self.commands().is_empty() {
            v.add(format!(
                "empty required values at path '{0}.name' or '{0}.names'",
                self.common.path
            ));
        }
        v.finish()
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::tasks::mapper::build_task;

    fn build(decls: Vec<(&str, Value)>) -> Result<CmdRunTask, crate::error::BuildError> {
        let decls: Vec<_> = decls.into_iter().map(|(k, v)| (k.to_string(), v)).collect();
        build_task(CmdRunTask::new("cmd.run", "s.cmd.run"), "s.cmd.run", &decls)
    }

    #[test]
    fn name_and_names_are_combined() {
        let t = build(vec![
            ("name", Value::from("echo 1")),
            (
                "names",
                Value::List(vec![Value::from("echo 2"), Value::from("echo 3")]),
            ),
            ("cwd", Value::from("/tmp")),
            ("abort_on_error", Value::from(true)),
        ])
        .unwrap();
        assert_eq!(t.commands(), vec!["echo 1", "echo 2", "echo 3"]);
        assert_eq!(t.cwd, Some(PathBuf::from("/tmp")));
        assert!(t.abort_on_error);
    }

    #[test]
    fn env_accepts_pairs_and_maps() {
        let t = build(vec![
            ("name", Value::from("env")),
            (
                "env",
                Value::List(vec![
                    Value::from("A=1"),
                    Value::Map(vec![("B".into(), Value::Int(2))]),
                ]),
            ),
        ])
        .unwrap();
        assert_eq!(
            t.env,
            vec![("A".into(), "1".into()), ("B".into(), "2".into())]
        );
    }

    #[test]
    fn env_rejects_entry_without_separator() {
        let err = build(vec![
            ("name", Value::from("env")),
            ("env", Value::from("NOPE")),
        ])
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid env entry 'NOPE', expected KEY=VALUE at path 's.cmd.run.env'"
        );
    }

    #[test]
    fn missing_command_fails_validation() {
        let err = build(vec![("cwd", Value::from("/tmp"))]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "empty required values at path 's.cmd.run.name' or 's.cmd.run.names'"
        );
    }
}
