//! `file.managed`: a file's contents, source and attributes.
use super::TaskCommon;
use super::mapper::{FieldParser, FieldSpec, Mappable, Setter, Violations, non_empty};
use super::value::Value;
use crate::error::ValidationError;
use crate::resources::attributes::parse_mode;
use crate::resources::checksum::Checksum;
use crate::resources::location::Location;

/// Declared `file.managed` task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileManagedTask {
    /// Shared attributes.
    pub common: TaskCommon,
    /// Target file.
    pub name: String,
    /// Where the content comes from.
    pub source: Option<Location>,
    /// Expected checksum of the source (and of the finished target).
    pub source_hash: Option<Checksum>,
    /// Literal content. `Some("")` is valid empty content.
    pub contents: Option<String>,
    /// Create missing parent directories.
    pub makedirs: bool,
    /// Rewrite an existing file's body. Attributes are applied regardless.
    pub replace: bool,
    /// Do not verify a local source against `source_hash`.
    pub skip_verify: bool,
    /// Accept any TLS certificate for HTTPS sources.
    pub skip_tls_verify: bool,
    /// Owner.
    pub user: Option<String>,
    /// Group.
    pub group: Option<String>,
    /// Permission bits.
    pub mode: Option<u32>,
    /// Character set for `contents`.
    pub encoding: Option<String>,
}

impl FileManagedTask {
    /// Empty task of `type_name` at `path`.
    #[must_use]
    pub fn new(type_name: &str, path: &str) -> Self {
        Self {
            common: TaskCommon::new(type_name, path),
            name: String::new(),
            source: None,
            source_hash: None,
            contents: None,
            makedirs: false,
            replace: true,
            skip_verify: false,
            skip_tls_verify: false,
            user: None,
            group: None,
            mode: None,
            encoding: None,
        }
    }
}

fn parse_source(task: &mut FileManagedTask, _path: &str, value: &Value) -> Result<(), String> {
    let raw = value.to_text().map_err(|e| e.to_string())?;
    task.source = if raw.trim().is_empty() {
        None
    } else {
        Some(Location::parse(raw.trim())?)
    };
    Ok(())
}

fn parse_source_hash(task: &mut FileManagedTask, _path: &str, value: &Value) -> Result<(), String> {
    let raw = value.to_text().map_err(|e| e.to_string())?;
    task.source_hash = if raw.trim().is_empty() {
        None
    } else {
        Some(Checksum::parse(raw.trim()).map_err(|e| e.to_string())?)
    };
    Ok(())
}

fn parse_contents(task: &mut FileManagedTask, _path: &str, value: &Value) -> Result<(), String> {
    task.contents = match value {
        Value::Null => None,
        Value::List(lines) => Some(
            lines
                .iter()
                .map(Value::to_text)
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| e.to_string())?
                .join("\n"),
        ),
        other => Some(other.to_text().map_err(|e| e.to_string())?),
    };
    Ok(())
}

fn parse_file_mode(task: &mut FileManagedTask, _path: &str, value: &Value) -> Result<(), String> {
    task.mode = match value {
        Value::Null => None,
        Value::Int(i) => Some(mode_from_int(*i)?),
        Value::Str(s) if s.trim().is_empty() => None,
        Value::Str(s) => Some(parse_mode(s)?),
        other => return Err(format!("invalid file mode value '{other}'")),
    };
    Ok(())
}

/// YAML reads `0755` as the integer 755 and `0o755` as 493. An integer
/// whose decimal digits are all octal is read as octal; any other integer
/// is already the numeric mode.
fn mode_from_int(i: i64) -> Result<u32, String> {
    let digits = i.to_string();
    if digits.bytes().all(|b| (b'0'..=b'7').contains(&b)) {
        return parse_mode(&digits);
    }
    u32::try_from(i)
        .ok()
        .filter(|m| *m <= 0o7777)
        .ok_or_else(|| format!("invalid file mode value '{i}'"))
}

impl Mappable for FileManagedTask {
    const FIELDS: &'static [FieldSpec<Self>] = &[
        FieldSpec {
            key: "name",
            setter: Setter::Str(|t, v| t.name = v),
        },
        FieldSpec {
            key: "makedirs",
            setter: Setter::Bool(|t, v| t.makedirs = v),
        },
        FieldSpec {
            key: "replace",
            setter: Setter::Bool(|t, v| t.replace = v),
        },
        FieldSpec {
            key: "skip_verify",
            setter: Setter::Bool(|t, v| t.skip_verify = v),
        },
        FieldSpec {
            key: "skip_tls_verify",
            setter: Setter::Bool(|t, v| t.skip_tls_verify = v),
        },
        FieldSpec {
            key: "user",
            setter: Setter::Str(|t, v| t.user = non_empty(v)),
        },
        FieldSpec {
            key: "group",
            setter: Setter::Str(|t, v| t.group = non_empty(v)),
        },
        FieldSpec {
            key: "encoding",
            setter: Setter::Str(|t, v| t.encoding = non_empty(v)),
        },
    ];

    const PARSERS: &'static [(&'static str, FieldParser<Self>)] = &[
        ("source", parse_source),
        ("source_hash", parse_source_hash),
        ("contents", parse_contents),
        ("mode", parse_file_mode),
    ];

    fn common_mut(&mut self) -> &mut TaskCommon {
        &mut self.common
    }

    fn validate(&self) -> Result<(), ValidationError> {
        let path = &self.common.path;
        let mut v = Violations::default();
        v.require(&self.name, path, "name");
        if let Some(source) = self.source.as_ref().filter(|s| s.is_url())
            && self.source_hash.is_none()
        {
            v.add(format!(
                "empty 'source_hash' field at path '{path}.source_hash' for remote url source '{}'",
                source.raw()
            ));
        }
        if self.source.is_none() && self.contents.is_none() {
            v.add(format!(
                "either content or source should be provided for the task at path '{path}'"
            ));
        }
        v.finish()
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::error::BuildError;
    use crate::tasks::mapper::build_task;

    const PATH: &str = "site.file.managed";

    fn build(decls: Vec<(&str, Value)>) -> Result<FileManagedTask, BuildError> {
        let decls: Vec<_> = decls.into_iter().map(|(k, v)| (k.to_string(), v)).collect();
        build_task(FileManagedTask::new("file.managed", PATH), PATH, &decls)
    }

    #[test]
    fn builds_full_declaration() {
        let t = build(vec![
            ("name", Value::from("/etc/app.conf")),
            ("source", Value::from("https://example.com/app.conf")),
            ("source_hash", Value::from("md5=5e4fe0155703dde467f3ab234e6f966f")),
            ("makedirs", Value::from(true)),
            ("replace", Value::from("false")),
            ("user", Value::from("root")),
            ("group", Value::from("wheel")),
            ("mode", Value::Int(644)),
            ("encoding", Value::from("utf8")),
            ("require", Value::from("base")),
        ])
        .unwrap();
        assert_eq!(t.name, "/etc/app.conf");
        assert!(t.source.as_ref().unwrap().is_url());
        assert_eq!(
            t.source_hash.as_ref().unwrap().declared(),
            "md5=5e4fe0155703dde467f3ab234e6f966f"
        );
        assert!(t.makedirs);
        assert!(!t.replace);
        assert_eq!(t.mode, Some(0o644));
        assert_eq!(t.common.require, vec!["base"]);
    }

    #[test]
    fn replace_defaults_to_true() {
        let t = build(vec![
            ("name", Value::from("/tmp/x")),
            ("contents", Value::from("x")),
        ])
        .unwrap();
        assert!(t.replace);
    }

    #[test]
    fn empty_contents_are_valid() {
        let t = build(vec![
            ("name", Value::from("/tmp/x")),
            ("contents", Value::from("")),
        ])
        .unwrap();
        assert_eq!(t.contents.as_deref(), Some(""));
    }

    #[test]
    fn contents_list_joins_lines() {
        let t = build(vec![
            ("name", Value::from("/tmp/x")),
            (
                "contents",
                Value::List(vec![Value::from("one"), Value::from("two")]),
            ),
        ])
        .unwrap();
        assert_eq!(t.contents.as_deref(), Some("one\ntwo"));
    }

    #[test]
    fn null_contents_without_source_fails() {
        let err = build(vec![
            ("name", Value::from("/tmp/x")),
            ("contents", Value::Null),
        ])
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "either content or source should be provided for the task at path 'site.file.managed'"
        );
    }

    #[test]
    fn url_source_requires_hash() {
        let err = build(vec![
            ("name", Value::from("/tmp/x")),
            ("source", Value::from("ftp://example.com/x")),
        ])
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "empty 'source_hash' field at path 'site.file.managed.source_hash' \
             for remote url source 'ftp://example.com/x'"
        );
    }

    #[test]
    fn missing_name_reported_with_other_violations() {
        let err = build(vec![]).unwrap_err();
        assert!(matches!(&err, BuildError::Validation(v) if v.messages.len() == 2));
        assert!(
            err.to_string()
                .starts_with("empty required value at path 'site.file.managed.name'; "),
            "{err}"
        );
    }

    #[test]
    fn two_invalid_fields_are_reported_together() {
        let err = build(vec![
            ("name", Value::from("/tmp/x")),
            ("mode", Value::from("rw-r--r--")),
            ("makedirs", Value::from("perhaps")),
        ])
        .unwrap_err();
        assert!(matches!(&err, BuildError::Fields(errs) if errs.len() == 2), "{err}");
        let text = err.to_string();
        assert!(text.contains("invalid file mode value 'rw-r--r--'"), "{text}");
        assert!(text.contains("site.file.managed.makedirs"), "{text}");
    }

    #[test]
    fn mode_accepts_yaml_integer_forms() {
        let mode = |v: Value| {
            build(vec![
                ("name", Value::from("/tmp/x")),
                ("contents", Value::from("x")),
                ("mode", v),
            ])
            .map(|t| t.mode)
        };
        // `0755` and `644` arrive as decimal digits, `0o755` as its value.
        assert_eq!(mode(Value::Int(755)).unwrap(), Some(0o755));
        assert_eq!(mode(Value::Int(0o755)).unwrap(), Some(0o755));
        assert_eq!(mode(Value::from("0755")).unwrap(), Some(0o755));
        assert_eq!(mode(Value::Int(644)).unwrap(), Some(0o644));
        assert!(mode(Value::Int(0o17777)).is_err());
        assert!(mode(Value::Int(-1)).is_err());
    }

    #[test]
    fn unknown_hash_algorithm_is_a_field_error() {
        let err = build(vec![
            ("name", Value::from("/tmp/x")),
            ("source", Value::from("/src")),
            ("source_hash", Value::from("crc32=abcd")),
        ])
        .unwrap_err();
        assert!(
            err.to_string()
                .contains("unknown hash algorithm 'crc32' in 'crc32=abcd'"),
            "{err}"
        );
    }
}
