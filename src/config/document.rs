//! YAML script documents.
//!
//! ```yaml
//! web:                        # script id
//!   file.managed:             # task type
//!     - name: /etc/app.conf   # declarations, in order
//!     - contents: "port=80"
//!     - require:
//!       - base
//! ```
//!
//! Key order is preserved and becomes declaration order. Each task's
//! source-location label is `<script-id>.<task-type>`.
use std::collections::HashSet;
use std::path::Path;

use serde_yaml::Value as Yaml;

use crate::error::ConfigError;
use crate::tasks::Value;

/// One task as declared, before it is built.
#[derive(Debug, Clone, PartialEq)]
pub struct RawTask {
    /// Task type name.
    pub type_name: String,
    /// Source-location label.
    pub path: String,
    /// `(key, value)` pairs in document order.
    pub declarations: Vec<(String, Value)>,
}

/// One script as declared.
#[derive(Debug, Clone, PartialEq)]
pub struct RawScript {
    /// Script id.
    pub id: String,
    /// Tasks in document order.
    pub tasks: Vec<RawTask>,
}

fn invalid(location: impl Into<String>, message: impl Into<String>) -> ConfigError {
    ConfigError::InvalidDocument {
        location: location.into(),
        message: message.into(),
    }
}

fn kind_of(value: &Yaml) -> &'static str {
    match value {
        Yaml::Null => "null",
        Yaml::Bool(_) => "a boolean",
        Yaml::Number(_) => "a number",
        Yaml::String(_) => "a string",
        Yaml::Sequence(_) => "a sequence",
        Yaml::Mapping(_) => "a mapping",
        Yaml::Tagged(_) => "a tagged value",
    }
}

/// Scalar keys as text; `8:` and `"8":` name the same script.
fn key_text(key: &Yaml) -> Option<String> {
    match key {
        Yaml::String(s) => Some(s.clone()),
        Yaml::Number(n) => Some(n.to_string()),
        Yaml::Bool(b) => Some(b.to_string()),
        Yaml::Tagged(tagged) => key_text(&tagged.value),
        _ => None,
    }
}

fn convert(value: Yaml) -> Value {
    match value {
        Yaml::Null => Value::Null,
        Yaml::Bool(b) => Value::Bool(b),
        Yaml::Number(n) => n.as_i64().map_or_else(
            || n.as_f64().map_or_else(|| Value::Str(n.to_string()), Value::Float),
            Value::Int,
        ),
        Yaml::String(s) => Value::Str(s),
        Yaml::Sequence(items) => Value::List(items.into_iter().map(convert).collect()),
        Yaml::Mapping(map) => Value::Map(
            map.into_iter()
                .map(|(k, v)| (key_text(&k).unwrap_or_default(), convert(v)))
                .collect(),
        ),
        Yaml::Tagged(tagged) => convert(tagged.value),
    }
}

fn declarations(path: &str, body: Yaml) -> Result<Vec<(String, Value)>, ConfigError> {
    let items = match body {
        Yaml::Null => return Ok(Vec::new()),
        Yaml::Sequence(items) => items,
        other => {
            return Err(invalid(
                path,
                format!("expected a sequence of declarations, found {}", kind_of(&other)),
            ));
        }
    };
    let mut out = Vec::with_capacity(items.len());
    for (i, item) in items.into_iter().enumerate() {
        let location = format!("{path}[{i}]");
        let Yaml::Mapping(map) = item else {
            return Err(invalid(
                location,
                format!("expected a single-key mapping, found {}", kind_of(&item)),
            ));
        };
        if map.len() != 1 {
            return Err(invalid(
                location,
                format!("expected a single-key mapping, found {} keys", map.len()),
            ));
        }
        for (key, value) in map {
            let key = key_text(&key)
                .ok_or_else(|| invalid(location.clone(), "declaration key must be a scalar"))?;
            out.push((key, convert(value)));
        }
    }
    Ok(out)
}

fn script(id: String, body: Yaml) -> Result<RawScript, ConfigError> {
    let Yaml::Mapping(map) = body else {
        return Err(invalid(
            id,
            format!("expected a mapping of task types, found {}", kind_of(&body)),
        ));
    };
    let mut tasks = Vec::with_capacity(map.len());
    for (key, body) in map {
        let Yaml::String(type_name) = key else {
            return Err(invalid(id, "task type must be a string"));
        };
        let path = format!("{id}.{type_name}");
        tasks.push(RawTask {
            declarations: declarations(&path, body)?,
            type_name,
            path,
        });
    }
    Ok(RawScript { id, tasks })
}

/// Parse document text. `origin` is only used in error messages.
///
/// # Errors
///
/// Returns [`ConfigError::Yaml`] for malformed YAML,
/// [`ConfigError::InvalidDocument`] for a wrong shape and
/// [`ConfigError::DuplicateScript`] when two script ids collide.
pub fn parse_document(text: &str, origin: &Path) -> Result<Vec<RawScript>, ConfigError> {
    let root: Yaml = serde_yaml::from_str(text).map_err(|source| ConfigError::Yaml {
        path: origin.to_path_buf(),
        source,
    })?;
    let map = match root {
        Yaml::Null => return Ok(Vec::new()),
        Yaml::Mapping(map) => map,
        other => {
            return Err(invalid(
                "<root>",
                format!("expected a mapping of script ids, found {}", kind_of(&other)),
            ));
        }
    };

    let mut seen = HashSet::new();
    let mut scripts = Vec::with_capacity(map.len());
    for (key, body) in map {
        let id = key_text(&key)
            .ok_or_else(|| invalid("<root>", "script id must be a scalar"))?;
        if !seen.insert(id.clone()) {
            return Err(ConfigError::DuplicateScript(id));
        }
        scripts.push(script(id, body)?);
    }
    Ok(scripts)
}

/// Read and parse the document at `path`.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] if the file cannot be read, otherwise the
/// errors of [`parse_document`].
pub fn load_document(path: &Path) -> Result<Vec<RawScript>, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_document(&text, path)
}
