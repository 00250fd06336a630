//! Declarative mapping of raw `(key, value)` declarations onto typed tasks.
//!
//! Each task kind publishes a static table of [`FieldSpec`]s (key plus typed
//! setter) and an optional table of custom parsers for composite fields.
//! [`map_fields`] walks the declarations in document order, coerces each
//! value to the setter's type, consults the kind's [`FieldStatusTracker`]
//! for change fields, and collects every failure into one [`FieldErrors`].
use crate::error::{BuildError, FieldError, FieldErrors, FieldReason, TypeError, ValidationError};

use super::TaskCommon;
use super::tracker::FieldStatusTracker;
use super::value::Value;

/// Declaration keys shared by every task kind. Never tracked.
pub const SHARED_FIELDS: &[&str] = &[
    "name", "names", "require", "creates", "onlyif", "unless", "shell",
];

/// Typed setter for one directly mapped field.
pub enum Setter<T> {
    /// Converted with [`Value::to_bool`].
    Bool(fn(&mut T, bool)),
    /// Converted with [`Value::to_text`].
    Str(fn(&mut T, String)),
    /// Converted with [`Value::to_int`].
    Int(fn(&mut T, i64)),
    /// Converted with [`Value::to_string_list`].
    List(fn(&mut T, Vec<String>)),
}

impl<T> std::fmt::Debug for Setter<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self {
            Self::Bool(_) => "bool",
            Self::Str(_) => "string",
            Self::Int(_) => "int",
            Self::List(_) => "list",
        };
        write!(f, "Setter({kind})")
    }
}

impl<T> Setter<T> {
    fn apply(&self, target: &mut T, value: &Value) -> Result<(), TypeError> {
        match self {
            Self::Bool(set) => set(target, value.to_bool()?),
            Self::Str(set) => set(target, value.to_text()?),
            Self::Int(set) => set(target, value.to_int()?),
            Self::List(set) => set(target, value.to_string_list()?),
        }
        Ok(())
    }
}

/// Association of a declaration key with its setter.
#[derive(Debug)]
pub struct FieldSpec<T> {
    /// Declaration key, as written in the document.
    pub key: &'static str,
    /// Converts and stores the value.
    pub setter: Setter<T>,
}

/// Custom parser for a composite field: `(task, path, raw value)`.
///
/// The returned message is wrapped into a [`FieldError`] naming the key.
pub type FieldParser<T> = fn(&mut T, &str, &Value) -> Result<(), String>;

/// A task kind that can be populated by [`map_fields`].
pub trait Mappable: Sized + 'static {
    /// Directly mapped fields.
    const FIELDS: &'static [FieldSpec<Self>];

    /// Keys handled by custom parsers.
    const PARSERS: &'static [(&'static str, FieldParser<Self>)] = &[];

    /// Attributes common to every kind.
    fn common_mut(&mut self) -> &mut TaskCommon;

    /// The kind's change tracker, for kinds that patch state field by field.
    fn tracker_mut(&mut self) -> Option<&mut FieldStatusTracker> {
        None
    }

    /// Cross-field validation run after a successful mapping pass.
    ///
    /// # Errors
    ///
    /// Returns every violated rule in one [`ValidationError`].
    fn validate(&self) -> Result<(), ValidationError>;
}

const COMMON_FIELDS: &[FieldSpec<TaskCommon>] = &[
    FieldSpec {
        key: "require",
        setter: Setter::List(|c, v| c.require = v),
    },
    FieldSpec {
        key: "creates",
        setter: Setter::List(|c, v| c.creates = v),
    },
    FieldSpec {
        key: "onlyif",
        setter: Setter::List(|c, v| c.onlyif = v),
    },
    FieldSpec {
        key: "unless",
        setter: Setter::List(|c, v| c.unless = v),
    },
    FieldSpec {
        key: "shell",
        setter: Setter::Str(|c, v| c.shell = non_empty(v)),
    },
];

/// `None` for an empty string.
#[must_use]
pub fn non_empty(s: String) -> Option<String> {
    if s.is_empty() { None } else { Some(s) }
}

fn is_shared(key: &str) -> bool {
    SHARED_FIELDS.contains(&key)
}

/// Map a directly declared field, honouring the unset sentinel for tracked
/// change fields.
fn apply_direct<T: Mappable>(
    task: &mut T,
    spec: &FieldSpec<T>,
    value: &Value,
) -> Result<(), FieldReason> {
    let key = spec.key;
    let tracked = match task.tracker_mut() {
        Some(tracker) => {
            tracker.set_field_status(key);
            !is_shared(key) && tracker.is_change_field(key)
        }
        None => false,
    };

    if tracked && value.is_unset_sentinel() {
        if let Some(tracker) = task.tracker_mut() {
            tracker.set_clear(key)?;
        }
        return Ok(());
    }

    spec.setter.apply(task, value)?;

    if tracked && let Some(tracker) = task.tracker_mut() {
        tracker.set_has_new_value(key)?;
    }
    Ok(())
}

/// Populate `task` from `declarations`, collecting every field failure.
///
/// Unknown keys are ignored so documents written for newer versions still
/// load.
///
/// # Errors
///
/// Returns all field failures, each annotated with its key and `path`.
pub fn map_fields<T: Mappable>(
    task: &mut T,
    path: &str,
    declarations: &[(String, Value)],
) -> Result<(), FieldErrors> {
    let mut errors = FieldErrors::default();

    for (key, value) in declarations {
        let key_str = key.as_str();
        let outcome = if let Some(spec) = T::FIELDS.iter().find(|f| f.key == key_str) {
            apply_direct(task, spec, value)
        } else if let Some(spec) = COMMON_FIELDS.iter().find(|f| f.key == key_str) {
            spec.setter
                .apply(task.common_mut(), value)
                .map_err(FieldReason::from)
        } else if let Some((_, parse)) = T::PARSERS.iter().find(|(k, _)| *k == key_str) {
            parse(task, path, value).map_err(FieldReason::Invalid)
        } else {
            tracing::debug!("ignoring unknown key '{key}' at path '{path}'");
            Ok(())
        };

        if let Err(reason) = outcome {
            errors.push(FieldError {
                key: key.clone(),
                path: path.to_string(),
                reason,
            });
        }
    }

    errors.into_result()
}

/// Map then validate `task`.
///
/// # Errors
///
/// Returns [`BuildError::Fields`] if any declaration failed and
/// [`BuildError::Validation`] if the mapped task is inconsistent.
pub fn build_task<T: Mappable>(
    mut task: T,
    path: &str,
    declarations: &[(String, Value)],
) -> Result<T, BuildError> {
    map_fields(&mut task, path, declarations)?;
    task.validate()?;
    Ok(task)
}

/// Collects validation messages for one task.
#[derive(Debug, Default)]
pub struct Violations(Vec<String>);

impl Violations {
    /// Record `message`.
    pub fn add(&mut self, message: impl Into<String>) {
        self.0.push(message.into());
    }

    /// Record the standard message for an empty required field.
    pub fn require(&mut self, value: &str, path: &str, key: &str) {
        if value.trim().is_empty() {
            self.add(format!("empty required value at path '{path}.{key}'"));
        }
    }

    /// `Ok(())` when nothing was recorded.
    ///
    /// # Errors
    ///
    /// Returns the recorded messages as a [`ValidationError`].
    pub fn finish(self) -> Result<(), ValidationError> {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { messages: self.0 })
        }
    }
}
