//! Raw declaration values and their coercions to field types.
use std::fmt;

use crate::error::TypeError;

/// Reserved declaration value that clears a tracked field.
pub const UNSET_SENTINEL: &str = "!UNSET!";

/// A raw value as it appears in a task declaration.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Explicit null (`~` or an empty value).
    Null,
    /// `true` or `false`.
    Bool(bool),
    /// Integer scalar.
    Int(i64),
    /// Floating-point scalar.
    Float(f64),
    /// String scalar.
    Str(String),
    /// Sequence.
    List(Vec<Self>),
    /// Nested mapping with key order preserved.
    Map(Vec<(String, Self)>),
}

impl Value {
    /// `true` if this is the [`UNSET_SENTINEL`] string.
    #[must_use]
    pub fn is_unset_sentinel(&self) -> bool {
        matches!(self, Self::Str(s) if s == UNSET_SENTINEL)
    }

    /// `true` for scalars (everything except lists and maps).
    #[must_use]
    pub const fn is_scalar(&self) -> bool {
        !matches!(self, Self::List(_) | Self::Map(_))
    }

    fn type_error(&self, expected: &'static str) -> TypeError {
        TypeError {
            expected,
            value: self.describe(),
        }
    }

    /// Short rendering used in error messages.
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::Str(s) => format!("'{s}'"),
            Self::List(_) => "a list".to_string(),
            Self::Map(_) => "a mapping".to_string(),
            other => format!("'{other}'"),
        }
    }

    /// Coerce to a boolean.
    ///
    /// Accepts `true/yes/y/on/1` and `false/no/n/off/0` (case-insensitive),
    /// the empty string and null as `false`, and numbers by non-zero-ness.
    ///
    /// # Errors
    ///
    /// Returns [`TypeError`] for any other string and for lists or maps.
    pub fn to_bool(&self) -> Result<bool, TypeError> {
        match self {
            Self::Bool(b) => Ok(*b),
            Self::Null => Ok(false),
            Self::Int(i) => Ok(*i != 0),
            Self::Float(f) => Ok(*f != 0.0),
            Self::Str(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "yes" | "y" | "on" | "1" => Ok(true),
                "false" | "no" | "n" | "off" | "0" | "" => Ok(false),
                _ => Err(self.type_error("bool")),
            },
            Self::List(_) | Self::Map(_) => Err(self.type_error("bool")),
        }
    }

    /// Coerce any scalar to its string form; null becomes the empty string.
    ///
    /// # Errors
    ///
    /// Returns [`TypeError`] for lists and maps.
    pub fn to_text(&self) -> Result<String, TypeError> {
        match self {
            Self::Null => Ok(String::new()),
            Self::Str(s) => Ok(s.clone()),
            Self::List(_) | Self::Map(_) => Err(self.type_error("string")),
            other => Ok(other.to_string()),
        }
    }

    /// Coerce to an integer.
    ///
    /// # Errors
    ///
    /// Returns [`TypeError`] for non-numeric strings, fractional floats,
    /// and non-scalars.
    pub fn to_int(&self) -> Result<i64, TypeError> {
        match self {
            Self::Int(i) => Ok(*i),
            Self::Bool(b) => Ok(i64::from(*b)),
            Self::Str(s) => s.trim().parse().map_err(|_| self.type_error("int")),
            #[allow(clippy::cast_possible_truncation)]
            Self::Float(f) if f.fract() == 0.0 && f.is_finite() => Ok(*f as i64),
            _ => Err(self.type_error("int")),
        }
    }

    /// Coerce to a list of strings.
    ///
    /// A single scalar becomes a one-element list; a list is expanded
    /// element by element.
    ///
    /// # Errors
    ///
    /// Returns [`TypeError`] for maps and for lists containing non-scalars.
    pub fn to_string_list(&self) -> Result<Vec<String>, TypeError> {
        match self {
            Self::List(items) => items
                .iter()
                .map(|item| item.to_text().map_err(|_| self.type_error("list of strings")))
                .collect(),
            Self::Map(_) => Err(self.type_error("list")),
            Self::Null => Ok(Vec::new()),
            scalar => Ok(vec![scalar.to_text()?]),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Str(s) => f.write_str(s),
            Self::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Self::Map(entries) => {
                f.write_str("{")?;
                for (i, (k, v)) in entries.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{k}: {v}")?;
                }
                f.write_str("}")
            }
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}
