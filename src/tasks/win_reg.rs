//! `win_reg.present`, `win_reg.absent` and `win_reg.absent_key`.
use super::mapper::{FieldSpec, Mappable, Setter, Violations, non_empty};
use super::{TaskCommon, WIN_REG_ABSENT, WIN_REG_ABSENT_KEY, WIN_REG_PRESENT};
use crate::error::ValidationError;
use crate::resources::registry::{RegistryAction, RegistryKey, ValueKind, check_value};

/// What a `win_reg` task does, derived from its type name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WinRegAction {
    /// Ensure a value is set.
    Present,
    /// Ensure a value is removed.
    Absent,
    /// Ensure a key is removed.
    AbsentKey,
}

impl WinRegAction {
    /// Action for a `win_reg.*` type name.
    #[must_use]
    pub fn from_type_name(type_name: &str) -> Option<Self> {
        match type_name {
            WIN_REG_PRESENT => Some(Self::Present),
            WIN_REG_ABSENT => Some(Self::Absent),
            WIN_REG_ABSENT_KEY => Some(Self::AbsentKey),
            _ => None,
        }
    }
}

/// Declared `win_reg` task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WinRegTask {
    /// Shared attributes.
    pub common: TaskCommon,
    /// Action, `None` for an unrecognised type name.
    pub action: Option<WinRegAction>,
    /// Value name.
    pub name: Option<String>,
    /// Key path including the hive.
    pub reg_path: String,
    /// Value data.
    pub value: Option<String>,
    /// Value type (`REG_SZ`, `REG_DWORD`, ...).
    pub value_type: Option<String>,
}

impl WinRegTask {
    /// Empty task of `type_name` at `path`.
    #[must_use]
    pub fn new(type_name: &str, path: &str) -> Self {
        Self {
            common: TaskCommon::new(type_name, path),
            action: WinRegAction::from_type_name(type_name),
            name: None,
            reg_path: String::new(),
            value: None,
            value_type: None,
        }
    }

    /// Resolve the key and concrete action. Only valid after validation.
    ///
    /// # Errors
    ///
    /// Returns a message when the declaration is incomplete.
    pub fn registry_action(&self) -> Result<(RegistryKey, RegistryAction), String> {
        let key = RegistryKey::parse(&self.reg_path)?;
        let name = || {
            self.name
                .clone()
                .ok_or_else(|| format!("missing value name for {}", self.common.path))
        };
        let action = match self.action {
            Some(WinRegAction::Present) => RegistryAction::SetValue {
                name: name()?,
                data: self.value.clone().unwrap_or_default(),
                kind: ValueKind::parse(self.value_type.as_deref().unwrap_or("REG_SZ"))?,
            },
            Some(WinRegAction::Absent) => RegistryAction::RemoveValue { name: name()? },
            Some(WinRegAction::AbsentKey) => RegistryAction::RemoveKey,
            None => return Err(format!("unknown win_reg task type: {}", self.common.type_name)),
        };
        Ok((key, action))
    }
}

impl Mappable for WinRegTask {
    const FIELDS: &'static [FieldSpec<Self>] = &[
        FieldSpec {
            key: "name",
            setter: Setter::Str(|t, v| t.name = non_empty(v)),
        },
        FieldSpec {
            key: "reg_path",
            setter: Setter::Str(|t, v| t.reg_path = v),
        },
        FieldSpec {
            key: "value",
            setter: Setter::Str(|t, v| t.value = Some(v)),
        },
        FieldSpec {
            key: "type",
            setter: Setter::Str(|t, v| t.value_type = non_empty(v)),
        },
    ];

    fn common_mut(&mut self) -> &mut TaskCommon {
        &mut self.common
    }

    fn validate(&self) -> Result<(), ValidationError> {
        let path = &self.common.path;
        let mut v = Violations::default();
        let Some(action) = self.action else {
            v.add(format!(
                "unknown win_reg task type: {}",
                self.common.type_name
            ));
            return v.finish();
        };

        if self.reg_path.trim().is_empty() {
            v.require(&self.reg_path, path, "reg_path");
            return v.finish();
        }
        if let Err(e) = RegistryKey::parse(&self.reg_path) {
            v.add(e);
        }

        if matches!(action, WinRegAction::Present | WinRegAction::Absent) {
            v.require(self.name.as_deref().unwrap_or_default(), path, "name");
        }

        if action == WinRegAction::Present {
            v.require(self.value.as_deref().unwrap_or_default(), path, "value");
            v.require(self.value_type.as_deref().unwrap_or_default(), path, "type");
            if let (Some(data), Some(raw_kind)) = (&self.value, &self.value_type) {
                match ValueKind::parse(raw_kind) {
                    Ok(kind) => {
                        if let Err(e) = check_value(data, kind) {
                            v.add(format!("{e} at path '{path}.value'"));
                        }
                    }
                    Err(e) => v.add(format!("{e} at path '{path}.type'")),
                }
            }
        }
        v.finish()
    }
}
