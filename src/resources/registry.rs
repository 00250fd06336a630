//! Windows registry entries, managed through `PowerShell`.
use std::fmt;

use super::{Resource, ResourceChange, ResourceState};
use crate::error::ExecError;
use crate::exec::{CancelToken, CommandRunner, CommandSpec};

const NOT_FOUND: &str = "::NOT_FOUND::";

/// Root hives accepted in `reg_path`, short and long forms.
const ROOT_KEYS: &[(&str, &str)] = &[
    ("HKLM", "HKEY_LOCAL_MACHINE"),
    ("HKCU", "HKEY_CURRENT_USER"),
    ("HKCR", "HKEY_CLASSES_ROOT"),
    ("HKU", "HKEY_USERS"),
    ("HKCC", "HKEY_CURRENT_CONFIG"),
];

/// A registry key path split into its hive and sub-path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryKey {
    hive: &'static str,
    sub_path: String,
}

impl RegistryKey {
    /// Parse `HKLM\Software\Foo` (or `HKEY_LOCAL_MACHINE\...`, `HKLM:\...`).
    ///
    /// # Errors
    ///
    /// Returns a message when the root key is not a known hive.
    pub fn parse(raw: &str) -> Result<Self, String> {
        let normalized = raw.replace('/', "\\");
        let (root, rest) = normalized
            .split_once('\\')
            .unwrap_or((normalized.as_str(), ""));
        let root = root.trim_end_matches(':').to_ascii_uppercase();
        let hive = ROOT_KEYS
            .iter()
            .find(|(short, long)| root == *short || root == *long)
            .map(|(_, long)| *long)
            .ok_or_else(|| format!("invalid root key in registry path '{raw}'"))?;
        Ok(Self {
            hive,
            sub_path: rest.trim_matches('\\').to_string(),
        })
    }

    /// Provider path understood by `PowerShell` item cmdlets.
    #[must_use]
    pub fn provider_path(&self) -> String {
        if self.sub_path.is_empty() {
            format!("Registry::{}", self.hive)
        } else {
            format!("Registry::{}\\{}", self.hive, self.sub_path)
        }
    }
}

impl fmt::Display for RegistryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.sub_path.is_empty() {
            f.write_str(self.hive)
        } else {
            write!(f, "{}\\{}", self.hive, self.sub_path)
        }
    }
}

/// Registry value types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    /// `REG_SZ`
    String,
    /// `REG_EXPAND_SZ`
    ExpandString,
    /// `REG_DWORD`
    DWord,
    /// `REG_QWORD`
    QWord,
    /// `REG_MULTI_SZ`, one string per line.
    MultiString,
    /// `REG_BINARY`, hex bytes separated by commas or spaces.
    Binary,
}

impl ValueKind {
    /// Parse a `REG_*` type name (case-insensitive, prefix optional).
    ///
    /// # Errors
    ///
    /// Returns a message naming the unsupported type.
    pub fn parse(raw: &str) -> Result<Self, String> {
        let upper = raw.trim().to_ascii_uppercase();
        let name = upper.strip_prefix("REG_").unwrap_or(&upper);
        match name {
            "SZ" => Ok(Self::String),
            "EXPAND_SZ" => Ok(Self::ExpandString),
            "DWORD" => Ok(Self::DWord),
            "QWORD" => Ok(Self::QWord),
            "MULTI_SZ" => Ok(Self::MultiString),
            "BINARY" => Ok(Self::Binary),
            _ => Err(format!("unsupported registry value type '{raw}'")),
        }
    }

    /// `-Type` argument for `New-ItemProperty`.
    const fn ps_type(self) -> &'static str {
        match self {
            Self::String => "String",
            Self::ExpandString => "ExpandString",
            Self::DWord => "DWord",
            Self::QWord => "QWord",
            Self::MultiString => "MultiString",
            Self::Binary => "Binary",
        }
    }
}

/// What to do with the registry entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryAction {
    /// Create or update a value.
    SetValue {
        /// Value name.
        name: String,
        /// Declared data.
        data: String,
        /// Value type.
        kind: ValueKind,
    },
    /// Remove a value if present.
    RemoveValue {
        /// Value name.
        name: String,
    },
    /// Remove a key and everything below it.
    RemoveKey,
}

fn quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

fn parse_number(data: &str) -> Option<u64> {
    let data = data.trim();
    data.strip_prefix("0x")
        .or_else(|| data.strip_prefix("0X"))
        .map_or_else(|| data.parse().ok(), |hex| u64::from_str_radix(hex, 16).ok())
}

fn parse_bytes(data: &str) -> Option<Vec<u8>> {
    data.split(|c: char| c == ',' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .map(|s| {
            let s = s.trim_start_matches("0x").trim_start_matches("0X");
            u8::from_str_radix(s, 16).ok()
        })
        .collect()
}

/// Check that `data` is representable as `kind`.
///
/// # Errors
///
/// Returns a message describing the mismatch.
pub fn check_value(data: &str, kind: ValueKind) -> Result<(), String> {
    match kind {
        ValueKind::DWord => parse_number(data)
            .filter(|n| u32::try_from(*n).is_ok())
            .map(|_| ())
            .ok_or_else(|| format!("value '{data}' is not a valid REG_DWORD")),
        ValueKind::QWord => parse_number(data)
            .map(|_| ())
            .ok_or_else(|| format!("value '{data}' is not a valid REG_QWORD")),
        ValueKind::Binary => parse_bytes(data)
            .map(|_| ())
            .ok_or_else(|| format!("value '{data}' is not a valid REG_BINARY byte list")),
        ValueKind::String | ValueKind::ExpandString | ValueKind::MultiString => Ok(()),
    }
}

/// `PowerShell` expression for `data` as `kind`.
fn format_value(data: &str, kind: ValueKind) -> Result<String, ExecError> {
    let invalid = || ExecError::Attribute(format!("value '{data}' is not valid for {kind:?}"));
    match kind {
        ValueKind::String | ValueKind::ExpandString => Ok(quote(data)),
        ValueKind::DWord | ValueKind::QWord => {
            parse_number(data).map(|n| n.to_string()).ok_or_else(invalid)
        }
        ValueKind::MultiString => {
            let items: Vec<String> = data.lines().map(quote).collect();
            Ok(format!("@({})", items.join(",")))
        }
        ValueKind::Binary => {
            let bytes = parse_bytes(data).ok_or_else(invalid)?;
            let items: Vec<String> = bytes.iter().map(|b| format!("0x{b:02x}")).collect();
            Ok(format!("([byte[]]({}))", items.join(",")))
        }
    }
}

/// Compare the value printed by `PowerShell` against the declared data.
fn value_matches(current: &str, expected: &str, kind: ValueKind) -> bool {
    match kind {
        ValueKind::DWord | ValueKind::QWord => {
            current.trim().parse::<u64>().ok().is_some_and(|c| Some(c) == parse_number(expected))
        }
        ValueKind::Binary => {
            let current: Option<Vec<u8>> =
                current.lines().map(|l| l.trim().parse::<u8>().ok()).collect();
            current.is_some() && current == parse_bytes(expected)
        }
        ValueKind::MultiString => current.lines().eq(expected.lines()),
        ValueKind::String | ValueKind::ExpandString => current == expected,
    }
}

/// A registry entry reconciled through a [`CommandRunner`].
#[derive(Debug)]
pub struct RegistryResource<'a> {
    key: RegistryKey,
    action: RegistryAction,
    runner: &'a dyn CommandRunner,
    cancel: &'a CancelToken,
}

impl<'a> RegistryResource<'a> {
    /// Create a resource for `action` on `key`.
    #[must_use]
    pub const fn new(
        key: RegistryKey,
        action: RegistryAction,
        runner: &'a dyn CommandRunner,
        cancel: &'a CancelToken,
    ) -> Self {
        Self {
            key,
            action,
            runner,
            cancel,
        }
    }

    fn powershell(&self, script: String) -> Result<crate::exec::ExecResult, ExecError> {
        let spec = CommandSpec::new(script).with_shell(Some("powershell".to_string()));
        self.runner.run(&spec, self.cancel)
    }

    fn run_checked(&self, script: String) -> Result<(), ExecError> {
        let out = self.powershell(script)?;
        if out.success {
            Ok(())
        } else {
            Err(ExecError::Command {
                command: format!("powershell: {}", self.description()),
                exit_code: out.code.unwrap_or(-1),
                stderr: out.stderr.trim().to_string(),
            })
        }
    }

    fn query_value(&self, name: &str) -> Result<Option<String>, ExecError> {
        let key = quote(&self.key.provider_path());
        let name = quote(name);
        let script = format!(
            "$ErrorActionPreference='SilentlyContinue'\n\
             $v = (Get-ItemProperty -LiteralPath {key} -Name {name}).{name}\n\
             if ($null -eq $v) {{ Write-Output '{NOT_FOUND}' }} else {{ Write-Output $v }}"
        );
        let out = self.powershell(script)?;
        let text = out.stdout.trim_end_matches(['\r', '\n']).replace("\r\n", "\n");
        if !out.success || text.trim() == NOT_FOUND {
            Ok(None)
        } else {
            Ok(Some(text))
        }
    }

    fn key_exists(&self) -> Result<bool, ExecError> {
        let key = quote(&self.key.provider_path());
        let out = self.powershell(format!("Test-Path -LiteralPath {key}"))?;
        Ok(out.success && out.stdout.trim().eq_ignore_ascii_case("true"))
    }
}

impl Resource for RegistryResource<'_> {
    fn description(&self) -> String {
        match &self.action {
            RegistryAction::SetValue { name, data, .. } => {
                format!("{}\\{name} = {data}", self.key)
            }
            RegistryAction::RemoveValue { name } => format!("remove {}\\{name}", self.key),
            RegistryAction::RemoveKey => format!("remove key {}", self.key),
        }
    }

    fn current_state(&self) -> Result<ResourceState, ExecError> {
        match &self.action {
            RegistryAction::SetValue { name, data, kind } => {
                Ok(match self.query_value(name)? {
                    None => ResourceState::Missing,
                    Some(current) if value_matches(&current, data, *kind) => {
                        ResourceState::Correct
                    }
                    Some(current) => ResourceState::Incorrect { current },
                })
            }
            RegistryAction::RemoveValue { name } => Ok(match self.query_value(name)? {
                None => ResourceState::Correct,
                Some(current) => ResourceState::Incorrect { current },
            }),
            RegistryAction::RemoveKey => Ok(if self.key_exists()? {
                ResourceState::Incorrect {
                    current: "present".to_string(),
                }
            } else {
                ResourceState::Correct
            }),
        }
    }

    fn apply(&self) -> Result<ResourceChange, ExecError> {
        let key = quote(&self.key.provider_path());
        let script = match &self.action {
            RegistryAction::SetValue { name, data, kind } => format!(
                "if (!(Test-Path -LiteralPath {key})) {{ New-Item -Path {key} -Force | Out-Null }}\n\
                 New-ItemProperty -LiteralPath {key} -Name {} -Value {} -PropertyType {} -Force | Out-Null",
                quote(name),
                format_value(data, *kind)?,
                kind.ps_type()
            ),
            RegistryAction::RemoveValue { name } => format!(
                "Remove-ItemProperty -LiteralPath {key} -Name {} -ErrorAction Stop",
                quote(name)
            ),
            RegistryAction::RemoveKey => {
                format!("Remove-Item -LiteralPath {key} -Recurse -Force -ErrorAction Stop")
            }
        };
        self.run_checked(script)?;
        Ok(ResourceChange::Applied)
    }
}
