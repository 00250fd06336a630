//! `realvnc_server.config_update`: patch a `RealVNC` server config file.
//!
//! The only task kind with a [`FieldStatusTracker`]: its executor rewrites
//! just the parameters the declaration set or cleared.
use std::path::{Path, PathBuf};

use super::TaskCommon;
use super::mapper::{FieldParser, FieldSpec, Mappable, Setter, Violations, non_empty};
use super::tracker::FieldStatusTracker;
use super::value::Value;
use crate::error::ValidationError;

/// Config file used when none is declared.
pub const DEFAULT_CONFIG_FILE: &str = "/etc/vnc/config.d/common.custom";

/// Fields whose changes are tracked, with their config parameter names.
const PARAMETERS: &[(&str, &str)] = &[
    ("encryption", "Encryption"),
    ("authentication", "Authentication"),
    ("permissions", "Permissions"),
    ("query_connect", "QueryConnect"),
    ("query_connect_timeout", "QueryConnectTimeout"),
    ("blank_screen", "BlankScreen"),
    ("idle_timeout", "IdleTimeout"),
    ("log", "Log"),
    ("capture_method", "CaptureMethod"),
];

const CHANGE_FIELDS: &[&str] = &[
    "encryption",
    "authentication",
    "permissions",
    "query_connect",
    "query_connect_timeout",
    "blank_screen",
    "idle_timeout",
    "log",
    "capture_method",
];

const ENCRYPTION_VALUES: &[&str] = &["AlwaysOn", "PreferOn", "AlwaysMaximum", "PreferOff"];

/// How the VNC server runs, which selects the reload command.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ServerMode {
    /// Per-user server.
    #[default]
    User,
    /// System service.
    Service,
    /// Virtual-mode server.
    Virtual,
}

/// One pending edit of the config file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigEdit {
    /// Write `Parameter=value`, replacing any existing line.
    Set(String),
    /// Remove the parameter's line.
    Remove,
}

/// Declared `realvnc_server.config_update` task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VncConfigTask {
    /// Shared attributes.
    pub common: TaskCommon,
    /// Which parameters were set or cleared.
    pub tracker: FieldStatusTracker,
    /// Config file to patch.
    pub config_file: Option<PathBuf>,
    /// Server mode.
    pub server_mode: ServerMode,
    /// Overrides the reload program.
    pub reload_exec_path: Option<String>,
    /// Do not reload the server after an update.
    pub skip_reload: bool,
    /// Do not back up the config file before modifying it.
    pub skip_backup: bool,
    /// Backup file extension.
    pub backup_extension: String,
    /// `Encryption`
    pub encryption: String,
    /// `Authentication`
    pub authentication: String,
    /// `Permissions`
    pub permissions: String,
    /// `QueryConnect`
    pub query_connect: bool,
    /// `QueryConnectTimeout`
    pub query_connect_timeout: i64,
    /// `BlankScreen`
    pub blank_screen: bool,
    /// `IdleTimeout`
    pub idle_timeout: i64,
    /// `Log`
    pub log: String,
    /// `CaptureMethod`
    pub capture_method: i64,
}

impl VncConfigTask {
    /// Empty task of `type_name` at `path`.
    #[must_use]
    pub fn new(type_name: &str, path: &str) -> Self {
        Self {
            common: TaskCommon::new(type_name, path),
            tracker: FieldStatusTracker::new(CHANGE_FIELDS),
            config_file: None,
            server_mode: ServerMode::User,
            reload_exec_path: None,
            skip_reload: false,
            skip_backup: false,
            backup_extension: "bak".to_string(),
            encryption: String::new(),
            authentication: String::new(),
            permissions: String::new(),
            query_connect: false,
            query_connect_timeout: 0,
            blank_screen: false,
            idle_timeout: 0,
            log: String::new(),
            capture_method: 0,
        }
    }

    /// The config file to patch.
    #[must_use]
    pub fn config_file(&self) -> &Path {
        self.config_file
            .as_deref()
            .unwrap_or_else(|| Path::new(DEFAULT_CONFIG_FILE))
    }

    fn rendered(&self, field: &str) -> String {
        match field {
            "encryption" => self.encryption.clone(),
            "authentication" => self.authentication.clone(),
            "permissions" => self.permissions.clone(),
            "query_connect" => self.query_connect.to_string(),
            "query_connect_timeout" => self.query_connect_timeout.to_string(),
            "blank_screen" => self.blank_screen.to_string(),
            "idle_timeout" => self.idle_timeout.to_string(),
            "log" => self.log.clone(),
            "capture_method" => self.capture_method.to_string(),
            _ => String::new(),
        }
    }

    /// Pending edits keyed by config parameter name, in parameter order.
    ///
    /// A clear wins over a value in the same declaration.
    #[must_use]
    pub fn edits(&self) -> Vec<(&'static str, ConfigEdit)> {
        PARAMETERS
            .iter()
            .filter_map(|(field, param)| {
                let status = self.tracker.field_status(field)?;
                if status.clear {
                    Some((*param, ConfigEdit::Remove))
                } else if status.has_new_value {
                    Some((*param, ConfigEdit::Set(self.rendered(field))))
                } else {
                    None
                }
            })
            .collect()
    }

    /// Reload program and arguments for the server mode.
    #[must_use]
    pub fn reload_command(&self) -> (String, Vec<&'static str>) {
        let (default_program, args): (&str, Vec<&'static str>) = match self.server_mode {
            ServerMode::User if cfg!(windows) => {
                (r"C:\Program Files\RealVNC\VNC Server\vncserver.exe", vec!["-reload"])
            }
            ServerMode::Service if cfg!(windows) => (
                r"C:\Program Files\RealVNC\VNC Server\vncserver.exe",
                vec!["-service", "-reload"],
            ),
            ServerMode::User => ("/usr/bin/vncserver-x11", vec!["-reload"]),
            ServerMode::Service => ("/usr/bin/vncserver-x11", vec!["-service", "-reload"]),
            ServerMode::Virtual => ("/usr/bin/vnclicense", vec!["-reload"]),
        };
        let program = self
            .reload_exec_path
            .clone()
            .unwrap_or_else(|| default_program.to_string());
        (program, args)
    }
}

fn parse_server_mode(task: &mut VncConfigTask, _path: &str, value: &Value) -> Result<(), String> {
    let raw = value.to_text().map_err(|e| e.to_string())?;
    task.server_mode = match raw.trim().to_ascii_lowercase().as_str() {
        "" | "user" => ServerMode::User,
        "service" => ServerMode::Service,
        "virtual" => ServerMode::Virtual,
        _ => {
            return Err(format!(
                "invalid server_mode '{raw}', expected one of User, Service, Virtual"
            ));
        }
    };
    Ok(())
}

impl Mappable for VncConfigTask {
    const FIELDS: &'static [FieldSpec<Self>] = &[
        FieldSpec {
            key: "config_file",
            setter: Setter::Str(|t, v| t.config_file = non_empty(v).map(PathBuf::from)),
        },
        FieldSpec {
            key: "reload_exec_path",
            setter: Setter::Str(|t, v| t.reload_exec_path = non_empty(v)),
        },
        FieldSpec {
            key: "skip_reload",
            setter: Setter::Bool(|t, v| t.skip_reload = v),
        },
        FieldSpec {
            key: "skip_backup",
            setter: Setter::Bool(|t, v| t.skip_backup = v),
        },
        FieldSpec {
            key: "backup_extension",
            setter: Setter::Str(|t, v| t.backup_extension = v),
        },
        FieldSpec {
            key: "encryption",
            setter: Setter::Str(|t, v| t.encryption = v),
        },
        FieldSpec {
            key: "authentication",
            setter: Setter::Str(|t, v| t.authentication = v),
        },
        FieldSpec {
            key: "permissions",
            setter: Setter::Str(|t, v| t.permissions = v),
        },
        FieldSpec {
            key: "query_connect",
            setter: Setter::Bool(|t, v| t.query_connect = v),
        },
        FieldSpec {
            key: "query_connect_timeout",
            setter: Setter::Int(|t, v| t.query_connect_timeout = v),
        },
        FieldSpec {
            key: "blank_screen",
            setter: Setter::Bool(|t, v| t.blank_screen = v),
        },
        FieldSpec {
            key: "idle_timeout",
            setter: Setter::Int(|t, v| t.idle_timeout = v),
        },
        FieldSpec {
            key: "log",
            setter: Setter::Str(|t, v| t.log = v),
        },
        FieldSpec {
            key: "capture_method",
            setter: Setter::Int(|t, v| t.capture_method = v),
        },
    ];

    const PARSERS: &'static [(&'static str, FieldParser<Self>)] =
        &[("server_mode", parse_server_mode)];

    fn common_mut(&mut self) -> &mut TaskCommon {
        &mut self.common
    }

    fn tracker_mut(&mut self) -> Option<&mut FieldStatusTracker> {
        Some(&mut self.tracker)
    }

    fn validate(&self) -> Result<(), ValidationError> {
        let path = &self.common.path;
        let mut v = Violations::default();
        let setting = |field| {
            self.tracker
                .field_status(field)
                .is_some_and(|s| s.has_new_value && !s.clear)
        };
        if setting("encryption") && !ENCRYPTION_VALUES.contains(&self.encryption.as_str()) {
            v.add(format!(
                "invalid encryption value '{}' at path '{path}.encryption', expected one of {}",
                self.encryption,
                ENCRYPTION_VALUES.join(", ")
            ));
        }
        for (field, value) in [
            ("query_connect_timeout", self.query_connect_timeout),
            ("idle_timeout", self.idle_timeout),
        ] {
            if setting(field) && value < 0 {
                v.add(format!("negative value {value} at path '{path}.{field}'"));
            }
        }
        if self.backup_extension.trim().is_empty() && !self.skip_backup {
            v.require(&self.backup_extension, path, "backup_extension");
        }
        v.finish()
    }
}
