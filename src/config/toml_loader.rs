//! TOML file loading.
use serde::de::DeserializeOwned;
use std::path::Path;

use crate::error::ConfigError;

/// Deserialize a TOML file.
///
/// A missing file deserializes from an empty document, so every
/// `#[serde(default)]` field takes its default.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] if the file exists but cannot be read and
/// [`ConfigError::Toml`] if it does not parse.
pub fn load_config<T: DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let toml_err = |source| ConfigError::Toml {
        path: path.to_path_buf(),
        source,
    };
    if !path.exists() {
        return toml::from_str("").map_err(toml_err);
    }

    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&content).map_err(toml_err)
}
