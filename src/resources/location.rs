//! Source references: local paths or remote URLs.
use std::fmt;
use std::path::{Path, PathBuf};

use url::Url;

/// Parsed source reference, derived once when a task is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    raw: String,
    target: Target,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Target {
    Local(PathBuf),
    Remote(Url),
}

impl Location {
    /// Parse a raw source string.
    ///
    /// `file://` URLs and Windows drive paths are local; anything with a
    /// scheme, or a network-path reference (`//host/path`, fetched over
    /// HTTPS), is remote; everything else is a local path.
    ///
    /// # Errors
    ///
    /// Returns a message if the string looks like a URL but cannot be parsed.
    pub fn parse(raw: &str) -> Result<Self, String> {
        let invalid = |e: url::ParseError| format!("invalid source url '{raw}': {e}");
        let local = |path: PathBuf| Self {
            raw: raw.to_string(),
            target: Target::Local(path),
        };

        if let Some(rest) = raw.strip_prefix("//")
            && !rest.starts_with('/')
        {
            let url = Url::parse(&format!("https:{raw}")).map_err(invalid)?;
            return Ok(Self {
                raw: raw.to_string(),
                target: Target::Remote(url),
            });
        }

        match Url::parse(raw) {
            Ok(url) if url.scheme().len() == 1 => Ok(local(PathBuf::from(raw))),
            Ok(url) if url.scheme() == "file" => {
                let path = url
                    .to_file_path()
                    .unwrap_or_else(|()| PathBuf::from(url.path()));
                Ok(local(path))
            }
            Ok(url) => Ok(Self {
                raw: raw.to_string(),
                target: Target::Remote(url),
            }),
            Err(e) if raw.contains("://") => Err(invalid(e)),
            Err(_) => Ok(local(PathBuf::from(raw))),
        }
    }

    /// The string as declared.
    #[must_use]
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// `true` for remote sources.
    #[must_use]
    pub const fn is_url(&self) -> bool {
        matches!(self.target, Target::Remote(_))
    }

    /// The parsed URL of a remote source.
    #[must_use]
    pub const fn url(&self) -> Option<&Url> {
        match &self.target {
            Target::Remote(url) => Some(url),
            Target::Local(_) => None,
        }
    }

    /// The path of a local source.
    #[must_use]
    pub fn local_path(&self) -> Option<&Path> {
        match &self.target {
            Target::Local(path) => Some(path),
            Target::Remote(_) => None,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}
