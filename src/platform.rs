use std::fmt;

/// Detected operating system family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Os {
    /// Linux, macOS and other Unix-like systems.
    Unix,
    /// Microsoft Windows.
    Windows,
}

impl fmt::Display for Os {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unix => write!(f, "unix"),
            Self::Windows => write!(f, "windows"),
        }
    }
}

/// Platform information for the current system.
#[derive(Debug, Clone)]
pub struct Platform {
    /// Operating system family.
    pub os: Os,
}

impl Platform {
    /// Detect the current platform.
    #[must_use]
    pub const fn detect() -> Self {
        Self {
            os: if cfg!(windows) { Os::Windows } else { Os::Unix },
        }
    }

    /// Create a platform with an explicit OS (for testing).
    #[must_use]
    pub const fn new(os: Os) -> Self {
        Self { os }
    }

    /// `true` on Windows.
    #[must_use]
    pub fn is_windows(&self) -> bool {
        self.os == Os::Windows
    }

    /// Whether `win_reg` tasks can run here.
    #[must_use]
    pub fn has_registry(&self) -> bool {
        self.is_windows()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detect_matches_target() {
        assert_eq!(Platform::detect().is_windows(), cfg!(windows));
    }

    #[test]
    fn registry_only_on_windows() {
        assert!(Platform::new(Os::Windows).has_registry());
        assert!(!Platform::new(Os::Unix).has_registry());
    }

    #[test]
    fn os_display() {
        assert_eq!(Os::Unix.to_string(), "unix");
        assert_eq!(Os::Windows.to_string(), "windows");
    }
}
