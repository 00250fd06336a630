//! `<algorithm>=<hexdigest>` checksum declarations and file hashing.
use std::fmt::Write as _;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use md5::Md5;
use sha1::Sha1;
use sha2::{Digest, Sha224, Sha256, Sha384, Sha512};

use crate::error::HashError;

/// Supported digest algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashAlgorithm {
    /// MD5 (32 hex digits).
    Md5,
    /// SHA-1 (40 hex digits).
    Sha1,
    /// SHA-224 (56 hex digits).
    Sha224,
    /// SHA-256 (64 hex digits).
    Sha256,
    /// SHA-384 (96 hex digits).
    Sha384,
    /// SHA-512 (128 hex digits).
    Sha512,
}

impl HashAlgorithm {
    /// Look up an algorithm by its lowercase name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "md5" => Some(Self::Md5),
            "sha1" => Some(Self::Sha1),
            "sha224" => Some(Self::Sha224),
            "sha256" => Some(Self::Sha256),
            "sha384" => Some(Self::Sha384),
            "sha512" => Some(Self::Sha512),
            _ => None,
        }
    }

    /// Canonical name used in declarations.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Md5 => "md5",
            Self::Sha1 => "sha1",
            Self::Sha224 => "sha224",
            Self::Sha256 => "sha256",
            Self::Sha384 => "sha384",
            Self::Sha512 => "sha512",
        }
    }
}

/// A parsed checksum declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Checksum {
    algorithm: HashAlgorithm,
    digest: String,
    declared: String,
}

impl Checksum {
    /// Parse `<algorithm>=<hexdigest>`.
    ///
    /// # Errors
    ///
    /// Returns [`HashError::InvalidFormat`] when `=` is missing and
    /// [`HashError::UnknownAlgorithm`] for unsupported algorithm names.
    pub fn parse(declared: &str) -> Result<Self, HashError> {
        let (name, digest) = declared
            .split_once('=')
            .ok_or_else(|| HashError::InvalidFormat(declared.to_string()))?;
        let algorithm =
            HashAlgorithm::from_name(name.trim()).ok_or_else(|| HashError::UnknownAlgorithm {
                algorithm: name.trim().to_string(),
                declared: declared.to_string(),
            })?;
        Ok(Self {
            algorithm,
            digest: digest.trim().to_ascii_lowercase(),
            declared: declared.to_string(),
        })
    }

    /// The algorithm part.
    #[must_use]
    pub const fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    /// The declaration exactly as written.
    #[must_use]
    pub fn declared(&self) -> &str {
        &self.declared
    }

    /// Hash `path` and compare against the declared digest.
    ///
    /// A missing file never matches.
    ///
    /// # Errors
    ///
    /// Returns [`HashError::Io`] if an existing file cannot be read.
    pub fn verify_file(&self, path: &Path) -> Result<Verification, HashError> {
        if !path.exists() {
            return Ok(Verification {
                matched: false,
                actual: None,
            });
        }
        let actual = hash_file(self.algorithm, path)?;
        Ok(Verification {
            matched: actual == self.digest,
            actual: Some(format!("{}={actual}", self.algorithm.name())),
        })
    }
}

/// Outcome of comparing a file against a [`Checksum`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verification {
    /// Whether the digest matched.
    pub matched: bool,
    /// `<algorithm>=<digest>` of the file, when it exists.
    pub actual: Option<String>,
}

impl Verification {
    /// Rendering of the actual checksum for error messages.
    #[must_use]
    pub fn actual_or_missing(&self) -> &str {
        self.actual.as_deref().unwrap_or("<missing>")
    }
}

fn to_hex(bytes: &[u8]) -> String {
    let mut hex = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        // write! to a String is infallible; unwrap_or(()) makes that explicit.
        write!(hex, "{b:02x}").unwrap_or(());
    }
    hex
}

fn digest_reader<D: Digest>(reader: &mut impl Read) -> std::io::Result<String> {
    let mut hasher = D::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(buf.get(..n).unwrap_or_default());
    }
    Ok(to_hex(&hasher.finalize()))
}

/// Lowercase hex digest of the file at `path`.
///
/// # Errors
///
/// Returns [`HashError::Io`] if the file cannot be opened or read.
pub fn hash_file(algorithm: HashAlgorithm, path: &Path) -> Result<String, HashError> {
    let io_err = |source| HashError::Io {
        path: path.to_path_buf(),
        source,
    };
    let mut file = File::open(path).map_err(io_err)?;
    let hex = match algorithm {
        HashAlgorithm::Md5 => digest_reader::<Md5>(&mut file),
        HashAlgorithm::Sha1 => digest_reader::<Sha1>(&mut file),
        HashAlgorithm::Sha224 => digest_reader::<Sha224>(&mut file),
        HashAlgorithm::Sha256 => digest_reader::<Sha256>(&mut file),
        HashAlgorithm::Sha384 => digest_reader::<Sha384>(&mut file),
        HashAlgorithm::Sha512 => digest_reader::<Sha512>(&mut file),
    };
    hex.map_err(io_err)
}

/// `true` if both files exist and have the same SHA-256 digest.
///
/// # Errors
///
/// Returns [`HashError::Io`] if an existing file cannot be read.
pub fn same_contents(a: &Path, b: &Path) -> Result<bool, HashError> {
    if !a.exists() || !b.exists() {
        return Ok(false);
    }
    Ok(hash_file(HashAlgorithm::Sha256, a)? == hash_file(HashAlgorithm::Sha256, b)?)
}
