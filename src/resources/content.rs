//! Literal file contents and the text diff used by the content-match gate.
use std::path::Path;

use similar::{ChangeTag, TextDiff};

use super::encoding::Charset;
use super::fs::read_or_empty;
use crate::error::ExecError;

/// Line diff between the current file text and the desired text.
///
/// Returns an empty string when both are equal. Lines are prefixed with
/// `-`/`+`; unchanged lines are omitted.
#[must_use]
pub fn text_diff(current: &str, desired: &str) -> String {
    if current == desired {
        return String::new();
    }
    let diff = TextDiff::from_lines(current, desired);
    let mut out = String::new();
    for change in diff.iter_all_changes() {
        let sign = match change.tag() {
            ChangeTag::Delete => '-',
            ChangeTag::Insert => '+',
            ChangeTag::Equal => continue,
        };
        out.push(sign);
        out.push_str(change.as_str().unwrap_or_default());
        if change.missing_newline() {
            out.push('\n');
        }
    }
    out
}

/// Current text of `path` (empty when absent), decoded with `charset`.
///
/// # Errors
///
/// Returns an error if the file cannot be read or does not decode.
pub fn read_text(path: &Path, charset: Option<Charset>) -> Result<String, ExecError> {
    let bytes = read_or_empty(path)?;
    match charset {
        Some(cs) => Ok(cs.decode(&bytes)?),
        // Undecodable bytes can never equal desired text; lossy keeps the diff readable.
        None => Ok(String::from_utf8_lossy(&bytes).into_owned()),
    }
}

/// Diff `desired` against what is on disk at `path`.
///
/// A file that exists but does not decode in `charset` is reported as a
/// full replacement rather than an error.
///
/// # Errors
///
/// Returns an error if the file cannot be read.
pub fn diff_against_file(
    path: &Path,
    desired: &str,
    charset: Option<Charset>,
) -> Result<String, ExecError> {
    let current = match read_text(path, charset) {
        Ok(text) => text,
        Err(ExecError::Encoding(_)) => String::from_utf8_lossy(&read_or_empty(path)?).into_owned(),
        Err(e) => return Err(e),
    };
    Ok(text_diff(&current, desired))
}

/// Encode `text` for writing.
///
/// # Errors
///
/// Returns an error if `text` cannot be represented in `charset`.
pub fn encode_text(text: &str, charset: Option<Charset>) -> Result<Vec<u8>, ExecError> {
    match charset {
        Some(cs) => Ok(cs.encode(text)?),
        None => Ok(text.as_bytes().to_vec()),
    }
}
