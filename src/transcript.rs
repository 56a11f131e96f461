//! Golden transcripts embedded in fixture files.
//!
//! A fixture carries its own expected output:
//!
//! ```text
//! print 1 + 2
//! _STDOUT
//! 3
//! #
//! _STDERR
//! #
//! ```
//!
//! A block starts after the first line exactly equal to its marker and ends
//! before the first later line starting with `#`.

/// Marker opening the expected-stdout block.
pub const STDOUT_MARKER: &str = "_STDOUT";

/// Marker opening the expected-stderr block.
pub const STDERR_MARKER: &str = "_STDERR";

/// A fixture that doesn't follow the transcript format.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FixtureError {
    #[error("missing `{0}` marker")]
    MissingMarker(String),

    #[error("`{marker}` block starting at line {line} has no closing `#` line")]
    Unterminated { marker: String, line: usize },
}

/// Extracts the block opened by `marker`, joined with `\n`.
pub fn extract_block<S: AsRef<str>>(lines: &[S], marker: &str) -> Result<String, FixtureError> {
    let start = lines
        .iter()
        .position(|l| l.as_ref() == marker)
        .ok_or_else(|| FixtureError::MissingMarker(marker.to_string()))?;

    let body = &lines[start + 1..];
    let end = body
        .iter()
        .position(|l| l.as_ref().starts_with('#'))
        .ok_or_else(|| FixtureError::Unterminated {
            marker: marker.to_string(),
            line: start + 1,
        })?;

    Ok(body[..end]
        .iter()
        .map(AsRef::as_ref)
        .collect::<Vec<&str>>()
        .join("\n"))
}
