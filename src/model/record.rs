//! Memo records: what the store remembers about a finished build action.

use std::path::PathBuf;

use jiff::Timestamp;

/// The last successful execution of a build action.
///
/// Valid only while the fingerprint of the action's inputs still matches
/// `fingerprint`. Stale records are overwritten, never deleted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoRecord {
    /// Digest of the action's identity (inputs and output path).
    pub key: String,

    /// Declared inputs, in declaration order.
    pub inputs: Vec<PathBuf>,

    /// Where the action put its artifact.
    pub output: PathBuf,

    /// Fingerprint of the inputs when the action last succeeded.
    pub fingerprint: String,

    pub recorded_at: Timestamp,
}
