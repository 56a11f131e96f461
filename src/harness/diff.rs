//! Line-level diffs between expected and actual output.

use similar::{ChangeTag, TextDiff};

use crate::model::{DiffLine, DiffTag};

/// Diffs two normalized streams line by line.
///
/// Line numbers in the result are 1-based.
pub fn diff_lines(expected: &str, actual: &str) -> Vec<DiffLine> {
    let old: Vec<&str> = expected.split('\n').collect();
    let new: Vec<&str> = actual.split('\n').collect();
    let diff = TextDiff::from_slices(&old, &new);

    diff.iter_all_changes()
        .map(|change| DiffLine {
            tag: match change.tag() {
                ChangeTag::Equal => DiffTag::Equal,
                ChangeTag::Delete => DiffTag::Delete,
                ChangeTag::Insert => DiffTag::Insert,
            },
            expected_line: change.old_index().map(|i| i + 1),
            actual_line: change.new_index().map(|i| i + 1),
            text: change.value().to_string(),
        })
        .collect()
}
