//! Fixture discovery.

use std::path::{Path, PathBuf};

use ignore::WalkBuilder;

use super::HarnessError;

/// Lists the fixtures directly inside `dir` whose extension is `extension`,
/// sorted by file name.
///
/// The directory is rescanned on every call. Ignore files are not honored:
/// every fixture on disk is a test.
pub fn discover(dir: &Path, extension: &str) -> Result<Vec<PathBuf>, HarnessError> {
    let walker = WalkBuilder::new(dir)
        .standard_filters(false)
        .max_depth(Some(1))
        .sort_by_file_name(std::cmp::Ord::cmp)
        .build();

    let mut fixtures = Vec::new();
    for entry in walker {
        let entry = entry.map_err(|source| HarnessError::Discover {
            dir: dir.to_path_buf(),
            source,
        })?;
        let is_file = entry.file_type().is_some_and(|ft| ft.is_file());
        let matches = entry
            .path()
            .extension()
            .is_some_and(|ext| ext == extension);
        if is_file && matches {
            fixtures.push(entry.into_path());
        }
    }
    Ok(fixtures)
}
