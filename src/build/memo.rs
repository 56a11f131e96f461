//! Build memoization: skip an action whose inputs haven't changed.

use std::path::PathBuf;

use jiff::Timestamp;
use tracing::info;

use crate::model::{BuildAction, MemoRecord};
use crate::storage::Storage;

use super::{BuildError, fingerprint::fingerprint};

/// Returns the output of `action`, running `compute` only when needed.
///
/// The stored record for the action is reused when its fingerprint matches
/// the current inputs and its output still exists. Otherwise `compute` runs;
/// on success the record is replaced and the fresh output returned. Errors
/// from `compute` propagate untouched and leave the old record in place.
pub fn memoize<F>(storage: &Storage, action: &BuildAction, compute: F) -> Result<PathBuf, BuildError>
where
    F: FnOnce(&BuildAction) -> Result<PathBuf, BuildError>,
{
    let key = action.key();
    let fingerprint = fingerprint(&action.command, &action.inputs)?;

    if let Some(record) = storage.load_record(&key)?
        && record.fingerprint == fingerprint
        && record.output.exists()
    {
        info!(label = %action.label, output = %record.output.display(), "up to date");
        return Ok(record.output);
    }

    info!(label = %action.label, output = %action.output.display(), "out of date");
    let output = compute(action)?;

    storage.save_record(&MemoRecord {
        key,
        inputs: action.inputs.clone(),
        output: output.clone(),
        fingerprint,
        recorded_at: Timestamp::now(),
    })?;
    Ok(output)
}
