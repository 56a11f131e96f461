//! Memo storage: point lookups and upserts of memo records.

use std::path::PathBuf;

use rusqlite::{Connection, OptionalExtension};

use crate::model::MemoRecord;

use super::{Result, Storage, StorageError};

impl Storage {
    /// Loads the record stored under `key`, if any.
    pub fn load_record(&self, key: &str) -> Result<Option<MemoRecord>> {
        load_record_row(&self.conn, key)
    }

    /// Writes `record`, replacing whatever was stored under its key.
    pub fn save_record(&self, record: &MemoRecord) -> Result<()> {
        let inputs = serde_json::to_string(&record.inputs)?;
        self.conn.execute(
            "INSERT INTO memo (key, inputs, output, fingerprint, recorded_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(key) DO UPDATE SET
                inputs = excluded.inputs,
                output = excluded.output,
                fingerprint = excluded.fingerprint,
                recorded_at = excluded.recorded_at",
            rusqlite::params![
                &record.key,
                inputs,
                record.output.to_string_lossy().into_owned(),
                &record.fingerprint,
                record.recorded_at.to_string(),
            ],
        )?;
        Ok(())
    }
}

fn load_record_row(conn: &Connection, key: &str) -> Result<Option<MemoRecord>> {
    let row = conn
        .query_row(
            "SELECT inputs, output, fingerprint, recorded_at FROM memo WHERE key = ?1",
            [key],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                ))
            },
        )
        .optional()?;

    let Some((inputs_json, output, fingerprint, recorded_at_str)) = row else {
        return Ok(None);
    };

    let inputs: Vec<PathBuf> = serde_json::from_str(&inputs_json)?;
    let recorded_at = recorded_at_str
        .parse::<jiff::Timestamp>()
        .map_err(|e| StorageError::Corrupt(format!("invalid recorded_at: {e}")))?;

    Ok(Some(MemoRecord {
        key: key.to_string(),
        inputs,
        output: PathBuf::from(output),
        fingerprint,
        recorded_at,
    }))
}
