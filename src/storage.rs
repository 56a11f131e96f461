//! Persistent build state.
//!
//! A single `SQLite` file under the build root holds one row per build
//! action:
//!
//! ```text
//! <buildroot>/.kiln.sqlite
//!   memo(key, inputs, output, fingerprint, recorded_at)
//! ```
//!
//! Rows are looked up by key and replaced wholesale on every successful
//! rebuild. Nothing ever deletes a row; `kiln clean` removes the file.

mod memo;

use std::{fs, io, path::Path, path::PathBuf};

use rusqlite::Connection;

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("corrupt build state: {0}")]
    Corrupt(String),
}

pub type Result<T> = core::result::Result<T, StorageError>;

/// File name of the memo database inside the build root.
pub const DB_FILE: &str = ".kiln.sqlite";

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS memo (
    key         TEXT PRIMARY KEY,
    inputs      TEXT NOT NULL,
    output      TEXT NOT NULL,
    fingerprint TEXT NOT NULL,
    recorded_at TEXT NOT NULL
)";

/// The memo database.
pub struct Storage {
    conn: Connection,
    path: PathBuf,
}

impl Storage {
    /// Opens (or creates) the memo database inside `buildroot`.
    ///
    /// The build root is created if it doesn't exist.
    pub fn open(buildroot: &Path) -> Result<Self> {
        fs::create_dir_all(buildroot)?;
        let path = buildroot.join(DB_FILE);
        let conn = Connection::open(&path)?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn, path })
    }

    /// Removes the memo database from `buildroot`.
    ///
    /// Idempotent: returns `false` if there was nothing to remove.
    pub fn remove(buildroot: &Path) -> Result<bool> {
        let path = buildroot.join(DB_FILE);
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
