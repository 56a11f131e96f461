//! Input fingerprints: detect whether a build action's inputs changed.

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::runner::Command;

use super::BuildError;

/// Fingerprints a command and the current contents of its inputs.
///
/// Every input contributes its path and a digest of its bytes, in declared
/// order. A missing input is an error, never an empty contribution.
pub fn fingerprint(command: &Command, inputs: &[PathBuf]) -> Result<String, BuildError> {
    let mut hasher = Sha256::new();
    hash_command(&mut hasher, command);

    for input in inputs {
        hasher.update(input.as_os_str().as_encoded_bytes());
        hasher.update([0]);
        hasher.update(content_digest(input)?);
    }

    Ok(hex::encode(hasher.finalize()))
}

/// Each argv element is terminated by NUL so argument boundaries count.
fn hash_command(hasher: &mut Sha256, command: &Command) {
    match command {
        Command::Argv(args) => {
            hasher.update(b"argv\0");
            for arg in args {
                hasher.update(arg.as_encoded_bytes());
                hasher.update([0]);
            }
        }
        Command::Shell(line) => {
            hasher.update(b"shell\0");
            hasher.update(line.as_bytes());
            hasher.update([0]);
        }
    }
}

fn content_digest(path: &Path) -> Result<Vec<u8>, BuildError> {
    let mut file = File::open(path).map_err(|source| match source.kind() {
        io::ErrorKind::NotFound => BuildError::MissingInput(path.to_path_buf()),
        _ => BuildError::Io {
            path: path.to_path_buf(),
            source,
        },
    })?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher).map_err(|source| BuildError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(hasher.finalize().to_vec())
}
