//! Durable JSON state files.
//!
//! Every state file is written to a sibling temp file, synced, then renamed
//! over the target, so a crash mid-write leaves the previous version intact.
//! Loading never fails startup: a file that cannot be parsed is moved aside
//! as `<name>.corrupt-<unix-seconds>` and replaced by a default value.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

/// Errors from reading or writing a state file.
#[derive(Error, Debug)]
pub enum StateFileError {
    /// File system failure.
    #[error("state file I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The content could not be (de)serialized.
    #[error("state file JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "state".to_string());
    path.with_file_name(format!("{name}{suffix}"))
}

/// Atomically replaces `path` with the JSON form of `value`.
///
/// # Errors
///
/// Returns an error if serialization, the temp write, or the rename fails.
/// The previous content of `path` is untouched in every failure case.
pub fn write_atomic<T: Serialize>(path: &Path, value: &T) -> Result<(), StateFileError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let bytes = serde_json::to_vec_pretty(value)?;
    let tmp = sibling(path, ".tmp");
    {
        let mut file = File::create(&tmp)?;
        file.write_all(&bytes)?;
        file.sync_all()?;
    }
    fs::rename(&tmp, path)?;

    debug!(path = %path.display(), bytes = bytes.len(), "State file written");
    Ok(())
}

/// Reads and parses `path`. Returns `Ok(None)` if the file does not exist.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub fn read<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, StateFileError> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Loads `path`, falling back to `T::default()` when it is absent or
/// unusable. A file that exists but fails to parse is backed up first.
pub fn load_or_repair<T: DeserializeOwned + Default>(path: &Path) -> T {
    match read(path) {
        Ok(Some(value)) => value,
        Ok(None) => T::default(),
        Err(StateFileError::Json(e)) => {
            let backup = sibling(path, &format!(".corrupt-{}", Utc::now().timestamp()));
            match fs::rename(path, &backup) {
                Ok(()) => warn!(
                    path = %path.display(),
                    backup = %backup.display(),
                    error = %e,
                    "Corrupt state file backed up, starting fresh"
                ),
                Err(rename_err) => warn!(
                    path = %path.display(),
                    error = %e,
                    rename_error = %rename_err,
                    "Corrupt state file could not be backed up, starting fresh"
                ),
            }
            T::default()
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "State file unreadable, starting fresh");
            T::default()
        }
    }
}
