//! Crash-safe JSON persistence for the index file.
//!
//! Writes go to a temp file next to the target (PID suffix), are synced to
//! disk and then renamed over the target, so readers only ever see the old
//! or the new document.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process;

use chrono::NaiveDateTime;
use serde::{de::DeserializeOwned, Serialize};
use tracing::debug;

use crate::error::{Error, Result};

fn io_error(path: &Path, source: std::io::Error) -> Error {
    Error::IndexIo {
        path: path.to_path_buf(),
        source,
    }
}

/// Read and parse a JSON file. `None` if the file does not exist.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(io_error(path, e)),
    };

    serde_json::from_str(&contents)
        .map(Some)
        .map_err(|source| Error::MalformedIndex {
            path: path.to_path_buf(),
            source,
        })
}

/// Pretty-print `data` with a trailing newline and atomically replace `path`.
pub fn write_json<T: Serialize>(path: &Path, data: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| io_error(parent, e))?;
    }

    let mut serialized = serde_json::to_string_pretty(data)?;
    serialized.push('\n');

    let temp_path = path.with_extension(format!("json.{}.tmp", process::id()));
    let written = write_synced(&temp_path, serialized.as_bytes())
        .and_then(|()| fs::rename(&temp_path, path));

    if let Err(e) = written {
        let _ = fs::remove_file(&temp_path);
        return Err(io_error(path, e));
    }

    debug!("Atomically wrote {}", path.display());
    Ok(())
}

fn write_synced(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)?;
    file.write_all(bytes)?;
    file.flush()?;
    file.sync_all()
}

/// Copy `path` into `backup_folder` as `<stem>-YYYY-MM-DD-HH-MM-SS.json`,
/// appending `_1`, `_2`, ... if a backup with that timestamp already exists.
/// Returns `None` when there is nothing to back up.
pub fn backup_file(path: &Path, backup_folder: &Path, now: NaiveDateTime) -> Result<Option<PathBuf>> {
    if !path.exists() {
        return Ok(None);
    }

    fs::create_dir_all(backup_folder).map_err(|e| io_error(backup_folder, e))?;

    let stem = path
        .file_stem()
        .unwrap_or_default()
        .to_string_lossy()
        .to_string();
    let base = format!("{}-{}", stem, now.format("%Y-%m-%d-%H-%M-%S"));

    let mut target = backup_folder.join(format!("{base}.json"));
    let mut counter = 1u32;
    while target.exists() {
        target = backup_folder.join(format!("{base}_{counter}.json"));
        counter += 1;
    }

    fs::copy(path, &target).map_err(|e| io_error(&target, e))?;
    debug!("Created backup: {}", target.display());
    Ok(Some(target))
}
