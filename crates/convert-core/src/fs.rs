//! Filesystem helpers
//!
//! Atomic file replacement for converter output and directory discovery.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, instrument};
use uuid::Uuid;

use crate::{Error, Result};

/// Unique temporary sibling of `path`
fn temp_path(path: &Path) -> PathBuf {
    let temp_name = format!(
        ".{}.{}.tmp",
        path.file_name().unwrap_or_default().to_string_lossy(),
        Uuid::new_v4()
    );
    path.with_file_name(temp_name)
}

fn write_failure(path: &Path, reason: impl std::fmt::Display) -> Error {
    Error::DestinationWriteFailure {
        path: path.display().to_string(),
        reason: reason.to_string(),
    }
}

/// Write `data` to `path`, replacing any existing file
///
/// The bytes go to a temporary file in the same directory which is synced
/// and then renamed over `path`. On failure the temporary file is removed
/// and `path` is left untouched. The parent directory must already exist.
#[instrument(skip_all, fields(path = %path.display(), size = data.len()))]
pub fn write_atomic(path: &Path, data: &[u8]) -> Result<u64> {
    let temp = temp_path(path);
    debug!(temp = %temp.display(), "Writing file atomically");

    let result = (|| -> std::io::Result<()> {
        let mut file = fs::File::create(&temp)?;
        file.write_all(data)?;
        file.sync_all()?;
        fs::rename(&temp, path)
    })();

    if let Err(e) = result {
        let _ = fs::remove_file(&temp);
        return Err(write_failure(path, e));
    }

    debug!(size = data.len(), "File written successfully");
    Ok(data.len() as u64)
}

/// Names of the immediate subdirectories of `path`, sorted
pub fn immediate_dirs(path: &Path) -> Result<Vec<String>> {
    let mut dirs = Vec::new();
    for entry in fs::read_dir(path)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            dirs.push(entry.file_name().to_string_lossy().to_string());
        }
    }
    dirs.sort();
    Ok(dirs)
}
