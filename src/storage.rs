//! Filesystem helpers for the task directory.
//!
//! Every task write goes through [`write_atomic`]: the content lands in a
//! temporary file next to the target and is renamed over it, so readers only
//! ever see the old or the new file.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::error::{Error, Result};

/// Extension of task files inside the task directory.
pub const TASK_EXTENSION: &str = "md";

/// Write `data` to `path` atomically, creating parent directories as needed.
///
/// Returns the modification time of the written file.
pub fn write_atomic(path: &Path, data: &[u8]) -> Result<SystemTime> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent)?;

    let mut temp = tempfile::Builder::new()
        .prefix(".tiki-")
        .suffix(".tmp")
        .tempfile_in(parent)?;
    temp.write_all(data)?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|err| Error::Io(err.error))?;

    tracing::debug!(path = %path.display(), bytes = data.len(), "wrote file");
    file_mtime(path)
}

/// Current modification time of `path`.
pub fn file_mtime(path: &Path) -> Result<SystemTime> {
    Ok(fs::metadata(path)?.modified()?)
}

/// Remove `path`, treating a missing file as success.
pub fn remove_if_exists(path: &Path) -> Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(err) => Err(err.into()),
    }
}

/// All task files (`*.md`) directly inside `dir`, sorted by name.
///
/// A missing directory yields an empty list.
pub fn list_task_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(err.into()),
    };

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry?;
        let path = entry.path();
        if !entry.file_type()?.is_file() {
            continue;
        }
        let is_task = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case(TASK_EXTENSION));
        let hidden = path
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.starts_with('.'));
        if is_task && !hidden {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}
