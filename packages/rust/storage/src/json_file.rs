//! Atomic JSON file helpers shared by every document the store writes.

use std::path::Path;

use relnotes_shared::{RelnotesError, Result};
use serde::Serialize;
use tracing::debug;

/// Read a file to a string. `Ok(None)` when the file does not exist.
pub(crate) fn read_optional(path: &Path) -> Result<Option<String>> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(RelnotesError::io(path, e)),
    }
}

/// Write a JSON file (pretty-printed) via temp file + rename, so a reader
/// never observes a half-written document.
pub(crate) fn write_json_atomic<T: Serialize>(path: &Path, data: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| RelnotesError::io(parent, e))?;
    }

    let json = serde_json::to_string_pretty(data).map_err(|e| {
        RelnotesError::validation(format!("JSON serialization failed: {e}"))
    })?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document.json".into());
    let temp = path.with_file_name(format!(".{file_name}.tmp"));

    std::fs::write(&temp, json).map_err(|e| RelnotesError::io(&temp, e))?;
    std::fs::rename(&temp, path).map_err(|e| RelnotesError::io(path, e))?;

    debug!(path = %path.display(), "wrote JSON file");
    Ok(())
}
