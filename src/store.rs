use eyre::{eyre, Result};
use serde_json::Value;
use std::{fs, path::Path};

use crate::types::QueueEntry;

/// Loads the queue store.
///
/// An absent file is an empty queue. A file that parses as JSON but is not an
/// array is treated as empty with a warning (an enqueuer bug, not fatal).
/// A file that does not parse at all is an error: refusing to run beats
/// overwriting a store an operator might still want to salvage.
pub fn load(path: impl AsRef<Path>) -> Result<Vec<QueueEntry>> {
    let path = path.as_ref();
    if !path.exists() {
        return Ok(Vec::new());
    }

    let raw = fs::read_to_string(path)
        .map_err(|e| eyre!("failed to read queue file {}: {e}", path.display()))?;
    let value: Value = serde_json::from_str(&raw)
        .map_err(|e| eyre!("failed to parse queue file {}: {e}", path.display()))?;

    if !value.is_array() {
        tracing::warn!(
            path = %path.display(),
            "queue file is not a JSON array; treating as empty"
        );
        return Ok(Vec::new());
    }

    serde_json::from_value(value)
        .map_err(|e| eyre!("failed to decode queue entries in {}: {e}", path.display()))
}

/// Replaces the queue store with `entries`.
///
/// Write to a temp file then rename, so a reader (or a crash) never observes
/// a partially written store.
pub fn save(path: impl AsRef<Path>, entries: &[QueueEntry]) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| eyre!("failed to create queue directory {}: {e}", parent.display()))?;
    }

    let json = serde_json::to_string_pretty(entries)
        .map_err(|e| eyre!("failed to serialize queue: {e}"))?;

    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, json)
        .map_err(|e| eyre!("failed to write temp queue file {}: {e}", tmp_path.display()))?;

    // - On Unix, rename replaces the destination if it exists.
    // - On Windows, rename fails if the destination exists; remove then rename.
    if let Err(err) = fs::rename(&tmp_path, path) {
        if cfg!(windows) {
            let _ = fs::remove_file(path);
            fs::rename(&tmp_path, path)
                .map_err(|e| eyre!("failed to replace queue file {}: {e}", path.display()))?;
        } else {
            return Err(eyre!(
                "failed to replace queue file {}: {err}",
                path.display()
            ));
        }
    }
    Ok(())
}
