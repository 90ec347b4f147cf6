//! File helpers shared by the JSON-backed schema store and ledger.

use crate::errors::{ErrorKind, StrataError, StrataResult};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Reads and decodes a JSON file. Returns `Ok(None)` when the file does not exist.
pub(crate) fn read_json<T: DeserializeOwned>(path: &Path) -> StrataResult<Option<T>> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(err) => {
            log::error!("Failed to read {}: {}", path.display(), err);
            return Err(err.into());
        }
    };

    if content.trim().is_empty() {
        return Ok(None);
    }

    serde_json::from_str(&content).map(Some).map_err(|err| {
        log::error!("Failed to decode {}: {}", path.display(), err);
        StrataError::new_with_cause(
            &format!("Corrupted file {}", path.display()),
            ErrorKind::EncodingError,
            err.into(),
        )
    })
}

/// Encodes `value` as pretty JSON and replaces `path` with it.
///
/// The content goes to a sibling temporary file which is synced and then renamed
/// over the target, so readers see either the old or the new file in full.
pub(crate) fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> StrataResult<()> {
    let content = serde_json::to_vec_pretty(value)?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let temp = temp_path(path);
    let result = (|| -> std::io::Result<()> {
        let mut file = fs::File::create(&temp)?;
        file.write_all(&content)?;
        file.write_all(b"\n")?;
        file.sync_all()?;
        fs::rename(&temp, path)
    })();

    if let Err(err) = result {
        log::error!("Failed to write {}: {}", path.display(), err);
        let _ = fs::remove_file(&temp);
        return Err(err.into());
    }
    Ok(())
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
