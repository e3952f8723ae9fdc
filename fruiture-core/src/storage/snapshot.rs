//! JSON snapshot files

use crate::errors::StorageResult;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::path::Path;

/// Replace `path` with the pretty-printed JSON of `value`.
///
/// Written to a sibling temp file first and renamed, so readers never see a
/// half-written snapshot.
pub fn write_json_snapshot<T: Serialize>(path: &Path, value: &T) -> StorageResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let text = serde_json::to_string_pretty(value)?;
    let staging = path.with_extension("json.tmp");
    fs::write(&staging, text)?;
    fs::rename(&staging, path)?;
    Ok(())
}

pub fn read_json<T: DeserializeOwned>(path: &Path) -> StorageResult<T> {
    let text = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}
