//! Filesystem utilities.
//!
//! Settings are written to a sibling temp file and renamed into place, so a
//! crash mid-write leaves either the old file or the new one.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::CoreResult;

/// Serializes `value` as pretty JSON and swaps it in atomically.
///
/// Missing parent directories are created. If anything fails before the
/// rename, the temp file is removed and `path` is untouched.
pub fn atomic_write_json_pretty<T: serde::Serialize>(path: &Path, value: &T) -> CoreResult<()> {
    let bytes = serde_json::to_vec_pretty(value)?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let tmp_path = temp_path(path);
    if let Err(e) = write_synced(&tmp_path, &bytes) {
        let _ = std::fs::remove_file(&tmp_path);
        return Err(e);
    }

    // rename replaces an existing destination on every supported platform
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

fn write_synced(path: &Path, bytes: &[u8]) -> CoreResult<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    writer.write_all(bytes)?;
    writer.flush()?;
    writer.get_ref().sync_all()?;
    Ok(())
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}
