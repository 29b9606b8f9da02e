//! Atomic file output for generated artifacts.
//!
//! Every file is written to a temporary sibling first and then persisted over
//! the destination, so a failed run never leaves a half-written script.
use anyhow::{anyhow, Context, Result};
use serde::Serialize;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Create `path` (and parents) if missing.
pub fn ensure_dir(path: &Path) -> Result<PathBuf> {
    fs::create_dir_all(path).with_context(|| format!("create {}", path.display()))?;
    Ok(path.to_path_buf())
}

/// Atomically write `bytes` to `dir/file_name`, replacing an existing file.
pub fn write_atomic(dir: &Path, file_name: &str, bytes: &[u8]) -> Result<PathBuf> {
    if file_name.is_empty() || file_name.contains(['/', '\\']) || file_name.starts_with('.') {
        return Err(anyhow!("invalid output file name '{file_name}'"));
    }
    let dest = dir.join(file_name);
    let mut temp = tempfile::NamedTempFile::new_in(dir)
        .with_context(|| format!("create temporary file in {}", dir.display()))?;
    temp.write_all(bytes)
        .with_context(|| format!("write {}", dest.display()))?;
    temp.persist(&dest)
        .map_err(|err| err.error)
        .with_context(|| format!("persist {}", dest.display()))?;
    Ok(dest)
}

pub fn write_json_atomic<T: Serialize>(dir: &Path, file_name: &str, value: &T) -> Result<PathBuf> {
    let bytes = serde_json::to_vec_pretty(value).context("serialize JSON output")?;
    write_atomic(dir, file_name, &bytes)
}
