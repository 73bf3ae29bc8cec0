//! Writes rendered graphs to disk.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

/// Creates the parent directories of `path` if they are missing.
///
/// # Errors
///
/// Returns an error if a directory cannot be created.
pub fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Cannot create directory: {}", parent.display()))?;
    }
    Ok(())
}

/// Writes content to a file, creating parent directories as needed.
///
/// # Errors
///
/// Returns an error if directories cannot be created or the file cannot be written.
pub fn write(path: &Path, content: &[u8]) -> Result<()> {
    ensure_parent(path)?;
    fs::write(path, content).with_context(|| format!("Cannot write file: {}", path.display()))?;
    Ok(())
}
