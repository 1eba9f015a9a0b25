//! Crash-safe config writes.

use anyhow::{Context, Result};
use std::fs;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

/// Replace `path` with `contents` via a synced sibling temp file and rename,
/// so a crash never leaves a half-written config behind.
pub(super) fn atomic_write(path: &Path, contents: &str) -> Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent)
        .with_context(|| format!("Failed to create config directory {}", parent.display()))?;

    let mut tmp = NamedTempFile::new_in(parent)
        .with_context(|| format!("Failed to create temporary file in {}", parent.display()))?;
    tmp.write_all(contents.as_bytes())
        .context("Failed to write temporary config")?;
    tmp.as_file()
        .sync_all()
        .context("Failed to sync temporary config")?;

    tmp.persist(path)
        .with_context(|| format!("Failed to replace config file {}", path.display()))?;
    Ok(())
}
