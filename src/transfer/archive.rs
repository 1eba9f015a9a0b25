//! Packs a directory offer into a temporary zip, the wire form of a
//! directory transfer.

use anyhow::{Context, Result};
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use uuid::Uuid;
use walkdir::WalkDir;
use zip::write::FileOptions;

/// Zip on disk that is removed when dropped.
#[derive(Debug)]
pub struct TempArchive {
    path: PathBuf,
}

impl TempArchive {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempArchive {
    fn drop(&mut self) {
        if let Err(err) = std::fs::remove_file(&self.path) {
            tracing::warn!(path = %self.path.display(), error = %err, "failed to remove temp zip archive");
        }
    }
}

/// Zip everything below `root`; entry names are relative to `root` and use
/// `/` separators. Walk order is sorted by file name so archives are
/// reproducible.
pub fn pack_directory(root: &Path) -> Result<TempArchive> {
    let archive = TempArchive {
        path: std::env::temp_dir().join(format!("wormsave-{}.zip", Uuid::new_v4())),
    };

    let file = File::create(archive.path())
        .with_context(|| format!("Failed to create zip archive {}", archive.path().display()))?;
    let mut writer = zip::ZipWriter::new(file);
    let options = FileOptions::default().compression_method(zip::CompressionMethod::Deflated);

    for entry in WalkDir::new(root).min_depth(1).sort_by_file_name() {
        let entry = entry.with_context(|| format!("Failed to walk {}", root.display()))?;
        let rel = entry.path().strip_prefix(root).unwrap_or(entry.path());
        let name = rel.to_string_lossy().replace('\\', "/");

        if entry.file_type().is_dir() {
            writer
                .add_directory(format!("{name}/"), options)
                .with_context(|| format!("Failed to add directory {name}"))?;
        } else if entry.file_type().is_file() {
            let mut source = File::open(entry.path())
                .with_context(|| format!("Failed to open {}", entry.path().display()))?;
            writer
                .start_file(name.as_str(), options)
                .with_context(|| format!("Failed to start zip entry {name}"))?;
            io::copy(&mut source, &mut writer)
                .with_context(|| format!("Failed to add {} to zip", entry.path().display()))?;
        }
    }

    writer.finish().context("Failed to finalize zip archive")?;
    Ok(archive)
}
