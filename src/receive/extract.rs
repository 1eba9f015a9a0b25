//! Unpacking a received directory archive.

use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::Path;

use tokio_util::sync::CancellationToken;
use zip::ZipArchive;

use crate::common::{CreateTarget, ReceiveError};
use crate::utils::security::validate_entry_path;

/// Extract every entry of `archive` below `dest_dir`, in archive order.
///
/// The first entry that would land outside `dest_dir` stops extraction:
/// nothing is written for it or for any later entry. Blocking; run it on
/// the blocking pool.
pub fn extract_archive(
    archive: File,
    dest_dir: &Path,
    cancel: &CancellationToken,
) -> Result<usize, ReceiveError> {
    let mut zip = ZipArchive::new(archive)?;
    let mut written = 0;

    for index in 0..zip.len() {
        if cancel.is_cancelled() {
            return Err(ReceiveError::Cancelled);
        }

        let mut entry = zip.by_index(index)?;
        let name = entry.name().to_string();

        let target = validate_entry_path(dest_dir, &name).map_err(|reason| {
            tracing::warn!(entry = %name, %reason, "refusing archive entry");
            ReceiveError::UnsafeEntryPath {
                entry: name.clone(),
            }
        })?;

        if entry.is_dir() {
            fs::create_dir_all(&target)
                .map_err(|e| ReceiveError::create(CreateTarget::Dir, &target, e))?;
            continue;
        }

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| ReceiveError::create(CreateTarget::Dir, parent, e))?;
        }

        let mut out = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&target)
            .map_err(|e| ReceiveError::create(CreateTarget::File, &target, e))?;

        io::copy(&mut entry, &mut out).map_err(|e| ReceiveError::copy(name.as_str(), e))?;
        out.sync_all()
            .map_err(|e| ReceiveError::copy(name.as_str(), e))?;

        tracing::debug!(entry = %name, "extracted");
        written += 1;
    }

    Ok(written)
}
