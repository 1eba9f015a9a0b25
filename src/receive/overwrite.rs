//! Overwrite policy and the creates that back it.

use std::io;
use std::path::Path;

use tokio::fs::{File, OpenOptions};

use crate::common::{CreateTarget, ReceiveError};

/// Refuse when something already sits at `path` and overwriting is off.
///
/// Anything other than "not found" counts as existing, so an unreadable
/// parent also refuses. Dangling symlinks exist too.
pub fn check(path: &Path, overwrite_allowed: bool) -> Result<(), ReceiveError> {
    if overwrite_allowed {
        return Ok(());
    }
    match std::fs::symlink_metadata(path) {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        _ => Err(ReceiveError::OverwriteRefused {
            path: path.to_path_buf(),
        }),
    }
}

/// Create the destination file. Without overwrite this is `create_new`, so
/// a file that appeared after [`check`] still fails rather than being
/// clobbered.
pub async fn create_file(path: &Path, overwrite_allowed: bool) -> Result<File, ReceiveError> {
    let mut options = OpenOptions::new();
    options.write(true);
    if overwrite_allowed {
        options.create(true).truncate(true);
    } else {
        options.create_new(true);
    }

    options.open(path).await.map_err(|e| {
        if e.kind() == io::ErrorKind::AlreadyExists {
            ReceiveError::OverwriteRefused {
                path: path.to_path_buf(),
            }
        } else {
            ReceiveError::create(CreateTarget::File, path, e)
        }
    })
}

/// Create the destination directory; never merges into an existing one.
pub async fn create_dir(path: &Path) -> Result<(), ReceiveError> {
    tokio::fs::create_dir(path)
        .await
        .map_err(|e| ReceiveError::create(CreateTarget::Dir, path, e))
}
