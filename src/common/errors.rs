//! Terminal failures of a receive session.
//!
//! `Display` of every variant is the notice shown to the user, so the
//! wording here is user-facing.

use std::fmt;
use std::io;
use std::path::PathBuf;

/// What a failed create was trying to make.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateTarget {
    File,
    Dir,
    Temp,
}

impl fmt::Display for CreateTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CreateTarget::File => write!(f, "file"),
            CreateTarget::Dir => write!(f, "directory"),
            CreateTarget::Temp => write!(f, "temporary file"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ReceiveError {
    #[error("No wormhole code found!")]
    CodeEmpty,

    #[error("Error: {0}")]
    ReceiveFailed(String),

    #[error("{} exists. Will not overwrite.", path.display())]
    OverwriteRefused { path: PathBuf },

    #[error("Error creating {target} {}: {source}", path.display())]
    CreateFailed {
        target: CreateTarget,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Error transferring {name}: {source}")]
    CopyFailed {
        name: String,
        #[source]
        source: io::Error,
    },

    #[error("Error reading archive: {0}")]
    ArchiveUnreadable(String),

    #[error("Dangerous filename found: {entry}")]
    UnsafeEntryPath { entry: String },

    #[error("Error opening: {command}: {detail}")]
    OpenCommandFailed { command: String, detail: String },

    #[error("Transfer cancelled")]
    Cancelled,
}

impl ReceiveError {
    /// Short machine-friendly tag used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            ReceiveError::CodeEmpty => "code_empty",
            ReceiveError::ReceiveFailed(_) => "receive_failed",
            ReceiveError::OverwriteRefused { .. } => "overwrite_refused",
            ReceiveError::CreateFailed { .. } => "create_failed",
            ReceiveError::CopyFailed { .. } => "copy_failed",
            ReceiveError::ArchiveUnreadable(_) => "archive_unreadable",
            ReceiveError::UnsafeEntryPath { .. } => "unsafe_entry_path",
            ReceiveError::OpenCommandFailed { .. } => "open_command_failed",
            ReceiveError::Cancelled => "cancelled",
        }
    }

    pub(crate) fn create(target: CreateTarget, path: impl Into<PathBuf>, source: io::Error) -> Self {
        ReceiveError::CreateFailed {
            target,
            path: path.into(),
            source,
        }
    }

    pub(crate) fn copy(name: impl Into<String>, source: io::Error) -> Self {
        ReceiveError::CopyFailed {
            name: name.into(),
            source,
        }
    }
}

impl From<zip::result::ZipError> for ReceiveError {
    fn from(err: zip::result::ZipError) -> Self {
        ReceiveError::ArchiveUnreadable(err.to_string())
    }
}
