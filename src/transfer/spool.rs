//! Local transfer client. A sender leaves one entry in `<spool>/<code>/`:
//! `message.txt` is sent as a text message, a directory is zipped on the
//! fly, anything else goes out as a single file.

use std::io;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::task::{Context, Poll};

use async_trait::async_trait;
use tokio::fs::File;
use tokio::io::{AsyncRead, ReadBuf};

use super::archive::{pack_directory, TempArchive};
use super::{TransferClient, TransferCode, TransferHandle, TransferKind, TransferStream};
use crate::common::ReceiveError;
use crate::utils::security::validate_component;

pub const MESSAGE_FILE: &str = "message.txt";

pub struct SpoolClient {
    root: PathBuf,
}

impl SpoolClient {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    async fn single_entry(&self, offer_dir: &Path) -> io::Result<Option<PathBuf>> {
        let mut entries = tokio::fs::read_dir(offer_dir).await?;
        let Some(first) = entries.next_entry().await? else {
            return Ok(None);
        };
        if entries.next_entry().await?.is_some() {
            return Ok(None);
        }
        Ok(Some(first.path()))
    }

    async fn open_offer(&self, entry: PathBuf) -> io::Result<SpoolHandle> {
        let name = entry
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let meta = tokio::fs::metadata(&entry).await?;

        if meta.is_dir() {
            let source = entry.clone();
            let archive = tokio::task::spawn_blocking(move || pack_directory(&source))
                .await
                .map_err(io::Error::other)?
                .map_err(io::Error::other)?;
            let file = File::open(archive.path()).await?;
            let declared_size = file.metadata().await?.len();
            return Ok(SpoolHandle {
                kind: TransferKind::Directory,
                name,
                declared_size,
                source: SpoolSource::Archive(ArchiveStream {
                    file,
                    _archive: archive,
                }),
            });
        }

        let kind = if name == MESSAGE_FILE {
            TransferKind::Text
        } else {
            TransferKind::File
        };
        Ok(SpoolHandle {
            kind,
            name: if kind == TransferKind::Text { String::new() } else { name },
            declared_size: meta.len(),
            source: SpoolSource::File(File::open(&entry).await?),
        })
    }
}

#[async_trait]
impl TransferClient for SpoolClient {
    async fn receive(&self, code: &TransferCode) -> Result<Box<dyn TransferHandle>, ReceiveError> {
        validate_component(code.as_str())
            .map_err(|e| ReceiveError::ReceiveFailed(format!("invalid code {code}: {e}")))?;

        let offer_dir = self.root.join(code.as_str());
        tracing::debug!(dir = %offer_dir.display(), "looking for spooled offer");

        let entry = match self.single_entry(&offer_dir).await {
            Ok(Some(entry)) => entry,
            Ok(None) => {
                return Err(ReceiveError::ReceiveFailed(format!(
                    "offer for {code} must contain exactly one entry"
                )))
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(ReceiveError::ReceiveFailed(format!(
                    "no transfer waiting for code {code}"
                )))
            }
            Err(e) => return Err(ReceiveError::ReceiveFailed(e.to_string())),
        };

        let handle = self
            .open_offer(entry)
            .await
            .map_err(|e| ReceiveError::ReceiveFailed(e.to_string()))?;
        tracing::info!(kind = %handle.kind, name = %handle.name, size = handle.declared_size, "offer found");
        Ok(Box::new(handle))
    }
}

struct SpoolHandle {
    kind: TransferKind,
    name: String,
    declared_size: u64,
    source: SpoolSource,
}

enum SpoolSource {
    File(File),
    Archive(ArchiveStream),
}

impl TransferHandle for SpoolHandle {
    fn kind(&self) -> TransferKind {
        self.kind
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn declared_size(&self) -> u64 {
        self.declared_size
    }

    fn accept(self: Box<Self>) -> TransferStream {
        match self.source {
            SpoolSource::File(file) => Box::new(file),
            SpoolSource::Archive(stream) => Box::new(stream),
        }
    }

    fn reject(self: Box<Self>) {
        tracing::info!(name = %self.name, "offer rejected, left in spool");
    }
}

/// Keeps the packed archive on disk until the stream is dropped.
struct ArchiveStream {
    file: File,
    _archive: TempArchive,
}

impl AsyncRead for ArchiveStream {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.file).poll_read(cx, buf)
    }
}
