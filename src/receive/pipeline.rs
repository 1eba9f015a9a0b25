//! The three receive procedures, one per transfer kind.
//!
//! Each procedure owns its handle through a [`HandleGuard`], so any early
//! return before the stream is taken rejects the offer exactly once.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio_util::sync::CancellationToken;

use super::copy::{monitored_copy, CopyError, CopyMonitor};
use super::extract::extract_archive;
use super::overwrite;
use crate::common::{AppConfig, CreateTarget, ProgressObserver, ProgressSnapshot, ReceiveError, TransferSettings};
use crate::transfer::{HandleGuard, TransferHandle, TransferKind};
use crate::utils::security::{normalize, validate_child_path};

/// What a successful session produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Received {
    File(PathBuf),
    Directory(PathBuf),
    Text(String),
}

/// The single terminal result of a session.
#[derive(Debug)]
pub enum SessionOutcome {
    Success(Received),
    /// The receiver declined the offer (existing destination).
    Rejected(ReceiveError),
    Error(ReceiveError),
    /// Nothing was attempted against the transfer client.
    NotAttempted,
}

impl SessionOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, SessionOutcome::Success(_))
    }

    pub fn error(&self) -> Option<&ReceiveError> {
        match self {
            SessionOutcome::Rejected(e) | SessionOutcome::Error(e) => Some(e),
            _ => None,
        }
    }

    fn from_result(result: Result<Received, ReceiveError>) -> Self {
        match result {
            Ok(received) => SessionOutcome::Success(received),
            Err(e @ ReceiveError::OverwriteRefused { .. }) => SessionOutcome::Rejected(e),
            Err(e) => SessionOutcome::Error(e),
        }
    }
}

/// Where and how one transfer is stored.
#[derive(Debug, Clone)]
pub struct ReceiveOptions {
    pub save_dir: PathBuf,
    pub overwrite: bool,
    pub sample_interval: Duration,
    /// Hold after the final progress frame so the full gauge is visible.
    pub settle_delay: Duration,
    /// Hold before a text message is shown.
    pub text_delay: Duration,
}

impl ReceiveOptions {
    pub fn new(save_dir: impl Into<PathBuf>) -> Self {
        Self::with_timing(save_dir.into(), false, &TransferSettings::default())
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::with_timing(config.resolved_save_dir(), config.overwrite, &config.transfer)
    }

    fn with_timing(save_dir: PathBuf, overwrite: bool, timing: &TransferSettings) -> Self {
        Self {
            save_dir,
            overwrite,
            sample_interval: timing.sample_interval(),
            settle_delay: timing.settle_delay(),
            text_delay: timing.text_delay(),
        }
    }

    pub fn overwrite(mut self, allowed: bool) -> Self {
        self.overwrite = allowed;
        self
    }

    /// Drop both holds; progress is still sampled at `sample_interval`.
    pub fn without_delays(mut self) -> Self {
        self.settle_delay = Duration::ZERO;
        self.text_delay = Duration::ZERO;
        self
    }
}

/// Store one offer and report exactly one outcome.
pub async fn receive(
    options: &ReceiveOptions,
    handle: Box<dyn TransferHandle>,
    observer: &dyn ProgressObserver,
    cancel: &CancellationToken,
) -> SessionOutcome {
    let kind = handle.kind();
    let offer = Offer {
        name: handle.name().to_string(),
        declared: handle.declared_size(),
    };
    tracing::info!(%kind, name = %offer.name, size = offer.declared, "receiving");

    let guard = HandleGuard::new(handle);
    let result = match absolute_save_dir(&options.save_dir) {
        Ok(save_dir) => match kind {
            TransferKind::Text => receive_text(options, guard, cancel).await,
            TransferKind::File => {
                receive_file(options, &save_dir, &offer, guard, observer, cancel).await
            }
            TransferKind::Directory => {
                receive_directory(options, &save_dir, &offer, guard, observer, cancel).await
            }
        },
        Err(e) => Err(e),
    };

    match &result {
        Ok(received) => tracing::info!(?received, "transfer complete"),
        Err(ReceiveError::Cancelled) => tracing::info!("transfer cancelled"),
        Err(e) => tracing::error!(kind = e.kind(), error = %e, "transfer failed"),
    }
    SessionOutcome::from_result(result)
}

struct Offer {
    name: String,
    declared: u64,
}

impl Offer {
    fn monitor<'a>(&self, options: &ReceiveOptions, observer: &'a dyn ProgressObserver) -> CopyMonitor<'a> {
        CopyMonitor {
            declared: self.declared,
            interval: options.sample_interval,
            observer,
        }
    }

    fn copy_error(&self, err: CopyError) -> ReceiveError {
        match err {
            CopyError::Io(source) => ReceiveError::copy(self.name.as_str(), source),
            CopyError::Cancelled => ReceiveError::Cancelled,
        }
    }

    fn destination(&self, save_dir: &Path) -> Result<PathBuf, ReceiveError> {
        validate_child_path(save_dir, &self.name).map_err(|reason| {
            tracing::warn!(name = %self.name, %reason, "refusing transfer name");
            ReceiveError::UnsafeEntryPath {
                entry: self.name.clone(),
            }
        })
    }
}

fn absolute_save_dir(dir: &Path) -> Result<PathBuf, ReceiveError> {
    if dir.is_absolute() {
        return Ok(normalize(dir));
    }
    let cwd = std::env::current_dir().map_err(|e| ReceiveError::create(CreateTarget::Dir, dir, e))?;
    Ok(normalize(&cwd.join(dir)))
}

async fn pause(duration: Duration, cancel: &CancellationToken) -> Result<(), ReceiveError> {
    if duration.is_zero() {
        return Ok(());
    }
    tokio::select! {
        _ = tokio::time::sleep(duration) => Ok(()),
        _ = cancel.cancelled() => Err(ReceiveError::Cancelled),
    }
}

async fn receive_text(
    options: &ReceiveOptions,
    guard: HandleGuard,
    cancel: &CancellationToken,
) -> Result<Received, ReceiveError> {
    let mut stream = guard.accept();
    let mut bytes = Vec::new();

    tokio::select! {
        read = stream.read_to_end(&mut bytes) => {
            read.map_err(|e| ReceiveError::copy("message", e))?;
        }
        _ = cancel.cancelled() => return Err(ReceiveError::Cancelled),
    }
    tracing::debug!(len = bytes.len(), "message read");

    pause(options.text_delay, cancel).await?;
    Ok(Received::Text(String::from_utf8_lossy(&bytes).into_owned()))
}

async fn receive_file(
    options: &ReceiveOptions,
    save_dir: &Path,
    offer: &Offer,
    guard: HandleGuard,
    observer: &dyn ProgressObserver,
    cancel: &CancellationToken,
) -> Result<Received, ReceiveError> {
    let path = offer.destination(save_dir)?;

    if let Err(refused) = overwrite::check(&path, options.overwrite) {
        guard.reject();
        return Err(refused);
    }
    if cancel.is_cancelled() {
        guard.reject();
        return Err(ReceiveError::Cancelled);
    }
    let file = overwrite::create_file(&path, options.overwrite).await?;

    let stream = guard.accept();
    let (copied, _file) = monitored_copy(stream, file, offer.monitor(options, observer), cancel)
        .await
        .map_err(|e| offer.copy_error(e))?;
    tracing::debug!(copied, path = %path.display(), "file written");

    observer.on_progress(ProgressSnapshot::complete(offer.declared));
    pause(options.settle_delay, cancel).await?;
    Ok(Received::File(path))
}

async fn receive_directory(
    options: &ReceiveOptions,
    save_dir: &Path,
    offer: &Offer,
    guard: HandleGuard,
    observer: &dyn ProgressObserver,
    cancel: &CancellationToken,
) -> Result<Received, ReceiveError> {
    let dest = offer.destination(save_dir)?;

    if let Err(refused) = overwrite::check(&dest, options.overwrite) {
        guard.reject();
        return Err(refused);
    }
    if cancel.is_cancelled() {
        guard.reject();
        return Err(ReceiveError::Cancelled);
    }
    overwrite::create_dir(&dest).await?;

    // removed on drop, whichever way this function exits
    let stem = dest
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let spool = tempfile::Builder::new()
        .prefix(&format!("{stem}.zip."))
        .suffix(".tmp")
        .tempfile_in(save_dir)
        .map_err(|e| ReceiveError::create(CreateTarget::Temp, save_dir, e))?;
    let sink = spool
        .reopen()
        .map_err(|e| ReceiveError::create(CreateTarget::Temp, spool.path(), e))?;

    let stream = guard.accept();
    let (copied, sink) = monitored_copy(
        stream,
        tokio::fs::File::from_std(sink),
        offer.monitor(options, observer),
        cancel,
    )
    .await
    .map_err(|e| offer.copy_error(e))?;
    drop(sink);
    tracing::debug!(copied, archive = %spool.path().display(), "archive spooled");

    let extract_dest = dest.clone();
    let extract_cancel = cancel.clone();
    let written = tokio::task::spawn_blocking(move || {
        let archive = spool
            .reopen()
            .map_err(|e| ReceiveError::ArchiveUnreadable(e.to_string()))?;
        let result = extract_archive(archive, &extract_dest, &extract_cancel);
        drop(spool);
        result
    })
    .await
    .map_err(|e| ReceiveError::ArchiveUnreadable(format!("extraction stopped: {e}")))??;
    tracing::debug!(entries = written, dest = %dest.display(), "archive extracted");

    observer.on_progress(ProgressSnapshot::complete(offer.declared));
    pause(options.settle_delay, cancel).await?;
    Ok(Received::Directory(dest))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::progress::RecordingObserver;
    use crate::transfer::MemoryOffer;

    fn options(dir: &Path) -> ReceiveOptions {
        let mut options = ReceiveOptions::new(dir).without_delays();
        options.sample_interval = Duration::from_millis(1);
        options
    }

    #[test]
    fn overwrite_refusal_is_a_rejection() {
        let outcome = SessionOutcome::from_result(Err(ReceiveError::OverwriteRefused {
            path: "/tmp/x".into(),
        }));
        assert!(matches!(outcome, SessionOutcome::Rejected(_)));

        let outcome = SessionOutcome::from_result(Err(ReceiveError::Cancelled));
        assert!(matches!(outcome, SessionOutcome::Error(ReceiveError::Cancelled)));
    }

    #[tokio::test]
    async fn text_is_returned_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let outcome = receive(
            &options(dir.path()),
            Box::new(MemoryOffer::text("héllo\nworld").into_handle()),
            &RecordingObserver::new(),
            &CancellationToken::new(),
        )
        .await;

        match outcome {
            SessionOutcome::Success(Received::Text(text)) => assert_eq!(text, "héllo\nworld"),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn hostile_top_level_name_is_refused_before_accept() {
        let dir = tempfile::tempdir().unwrap();
        let offer = MemoryOffer::file("../escape.bin", vec![1u8; 10]);
        let probe = offer.probe();

        let outcome = receive(
            &options(dir.path()),
            Box::new(offer.into_handle()),
            &RecordingObserver::new(),
            &CancellationToken::new(),
        )
        .await;

        assert!(matches!(
            outcome,
            SessionOutcome::Error(ReceiveError::UnsafeEntryPath { .. })
        ));
        assert!(!probe.accepted());
        assert_eq!(probe.rejections(), 1);
    }

    #[tokio::test]
    async fn copy_failure_leaves_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let offer = MemoryOffer::file("big.iso", vec![9u8; 4096]).chunk(256).fail_at(1024);

        let outcome = receive(
            &options(dir.path()),
            Box::new(offer.into_handle()),
            &RecordingObserver::new(),
            &CancellationToken::new(),
        )
        .await;

        match outcome {
            SessionOutcome::Error(ReceiveError::CopyFailed { name, .. }) => assert_eq!(name, "big.iso"),
            other => panic!("unexpected outcome: {other:?}"),
        }
        let partial = std::fs::metadata(dir.path().join("big.iso")).unwrap();
        assert!(partial.len() <= 1024);
    }
}
