//! Contract with the secure-channel side: a client turns a code into one
//! incoming offer.

pub mod archive;
pub mod memory;
pub mod spool;

use std::fmt;

use async_trait::async_trait;
use tokio::io::AsyncRead;

use crate::common::ReceiveError;

pub use memory::{MemoryClient, MemoryOffer};
pub use spool::SpoolClient;

/// Byte stream of an accepted offer.
pub type TransferStream = Box<dyn AsyncRead + Send + Unpin>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransferKind {
    File,
    Directory,
    Text,
}

impl fmt::Display for TransferKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferKind::File => write!(f, "file"),
            TransferKind::Directory => write!(f, "directory"),
            TransferKind::Text => write!(f, "message"),
        }
    }
}

/// Non-empty, trimmed one-time code.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransferCode(String);

impl TransferCode {
    pub fn parse(raw: &str) -> Result<Self, ReceiveError> {
        let code = raw.trim();
        if code.is_empty() {
            return Err(ReceiveError::CodeEmpty);
        }
        Ok(Self(code.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TransferCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One incoming offer. `accept` and `reject` both consume the handle, so
/// neither can happen twice.
pub trait TransferHandle: Send {
    fn kind(&self) -> TransferKind;
    fn name(&self) -> &str;
    fn declared_size(&self) -> u64;

    /// Take the stream; the sender starts transmitting.
    fn accept(self: Box<Self>) -> TransferStream;

    /// Refuse the offer without opening its stream.
    fn reject(self: Box<Self>);
}

#[async_trait]
pub trait TransferClient: Send + Sync {
    async fn receive(&self, code: &TransferCode) -> Result<Box<dyn TransferHandle>, ReceiveError>;
}

/// Owns a handle until it is accepted; rejects it on drop otherwise.
pub struct HandleGuard {
    handle: Option<Box<dyn TransferHandle>>,
}

impl HandleGuard {
    pub fn new(handle: Box<dyn TransferHandle>) -> Self {
        Self {
            handle: Some(handle),
        }
    }

    pub fn accept(mut self) -> TransferStream {
        match self.handle.take() {
            Some(handle) => handle.accept(),
            // only reachable through a second accept, which `self` by value forbids
            None => Box::new(tokio::io::empty()),
        }
    }

    pub fn reject(mut self) {
        if let Some(handle) = self.handle.take() {
            handle.reject();
        }
    }
}

impl Drop for HandleGuard {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            tracing::debug!(name = handle.name(), "rejecting abandoned transfer");
            handle.reject();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_is_trimmed_and_required() {
        assert!(matches!(TransferCode::parse(""), Err(ReceiveError::CodeEmpty)));
        assert!(matches!(TransferCode::parse("  \n"), Err(ReceiveError::CodeEmpty)));
        assert_eq!(
            TransferCode::parse(" 7-guitarist-revenge ").unwrap().as_str(),
            "7-guitarist-revenge"
        );
    }

    #[test]
    fn dropping_guard_rejects_once() {
        let offer = MemoryOffer::file("a.bin", b"abc".to_vec());
        let probe = offer.probe();

        drop(HandleGuard::new(Box::new(offer.into_handle())));

        assert_eq!(probe.rejections(), 1);
        assert!(!probe.accepted());
    }

    #[test]
    fn accepted_guard_does_not_reject() {
        let offer = MemoryOffer::file("a.bin", b"abc".to_vec());
        let probe = offer.probe();

        let _stream = HandleGuard::new(Box::new(offer.into_handle())).accept();

        assert_eq!(probe.rejections(), 0);
        assert!(probe.accepted());
    }
}
