//! In-memory client: serves prepared offers and records what the receiver
//! did with them.

use std::collections::HashMap;
use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use async_trait::async_trait;
use tokio::io::{AsyncRead, ReadBuf};

use super::{TransferClient, TransferCode, TransferHandle, TransferKind, TransferStream};
use crate::common::ReceiveError;

const DEFAULT_CHUNK: usize = 16 * 1024;

#[derive(Debug, Default)]
struct ProbeState {
    accepted: AtomicBool,
    rejections: AtomicUsize,
    bytes_read: AtomicU64,
}

/// Observes one offer after it has been handed out.
#[derive(Clone, Debug, Default)]
pub struct OfferProbe(Arc<ProbeState>);

impl OfferProbe {
    pub fn accepted(&self) -> bool {
        self.0.accepted.load(Ordering::SeqCst)
    }

    pub fn rejections(&self) -> usize {
        self.0.rejections.load(Ordering::SeqCst)
    }

    pub fn bytes_read(&self) -> u64 {
        self.0.bytes_read.load(Ordering::SeqCst)
    }
}

/// A prepared offer.
#[derive(Debug)]
pub struct MemoryOffer {
    kind: TransferKind,
    name: String,
    declared_size: u64,
    payload: Vec<u8>,
    chunk: usize,
    fail_at: Option<usize>,
    stall_at: Option<usize>,
    probe: OfferProbe,
}

impl MemoryOffer {
    fn new(kind: TransferKind, name: impl Into<String>, payload: Vec<u8>) -> Self {
        Self {
            kind,
            name: name.into(),
            declared_size: payload.len() as u64,
            payload,
            chunk: DEFAULT_CHUNK,
            fail_at: None,
            stall_at: None,
            probe: OfferProbe::default(),
        }
    }

    pub fn file(name: impl Into<String>, payload: Vec<u8>) -> Self {
        Self::new(TransferKind::File, name, payload)
    }

    /// `archive` is the zip the sender built from the directory.
    pub fn directory(name: impl Into<String>, archive: Vec<u8>) -> Self {
        Self::new(TransferKind::Directory, name, archive)
    }

    pub fn text(message: impl Into<String>) -> Self {
        Self::new(TransferKind::Text, "", message.into().into_bytes())
    }

    /// Announce a size different from the payload length.
    pub fn declared(mut self, size: u64) -> Self {
        self.declared_size = size;
        self
    }

    /// Largest slice handed out per read.
    pub fn chunk(mut self, chunk: usize) -> Self {
        self.chunk = chunk.max(1);
        self
    }

    /// Fail the stream once `offset` bytes have been delivered.
    pub fn fail_at(mut self, offset: usize) -> Self {
        self.fail_at = Some(offset);
        self
    }

    /// Stop delivering (without EOF) once `offset` bytes have been delivered.
    pub fn stall_at(mut self, offset: usize) -> Self {
        self.stall_at = Some(offset);
        self
    }

    pub fn probe(&self) -> OfferProbe {
        self.probe.clone()
    }

    pub fn into_handle(self) -> MemoryHandle {
        MemoryHandle { offer: self }
    }
}

pub struct MemoryHandle {
    offer: MemoryOffer,
}

impl TransferHandle for MemoryHandle {
    fn kind(&self) -> TransferKind {
        self.offer.kind
    }

    fn name(&self) -> &str {
        &self.offer.name
    }

    fn declared_size(&self) -> u64 {
        self.offer.declared_size
    }

    fn accept(self: Box<Self>) -> TransferStream {
        let offer = self.offer;
        offer.probe.0.accepted.store(true, Ordering::SeqCst);
        Box::new(ProbedReader {
            data: offer.payload,
            pos: 0,
            chunk: offer.chunk,
            fail_at: offer.fail_at,
            stall_at: offer.stall_at,
            probe: offer.probe,
        })
    }

    fn reject(self: Box<Self>) {
        self.offer.probe.0.rejections.fetch_add(1, Ordering::SeqCst);
    }
}

struct ProbedReader {
    data: Vec<u8>,
    pos: usize,
    chunk: usize,
    fail_at: Option<usize>,
    stall_at: Option<usize>,
    probe: OfferProbe,
}

impl AsyncRead for ProbedReader {
    fn poll_read(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = &mut *self;

        if this.fail_at == Some(this.pos) {
            return Poll::Ready(Err(io::Error::new(
                io::ErrorKind::ConnectionReset,
                "sender went away",
            )));
        }
        if this.stall_at == Some(this.pos) {
            // never woken: the reader is only released by dropping it
            return Poll::Pending;
        }

        let mut end = this.data.len().min(this.pos + this.chunk.min(buf.remaining()));
        for limit in [this.fail_at, this.stall_at].into_iter().flatten() {
            if limit > this.pos {
                end = end.min(limit);
            }
        }

        buf.put_slice(&this.data[this.pos..end]);
        this.probe
            .0
            .bytes_read
            .fetch_add((end - this.pos) as u64, Ordering::SeqCst);
        this.pos = end;
        Poll::Ready(Ok(()))
    }
}

/// Serves offers keyed by code; each offer can be received once.
#[derive(Default)]
pub struct MemoryClient {
    offers: Mutex<HashMap<String, MemoryOffer>>,
    calls: AtomicUsize,
}

impl MemoryClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_offer(self, code: &str, offer: MemoryOffer) -> Self {
        self.offers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(code.to_string(), offer);
        self
    }

    pub fn receive_calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TransferClient for MemoryClient {
    async fn receive(&self, code: &TransferCode) -> Result<Box<dyn TransferHandle>, ReceiveError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let offer = self
            .offers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(code.as_str());

        match offer {
            Some(offer) => Ok(Box::new(offer.into_handle())),
            None => Err(ReceiveError::ReceiveFailed(format!(
                "no transfer offered for code {code}"
            ))),
        }
    }
}
