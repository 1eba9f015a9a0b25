//! Byte progress shared between a copy task and its sampler.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// One observer-visible progress frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ProgressSnapshot {
    pub read: u64,
    pub total: u64,
}

impl ProgressSnapshot {
    /// The "filled" frame emitted once a transfer has completed,
    /// regardless of how many bytes were actually copied.
    pub fn complete(total: u64) -> Self {
        Self { read: total, total }
    }

    pub fn percent(&self) -> u16 {
        if self.total == 0 {
            return 0;
        }
        ((self.read.min(self.total) as f64 / self.total as f64) * 100.0) as u16
    }
}

/// Creates a counter split into its only writer and its only reader.
///
/// Neither half is `Clone`, so a second writer or reader cannot exist.
pub fn progress_counter() -> (ProgressWriter, ProgressReader) {
    let bytes = Arc::new(AtomicU64::new(0));
    (
        ProgressWriter {
            bytes: Arc::clone(&bytes),
        },
        ProgressReader { bytes },
    )
}

/// Held by the copy task.
#[derive(Debug)]
pub struct ProgressWriter {
    bytes: Arc<AtomicU64>,
}

impl ProgressWriter {
    pub fn add(&self, n: u64) {
        self.bytes.fetch_add(n, Ordering::Relaxed);
    }
}

/// Held by the sampler.
#[derive(Debug)]
pub struct ProgressReader {
    bytes: Arc<AtomicU64>,
}

impl ProgressReader {
    pub fn bytes_read(&self) -> u64 {
        self.bytes.load(Ordering::Relaxed)
    }

    /// Sample clamped to the declared size, so a sender that lies about
    /// its size never pushes the gauge past full.
    pub fn sample(&self, declared: u64) -> ProgressSnapshot {
        ProgressSnapshot {
            read: self.bytes_read().min(declared),
            total: declared,
        }
    }
}

/// Receives progress frames from a running transfer.
pub trait ProgressObserver: Send + Sync {
    fn on_progress(&self, snapshot: ProgressSnapshot);
}

/// Observer that keeps every frame; used by headless runs and tests.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    frames: Mutex<Vec<ProgressSnapshot>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frames(&self) -> Vec<ProgressSnapshot> {
        self.frames
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn last(&self) -> Option<ProgressSnapshot> {
        self.frames().last().copied()
    }
}

impl ProgressObserver for RecordingObserver {
    fn on_progress(&self, snapshot: ProgressSnapshot) {
        self.frames
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(snapshot);
    }
}
