//! Copy a stream into a sink on a background task while the caller samples
//! progress on a fixed period.

use std::io;
use std::pin::Pin;
use std::task::{ready, Context, Poll};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, ReadBuf};
use tokio::sync::oneshot;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::common::progress::{progress_counter, ProgressObserver, ProgressWriter};

#[derive(Debug)]
pub enum CopyError {
    Io(io::Error),
    Cancelled,
}

/// Sampling parameters for one copy.
pub struct CopyMonitor<'a> {
    pub declared: u64,
    pub interval: Duration,
    pub observer: &'a dyn ProgressObserver,
}

/// Reader that bumps the progress counter by every byte it hands out.
struct CountingReader<R> {
    inner: R,
    progress: ProgressWriter,
}

impl<R: AsyncRead + Unpin> AsyncRead for CountingReader<R> {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let before = buf.filled().len();
        ready!(Pin::new(&mut self.inner).poll_read(cx, buf))?;
        self.progress.add((buf.filled().len() - before) as u64);
        Poll::Ready(Ok(()))
    }
}

async fn copy_and_flush<R, W>(source: &mut R, sink: &mut W) -> io::Result<u64>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let n = tokio::io::copy(source, sink).await?;
    sink.flush().await?;
    Ok(n)
}

/// Copy `source` into `sink` and hand the sink back with the byte count.
///
/// The copy runs on its own task and is the only writer of the counter.
/// This function is the sampler: the only reader, waking every
/// `monitor.interval` to emit a snapshot clamped to the declared size,
/// and the only consumer of the completion signal. It emits no final
/// "filled" frame; callers do that once their own work is done.
pub async fn monitored_copy<R, W>(
    source: R,
    sink: W,
    monitor: CopyMonitor<'_>,
    cancel: &CancellationToken,
) -> Result<(u64, W), CopyError>
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (writer, reader) = progress_counter();
    let (done_tx, mut done_rx) = oneshot::channel::<Result<(u64, W), CopyError>>();
    let copy_cancel = cancel.clone();

    tokio::spawn(async move {
        let mut source = CountingReader {
            inner: source,
            progress: writer,
        };
        let mut sink = sink;

        let copied = tokio::select! {
            result = copy_and_flush(&mut source, &mut sink) => Some(result),
            _ = copy_cancel.cancelled() => None,
        };
        let result = match copied {
            Some(Ok(n)) => Ok((n, sink)),
            Some(Err(e)) => {
                // keep whatever already reached the sink
                let _ = sink.flush().await;
                Err(CopyError::Io(e))
            }
            None => Err(CopyError::Cancelled),
        };
        let _ = done_tx.send(result);
    });

    let mut ticker = interval(monitor.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            done = &mut done_rx => {
                return done.unwrap_or_else(|_| {
                    Err(CopyError::Io(io::Error::other("copy task ended without a result")))
                });
            }
            _ = ticker.tick() => {
                let snapshot = reader.sample(monitor.declared);
                tracing::trace!(read = snapshot.read, total = snapshot.total, "progress sample");
                monitor.observer.on_progress(snapshot);
            }
        }
    }
}
