//! Receive and transmit pumps.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::task::JoinHandle;

use crate::core::constants::DRIVE_CHUNK_SIZE;
use crate::core::{FrameObserver, LinkResult};
use crate::engine::Link;

/// Upper bound on how long the transmit pump sleeps between checks.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Shortest sleep of the transmit pump.
const MIN_SLEEP: Duration = Duration::from_millis(1);

/// Feed everything `reader` produces into the link.
///
/// Returns `Ok(())` at end of stream.
pub async fn run_rx<O, R>(link: Arc<Link<O>>, mut reader: R) -> LinkResult<()>
where
    O: FrameObserver,
    R: AsyncRead + Unpin,
{
    let mut buf = [0u8; DRIVE_CHUNK_SIZE];
    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            tracing::debug!("rx stream closed");
            return Ok(());
        }
        link.on_rx_data(&buf[..n]);
    }
}

/// Write the link's outgoing bytes to `writer`.
///
/// Sleeps until the next link deadline, at most `poll_interval`, whenever
/// there is nothing to send. Runs until the writer fails.
pub async fn run_tx<O, W>(link: Arc<Link<O>>, mut writer: W, poll_interval: Duration) -> LinkResult<()>
where
    O: FrameObserver,
    W: AsyncWrite + Unpin,
{
    let mut buf = vec![0u8; link.config().max_wire_size()];
    loop {
        let n = link.get_tx_data(&mut buf);
        if n > 0 {
            writer.write_all(&buf[..n]).await?;
            writer.flush().await?;
            continue;
        }

        let now = Instant::now();
        let sleep = link
            .next_deadline_at(now)
            .map_or(poll_interval, |deadline| {
                deadline.saturating_duration_since(now).min(poll_interval)
            })
            .max(MIN_SLEEP);
        tokio::time::sleep(sleep).await;
    }
}

/// Handles of a spawned pump pair.
#[derive(Debug)]
pub struct PumpHandles {
    /// Receive pump task.
    pub rx: JoinHandle<LinkResult<()>>,
    /// Transmit pump task.
    pub tx: JoinHandle<LinkResult<()>>,
}

impl PumpHandles {
    /// Stop both pumps.
    pub fn abort(&self) {
        self.rx.abort();
        self.tx.abort();
    }

    /// Check if both pumps have stopped.
    pub fn is_finished(&self) -> bool {
        self.rx.is_finished() && self.tx.is_finished()
    }
}

/// Spawn rx and tx pumps over one duplex byte stream.
pub fn spawn<O, T>(link: Arc<Link<O>>, io: T) -> PumpHandles
where
    O: FrameObserver + 'static,
    T: AsyncRead + AsyncWrite + Send + 'static,
{
    spawn_with_interval(link, io, DEFAULT_POLL_INTERVAL)
}

/// [`spawn`] with a custom transmit poll interval.
pub fn spawn_with_interval<O, T>(link: Arc<Link<O>>, io: T, poll_interval: Duration) -> PumpHandles
where
    O: FrameObserver + 'static,
    T: AsyncRead + AsyncWrite + Send + 'static,
{
    let (reader, writer) = tokio::io::split(io);
    PumpHandles {
        rx: tokio::spawn(run_rx(Arc::clone(&link), reader)),
        tx: tokio::spawn(run_tx(link, writer, poll_interval)),
    }
}
