//! Receiver task that decodes and acknowledges raw telemetry datagrams

use futures::{Stream, StreamExt};
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::packet::TelemetryPacket;
use super::source::PacketSource;

/// Running counters for a receiver
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReceiverStats {
    /// Datagrams pulled from the source
    pub received: u64,
    /// Datagrams that decoded into a packet
    pub decoded: u64,
    /// Datagrams rejected by the decoder
    pub rejected: u64,
}

/// Handle to a running receiver task
///
/// Dropping the handle cancels the task.
pub struct ReceiverHandle {
    stats: watch::Receiver<ReceiverStats>,
    cancel: CancellationToken,
}

impl ReceiverHandle {
    /// Latest counters
    pub fn stats(&self) -> ReceiverStats {
        *self.stats.borrow()
    }

    /// Counter updates as a stream, starting with the current value
    pub fn stats_updates(&self) -> impl Stream<Item = ReceiverStats> + 'static {
        WatchStream::new(self.stats.clone()).boxed()
    }

    /// Wait until the receiver task has finished (source ended or cancelled)
    pub async fn finished(&mut self) {
        // The sender is dropped when the task exits
        while self.stats.changed().await.is_ok() {}
    }

    /// Stop the receiver task
    pub fn stop(&self) {
        self.cancel.cancel();
    }
}

impl Drop for ReceiverHandle {
    fn drop(&mut self) {
        debug!("Dropping telemetry receiver handle");
        self.cancel.cancel();
    }
}

/// Spawns and manages the telemetry receive loop
///
/// Decoded packets are logged and counted; nothing is persisted or forwarded.
pub struct TelemetryReceiver;

impl TelemetryReceiver {
    /// Spawn the receive loop for the given source
    pub fn spawn<S>(source: S) -> ReceiverHandle
    where
        S: PacketSource,
    {
        let (stats_tx, stats_rx) = watch::channel(ReceiverStats::default());
        let cancel = CancellationToken::new();
        let cancel_task = cancel.clone();

        tokio::spawn(async move {
            Self::receive_task(source, stats_tx, cancel_task).await;
        });

        ReceiverHandle { stats: stats_rx, cancel }
    }

    async fn receive_task<S>(
        mut source: S,
        stats_tx: watch::Sender<ReceiverStats>,
        cancel: CancellationToken,
    ) where
        S: PacketSource,
    {
        info!(source = %source.describe(), "Telemetry receiver started");
        let mut stats = ReceiverStats::default();
        let mut error_count = 0u32;
        const MAX_ERRORS: u32 = 10;

        loop {
            let result = tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Telemetry receiver cancelled");
                    break;
                }
                result = source.next_datagram() => result,
            };

            match result {
                Ok(Some(datagram)) => {
                    error_count = 0;
                    stats.received += 1;

                    match TelemetryPacket::decode(&datagram.payload) {
                        Ok(packet) => {
                            stats.decoded += 1;
                            debug!(
                                origin = ?datagram.origin,
                                packet_id = packet.packet_id,
                                speed_kmh = packet.speed_kmh,
                                rpm = packet.rpm,
                                gear = packet.gear,
                                "Telemetry packet"
                            );
                        }
                        Err(e) => {
                            stats.rejected += 1;
                            debug!(origin = ?datagram.origin, "Rejected telemetry datagram: {}", e);
                        }
                    }

                    if stats_tx.send(stats).is_err() {
                        debug!("Stats receiver dropped, shutting down");
                        break;
                    }
                }
                Ok(None) => {
                    info!("Telemetry source ended after {} datagrams", stats.received);
                    break;
                }
                Err(e) => {
                    error_count += 1;
                    error!("Telemetry source error ({}/{}): {}", error_count, MAX_ERRORS, e);

                    if error_count >= MAX_ERRORS {
                        warn!("Too many telemetry source errors, shutting down");
                        break;
                    }

                    // Exponential backoff: 50ms, 100ms, 200ms, ...
                    let backoff = std::time::Duration::from_millis(50 * (1 << error_count.min(5)));
                    tokio::time::sleep(backoff).await;
                }
            }
        }

        info!(
            received = stats.received,
            decoded = stats.decoded,
            rejected = stats.rejected,
            "Telemetry receiver ended"
        );
    }
}
