//! Driver spawns and manages the decode task

use std::sync::Arc;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::TelemetryError;
use crate::diagnostics::DecoderStats;
use crate::provider::{Producer, Production};
use crate::types::TelemetrySnapshot;

/// Result of spawning the decode task
pub struct DriverChannels {
    /// Latest published snapshot
    pub snapshots: watch::Receiver<Arc<TelemetrySnapshot>>,
    /// Decode counters, republished after every cycle
    pub stats: watch::Receiver<DecoderStats>,
    /// Cancellation token for graceful shutdown
    pub cancel: CancellationToken,
}

/// Driver spawns the decode task
///
/// The task owns the producer and the only writable snapshot. After each
/// cycle that updates the snapshot it publishes an immutable copy, so
/// readers never observe a half-applied batch.
pub struct Driver;

impl Driver {
    /// Spawn the decode task for the given producer
    pub fn spawn<P>(producer: P) -> DriverChannels
    where
        P: Producer,
    {
        let cancel = CancellationToken::new();
        Self::spawn_with_cancel(producer, cancel)
    }

    /// Spawn under an existing cancellation token
    pub fn spawn_with_cancel<P>(producer: P, cancel: CancellationToken) -> DriverChannels
    where
        P: Producer,
    {
        let (snapshot_tx, snapshot_rx) = watch::channel(Arc::new(TelemetrySnapshot::new()));
        let (stats_tx, stats_rx) = watch::channel(DecoderStats::default());

        let cancel_task = cancel.clone();
        tokio::spawn(async move {
            Self::decode_task(producer, snapshot_tx, stats_tx, cancel_task).await;
        });

        DriverChannels { snapshots: snapshot_rx, stats: stats_rx, cancel }
    }

    async fn decode_task<P>(
        mut producer: P,
        snapshot_tx: watch::Sender<Arc<TelemetrySnapshot>>,
        stats_tx: watch::Sender<DecoderStats>,
        cancel: CancellationToken,
    ) where
        P: Producer,
    {
        let source = producer.source_kind();
        info!(%source, "Decode task started");
        let mut snapshot = TelemetrySnapshot::new();
        let mut stats = DecoderStats::default();

        loop {
            let result = tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Decode task cancelled");
                    break;
                }
                result = producer.produce(&mut snapshot) => result,
            };

            match result {
                Ok(Production::Updated) => {
                    stats.updates += 1;
                    stats.snapshot_version = snapshot.version();
                    stats.decode_rate_hz = producer.decode_rate();
                    trace!(version = snapshot.version(), "Publishing snapshot");

                    if snapshot_tx.send(Arc::new(snapshot.clone())).is_err() {
                        debug!("Snapshot receivers dropped, shutting down");
                        break;
                    }
                    stats_tx.send_replace(stats.clone());
                }
                Ok(Production::Unchanged) => {
                    stats.idle_cycles += 1;
                    // lets a silent source report its rate falling
                    stats.decode_rate_hz = producer.decode_rate();
                    stats_tx.send_replace(stats.clone());
                }
                Err(e) => {
                    stats.record_error(&e);
                    stats.decode_rate_hz = producer.decode_rate();
                    match &e {
                        TelemetryError::TransportTimeout { .. } => {
                            debug!(timeouts = stats.timeouts, "Poll timed out: {}", e)
                        }
                        _ => warn!(errors = stats.total_errors(), "Decode cycle failed: {}", e),
                    }
                    stats_tx.send_replace(stats.clone());
                }
            }
        }

        info!(
            updates = stats.updates,
            errors = stats.total_errors(),
            "Decode task ended"
        );
    }
}
