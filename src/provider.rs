//! Producer trait for telemetry sources

use crate::Result;
use crate::config::SourceKind;
use crate::types::TelemetrySnapshot;

/// Outcome of one producer cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Production {
    /// The snapshot was written and should be published
    Updated,
    /// The cycle completed without touching the snapshot
    Unchanged,
}

/// A source that writes decoded telemetry into the session snapshot.
///
/// Exactly one producer runs per session. It is owned by the driver task,
/// which is the only writer of the snapshot. Each producer paces itself:
///
/// - Bus: waits for the next frame to arrive
/// - Stream: polls the ECU on a fixed interval
/// - Simulator: advances one step every 100 ms
///
/// An error describes one failed cycle. The driver counts it and calls
/// `produce` again; no cycle depends on the previous one succeeding.
#[async_trait::async_trait]
pub trait Producer: Send + 'static {
    /// Run one cycle against the snapshot.
    async fn produce(&mut self, snapshot: &mut TelemetrySnapshot) -> Result<Production>;

    /// Which kind of source this is, for the status badge.
    fn source_kind(&self) -> SourceKind;

    /// Successful cycles per second over the latest complete window.
    fn decode_rate(&self) -> f64;

    /// Nominal update rate in Hz; infinite for event-driven sources.
    fn tick_rate(&self) -> f64;
}

#[async_trait::async_trait]
impl<P: Producer + ?Sized> Producer for Box<P> {
    async fn produce(&mut self, snapshot: &mut TelemetrySnapshot) -> Result<Production> {
        (**self).produce(snapshot).await
    }

    fn source_kind(&self) -> SourceKind {
        (**self).source_kind()
    }

    fn decode_rate(&self) -> f64 {
        (**self).decode_rate()
    }

    fn tick_rate(&self) -> f64 {
        (**self).tick_rate()
    }
}
