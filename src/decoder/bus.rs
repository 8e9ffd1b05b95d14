//! Frame-addressed bus decoder

use tokio::time::Instant;
use tracing::{trace, warn};

use crate::diagnostics::DecodeRate;
use crate::schema::BusLayout;
use crate::transport::BusTransport;
use crate::types::{TelemetrySnapshot, TransportFrame};
use crate::{Result, TelemetryError};

/// Decodes broadcast frames into the snapshot.
///
/// Frames are stateless: each recognized identifier carries everything
/// needed to decode its fields, so there is nothing to resynchronize after a
/// missed or corrupted frame.
#[derive(Debug, Clone)]
pub struct BusFrameDecoder {
    layout: BusLayout,
    rate: DecodeRate,
    decoded: u64,
    ignored: u64,
}

impl Default for BusFrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl BusFrameDecoder {
    pub fn new() -> Self {
        Self::with_layout(BusLayout::standard())
    }

    /// Decoder over a custom table. Overlapping rules are logged, not rejected.
    pub fn with_layout(layout: BusLayout) -> Self {
        for (identifier, collision) in layout.collisions() {
            warn!(
                first = ?collision.first,
                second = ?collision.second,
                byte = collision.byte,
                "Frame {:#05x} has decode rules reading overlapping bytes",
                identifier
            );
        }
        Self { layout, rate: DecodeRate::new(), decoded: 0, ignored: 0 }
    }

    pub fn layout(&self) -> &BusLayout {
        &self.layout
    }

    /// Decode one frame. Returns whether the snapshot was written.
    pub fn decode(&mut self, frame: &TransportFrame, snapshot: &mut TelemetrySnapshot) -> bool {
        self.decode_at(frame, snapshot, Instant::now())
    }

    /// Decode one frame, stamping updated signals with `now`.
    ///
    /// Unrecognized identifiers leave the snapshot and its version alone.
    /// Fields whose bytes are missing from a short payload are skipped while
    /// the rest of the frame still applies.
    pub fn decode_at(
        &mut self,
        frame: &TransportFrame,
        snapshot: &mut TelemetrySnapshot,
        now: Instant,
    ) -> bool {
        let identifier = frame.standard_id();
        let Some(message) = self.layout.lookup(identifier) else {
            self.ignored += 1;
            trace!("Ignoring unknown frame {:#05x}", identifier);
            return false;
        };

        let payload = frame.payload();
        let mut updates = Vec::with_capacity(message.fields.len());
        for field in &message.fields {
            match field.extract(payload) {
                Ok(value) => updates.push((field.signal, value)),
                Err(e) => trace!(
                    frame = message.name,
                    signal = ?field.signal,
                    len = payload.len(),
                    "Skipping field: {}",
                    e
                ),
            }
        }

        if updates.is_empty() {
            self.ignored += 1;
            return false;
        }

        snapshot.apply(updates, now);
        self.decoded += 1;
        self.rate.record(now);
        true
    }

    /// Receive and decode the next waiting frame, if any.
    ///
    /// `Ok(false)` covers both "nothing waiting" and "frame not recognized".
    pub fn receive<T>(&mut self, transport: &mut T, snapshot: &mut TelemetrySnapshot) -> Result<bool>
    where
        T: BusTransport + ?Sized,
    {
        if !transport.available() {
            return Ok(false);
        }
        let frame =
            transport.receive().map_err(|e| TelemetryError::transport_read("bus receive", e))?;
        Ok(self.decode(&frame, snapshot))
    }

    /// Frames decoded per wall-clock second.
    pub fn decode_rate(&self) -> f64 {
        self.decode_rate_at(Instant::now())
    }

    /// Frames decoded per second as seen at `now`; falls to 0 on a silent bus.
    pub fn decode_rate_at(&self, now: Instant) -> f64 {
        self.rate.per_second_at(now)
    }

    pub fn frames_decoded(&self) -> u64 {
        self.decoded
    }

    pub fn frames_ignored(&self) -> u64 {
        self.ignored
    }
}
