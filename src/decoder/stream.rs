//! Polled byte-stream decoder
//!
//! One poll is a request/response exchange:
//!
//! 1. discard stale bytes left on the line
//! 2. send the request byte
//! 3. read the echo, reply marker and payload length
//! 4. read exactly that many payload bytes into the retained buffer
//!
//! A failed exchange never touches the retained buffer. Extraction is
//! separate so the caller decides when fields are interpreted.

use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, trace, warn};

use crate::PollError;
use crate::diagnostics::DecodeRate;
use crate::schema::{Cadence, REPLY_MARKER, REQUEST_BYTE, StreamLayout};
use crate::transport::StreamTransport;
use crate::types::{SignalId, TelemetrySnapshot};

/// Interval between transport checks while waiting for reply bytes.
const READ_POLL_STEP: Duration = Duration::from_millis(1);

/// Default refresh interval for slow-cadence fields.
pub const DEFAULT_SLOW_INTERVAL: Duration = Duration::from_millis(150);

/// Below this RPM slow fields refresh on every extraction.
pub const DEFAULT_LOW_RPM_THRESHOLD: f64 = 100.0;

const HEADER_LEN: usize = 3;

/// Request/response decoder for the byte-stream transport.
#[derive(Debug, Clone)]
pub struct StreamPollDecoder {
    layout: StreamLayout,
    /// Last accepted payload; bytes past the latest reply length stay stale
    buffer: Vec<u8>,
    scratch: Vec<u8>,
    slow_interval: Duration,
    low_rpm_threshold: f64,
    last_slow: Option<Instant>,
    /// A poll succeeded since the previous extraction
    pending: bool,
    rate: DecodeRate,
}

impl Default for StreamPollDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamPollDecoder {
    pub fn new() -> Self {
        Self::with_layout(StreamLayout::standard())
    }

    /// Decoder over a custom table. Overlapping rules are logged, not rejected.
    pub fn with_layout(layout: StreamLayout) -> Self {
        for collision in layout.collisions() {
            warn!(
                first = ?collision.first,
                second = ?collision.second,
                byte = collision.byte,
                "Stream decode rules read overlapping bytes"
            );
        }
        let capacity = layout.capacity();
        Self {
            layout,
            buffer: vec![0; capacity],
            scratch: vec![0; capacity],
            slow_interval: DEFAULT_SLOW_INTERVAL,
            low_rpm_threshold: DEFAULT_LOW_RPM_THRESHOLD,
            last_slow: None,
            pending: false,
            rate: DecodeRate::new(),
        }
    }

    pub fn with_slow_interval(mut self, interval: Duration) -> Self {
        self.slow_interval = interval;
        self
    }

    pub fn with_low_rpm_threshold(mut self, rpm: f64) -> Self {
        self.low_rpm_threshold = rpm;
        self
    }

    pub fn layout(&self) -> &StreamLayout {
        &self.layout
    }

    /// The retained reply buffer.
    pub fn buffer(&self) -> &[u8] {
        &self.buffer
    }

    /// Successful polls per wall-clock second.
    pub fn decode_rate(&self) -> f64 {
        self.decode_rate_at(Instant::now())
    }

    /// Successful polls per second as seen at `now`; falls to 0 once the
    /// link stops answering.
    pub fn decode_rate_at(&self, now: Instant) -> f64 {
        self.rate.per_second_at(now)
    }

    /// Run one request/response exchange.
    ///
    /// On success the payload overwrites the start of the retained buffer.
    /// Every error leaves the buffer as it was.
    pub async fn poll<T>(&mut self, transport: &mut T, timeout: Duration) -> Result<(), PollError>
    where
        T: StreamTransport + ?Sized,
    {
        let deadline = Instant::now() + timeout;

        flush(transport)?;
        transport.write(REQUEST_BYTE).map_err(|source| PollError::Read { source })?;

        let mut header = [0u8; HEADER_LEN];
        read_until(transport, &mut header, deadline, timeout).await?;
        let [echo, marker, length] = header;

        if echo != REQUEST_BYTE || marker != REPLY_MARKER {
            flush(transport)?;
            return Err(PollError::UnexpectedHeader { echo, marker });
        }

        let length = length as usize;
        let capacity = self.layout.capacity();
        if length > capacity {
            flush(transport)?;
            return Err(PollError::Overflow { length, capacity });
        }

        read_until(transport, &mut self.scratch[..length], deadline, timeout).await?;
        self.buffer[..length].copy_from_slice(&self.scratch[..length]);
        self.pending = true;
        self.rate.record(Instant::now());

        trace!(length, "Stream reply accepted");
        Ok(())
    }

    /// Interpret the latest reply. Returns whether the snapshot was written.
    pub fn extract(&mut self, snapshot: &mut TelemetrySnapshot) -> bool {
        self.extract_at(snapshot, Instant::now())
    }

    /// Interpret the latest reply, stamping updated signals with `now`.
    ///
    /// Fast fields are always decoded. Slow fields are decoded once the slow
    /// interval has elapsed since they were last refreshed, or while the
    /// engine turns slower than the low-RPM threshold. Without a successful
    /// poll since the previous extraction nothing is written.
    pub fn extract_at(&mut self, snapshot: &mut TelemetrySnapshot, now: Instant) -> bool {
        if !std::mem::take(&mut self.pending) {
            return false;
        }

        let mut updates = Vec::with_capacity(self.layout.fields().len());
        for field in self.layout.with_cadence(Cadence::Fast) {
            match field.extract(&self.buffer) {
                Ok(value) => updates.push((field.signal, value)),
                Err(e) => debug!(signal = ?field.signal, "Skipping field: {}", e),
            }
        }

        let rpm = updates
            .iter()
            .find(|(signal, _)| *signal == SignalId::Rpm)
            .map(|(_, value)| value.as_f64())
            .unwrap_or_else(|| snapshot.number(SignalId::Rpm));

        let slow_due = self
            .last_slow
            .is_none_or(|last| now.saturating_duration_since(last) >= self.slow_interval);

        if slow_due || rpm < self.low_rpm_threshold {
            for field in self.layout.with_cadence(Cadence::Slow) {
                match field.extract(&self.buffer) {
                    Ok(value) => updates.push((field.signal, value)),
                    Err(e) => debug!(signal = ?field.signal, "Skipping field: {}", e),
                }
            }
            self.last_slow = Some(now);
        }

        snapshot.apply(updates, now);
        true
    }
}

/// Discard whatever is waiting on the line.
fn flush<T>(transport: &mut T) -> Result<(), PollError>
where
    T: StreamTransport + ?Sized,
{
    let mut discard = [0u8; 32];
    loop {
        let waiting = transport.available_count().map_err(|source| PollError::Read { source })?;
        if waiting == 0 {
            return Ok(());
        }
        let max = waiting.min(discard.len());
        let read = transport.read(&mut discard, max).map_err(|source| PollError::Read { source })?;
        if read == 0 {
            return Ok(());
        }
        trace!(read, "Discarded stale bytes");
    }
}

/// Fill `buf` completely, giving up at `deadline`.
async fn read_until<T>(
    transport: &mut T,
    buf: &mut [u8],
    deadline: Instant,
    timeout: Duration,
) -> Result<(), PollError>
where
    T: StreamTransport + ?Sized,
{
    let mut filled = 0;
    while filled < buf.len() {
        let waiting = transport.available_count().map_err(|source| PollError::Read { source })?;
        if waiting > 0 {
            let max = waiting.min(buf.len() - filled);
            let read = transport
                .read(&mut buf[filled..], max)
                .map_err(|source| PollError::Read { source })?;
            if read > 0 {
                filled += read;
                continue;
            }
        }

        if Instant::now() >= deadline {
            return Err(PollError::Timeout { waited: timeout });
        }
        tokio::time::sleep(READ_POLL_STEP).await;
    }
    Ok(())
}
