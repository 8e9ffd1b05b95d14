//! Decode-rate metric and decoder counters

use std::time::Duration;
use tokio::time::Instant;

use crate::TelemetryError;

const RATE_WINDOW: Duration = Duration::from_secs(1);

/// Rolling count of successful decodes per wall-clock second.
///
/// The rate is recomputed whenever a one-second window closes, so it lags by
/// at most one window and reads 0 until the first window completes. Reading
/// it with [`per_second_at`](DecodeRate::per_second_at) also accounts for a
/// window left open by traffic that stopped.
#[derive(Debug, Clone)]
pub struct DecodeRate {
    window_start: Option<Instant>,
    count: u32,
    per_second: f64,
}

impl Default for DecodeRate {
    fn default() -> Self {
        Self::new()
    }
}

impl DecodeRate {
    pub fn new() -> Self {
        Self { window_start: None, count: 0, per_second: 0.0 }
    }

    /// Count one decode at `now`.
    pub fn record(&mut self, now: Instant) {
        let start = *self.window_start.get_or_insert(now);
        let elapsed = now.saturating_duration_since(start);

        if elapsed >= RATE_WINDOW {
            self.per_second = self.count as f64 / elapsed.as_secs_f64();
            self.window_start = Some(now);
            self.count = 0;
        }

        self.count += 1;
    }

    /// Rate over the latest complete window.
    pub fn per_second(&self) -> f64 {
        self.per_second
    }

    /// Rate as seen at `now`.
    ///
    /// A window open longer than its length reports what it would close
    /// with; after two silent windows the rate reads 0.
    pub fn per_second_at(&self, now: Instant) -> f64 {
        let Some(start) = self.window_start else {
            return 0.0;
        };
        let open = now.saturating_duration_since(start);
        if open >= RATE_WINDOW * 2 {
            0.0
        } else if open >= RATE_WINDOW {
            self.count as f64 / open.as_secs_f64()
        } else {
            self.per_second
        }
    }
}

/// Counters published by the decode task.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecoderStats {
    /// Producer cycles that wrote the snapshot
    pub updates: u64,
    /// Cycles that produced nothing (unknown frame id, simulator off)
    pub idle_cycles: u64,
    pub timeouts: u64,
    pub overflows: u64,
    pub protocol_errors: u64,
    pub read_errors: u64,
    /// Latest decode rate reported by the producer
    pub decode_rate_hz: f64,
    /// Snapshot version after the latest update
    pub snapshot_version: u64,
}

impl DecoderStats {
    /// Count a failed cycle by category.
    pub fn record_error(&mut self, error: &TelemetryError) {
        match error {
            TelemetryError::TransportTimeout { .. } => self.timeouts += 1,
            TelemetryError::TransportOverflow { .. } => self.overflows += 1,
            TelemetryError::Protocol { .. } => self.protocol_errors += 1,
            _ => self.read_errors += 1,
        }
    }

    pub fn total_errors(&self) -> u64 {
        self.timeouts + self.overflows + self.protocol_errors + self.read_errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_reads_zero_until_first_window_closes() {
        let start = Instant::now();
        let mut rate = DecodeRate::new();
        for i in 0..50 {
            rate.record(start + Duration::from_millis(i * 10));
        }
        assert_eq!(rate.per_second(), 0.0);
    }

    #[test]
    fn rate_counts_decodes_per_second() {
        let start = Instant::now();
        let mut rate = DecodeRate::new();
        // 100 decodes at 10ms spacing fill exactly one window
        for i in 0..=100 {
            rate.record(start + Duration::from_millis(i * 10));
        }
        assert!((rate.per_second() - 100.0).abs() < 1e-9);
    }

    #[test]
    fn rate_falls_to_zero_once_decoding_stops() {
        let start = Instant::now();
        let mut rate = DecodeRate::new();
        for i in 0..=200 {
            rate.record(start + Duration::from_millis(i * 5));
        }
        let last = start + Duration::from_millis(1000);
        assert!((rate.per_second_at(last) - 200.0).abs() < 1e-9);

        let stalling = rate.per_second_at(last + Duration::from_millis(1500));
        assert!(stalling > 0.0 && stalling < 1.0, "{stalling}");
        assert_eq!(rate.per_second_at(last + Duration::from_secs(2)), 0.0);
        assert_eq!(rate.per_second_at(last + Duration::from_secs(60)), 0.0);
    }

    #[test]
    fn unused_rate_reads_zero() {
        assert_eq!(DecodeRate::new().per_second_at(Instant::now()), 0.0);
    }

    #[test]
    fn stats_categorize_errors() {
        let mut stats = DecoderStats::default();
        stats.record_error(&TelemetryError::TransportTimeout { duration: Duration::from_millis(30) });
        stats.record_error(&TelemetryError::TransportOverflow { length: 200, capacity: 128 });
        stats.record_error(&TelemetryError::transport_read("bus", std::io::Error::other("bus off")));
        assert_eq!(stats.timeouts, 1);
        assert_eq!(stats.overflows, 1);
        assert_eq!(stats.read_errors, 1);
        assert_eq!(stats.total_errors(), 3);
    }
}
