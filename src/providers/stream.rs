//! Polled serial producer

use std::time::Duration;

use tokio::time::{Interval, MissedTickBehavior, interval};
use tracing::{info, trace};

use crate::Result;
use crate::config::{SourceKind, StreamSettings};
use crate::decoder::StreamPollDecoder;
use crate::provider::{Producer, Production};
use crate::transport::StreamTransport;
use crate::types::TelemetrySnapshot;

/// Producer that polls the ECU on a fixed interval.
///
/// Each cycle waits for the next poll tick, runs one request/response
/// exchange and extracts fields from the accepted reply. A failed exchange
/// surfaces as the cycle's error and leaves the snapshot untouched.
pub struct StreamProducer<T> {
    transport: T,
    decoder: StreamPollDecoder,
    interval: Interval,
    timeout: Duration,
}

impl<T: StreamTransport> StreamProducer<T> {
    pub fn new(transport: T, settings: &StreamSettings) -> Self {
        let decoder = StreamPollDecoder::new()
            .with_slow_interval(settings.slow_interval())
            .with_low_rpm_threshold(settings.low_rpm_threshold);
        Self::with_decoder(transport, decoder, settings)
    }

    pub fn with_decoder(mut transport: T, decoder: StreamPollDecoder, settings: &StreamSettings) -> Self {
        let timeout = settings.poll_timeout();
        transport.set_timeout(timeout);

        let mut interval = interval(settings.poll_interval());
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            poll_interval = ?settings.poll_interval(),
            poll_timeout = ?timeout,
            capacity = decoder.layout().capacity(),
            "Stream producer ready"
        );
        Self { transport, decoder, interval, timeout }
    }

    pub fn decoder(&self) -> &StreamPollDecoder {
        &self.decoder
    }
}

#[async_trait::async_trait]
impl<T: StreamTransport> Producer for StreamProducer<T> {
    async fn produce(&mut self, snapshot: &mut TelemetrySnapshot) -> Result<Production> {
        self.interval.tick().await;
        self.decoder.poll(&mut self.transport, self.timeout).await?;

        if self.decoder.extract(snapshot) {
            trace!(version = snapshot.version(), "Stream reply decoded");
            Ok(Production::Updated)
        } else {
            Ok(Production::Unchanged)
        }
    }

    fn source_kind(&self) -> SourceKind {
        SourceKind::Stream
    }

    fn decode_rate(&self) -> f64 {
        self.decoder.decode_rate()
    }

    fn tick_rate(&self) -> f64 {
        1.0 / self.interval.period().as_secs_f64()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TelemetryError;
    use crate::test_utils::{ScriptedStream, stream_payload};
    use crate::types::SignalId;

    #[tokio::test(start_paused = true)]
    async fn configures_timeout_and_decodes_a_reply() {
        let stream = ScriptedStream::new();
        stream.queue_payload(&stream_payload(90, &[(14, 0x1D), (15, 0x4C), (7, 0x5A)]));

        let mut producer = StreamProducer::new(stream.clone(), &StreamSettings::default());
        assert_eq!(stream.configured_timeout(), Some(Duration::from_millis(30)));

        let mut snapshot = TelemetrySnapshot::new();
        assert_eq!(producer.produce(&mut snapshot).await.unwrap(), Production::Updated);
        assert_eq!(snapshot.number(SignalId::Rpm), 19485.0);
        assert_eq!(snapshot.number(SignalId::CoolantTemp), 50.0);
        assert_eq!(producer.source_kind(), SourceKind::Stream);
    }

    #[tokio::test(start_paused = true)]
    async fn silent_ecu_times_out_without_writing() {
        let stream = ScriptedStream::new();
        let mut producer = StreamProducer::new(stream, &StreamSettings::default());
        let mut snapshot = TelemetrySnapshot::new();

        let err = producer.produce(&mut snapshot).await.unwrap_err();
        assert!(matches!(err, TelemetryError::TransportTimeout { .. }));
        assert_eq!(snapshot.version(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn cycles_follow_the_poll_interval() {
        let stream = ScriptedStream::new();
        for _ in 0..3 {
            stream.queue_payload(&stream_payload(16, &[(14, 0xE8), (15, 0x03)]));
        }
        let mut producer = StreamProducer::new(stream, &StreamSettings::default());
        let mut snapshot = TelemetrySnapshot::new();

        let start = tokio::time::Instant::now();
        for _ in 0..3 {
            producer.produce(&mut snapshot).await.unwrap();
        }
        // first tick is immediate, then two 15 ms intervals
        assert!(start.elapsed() >= Duration::from_millis(30));
        assert_eq!(snapshot.version(), 3);
    }
}
