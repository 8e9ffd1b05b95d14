//! Decoder, scheduler and simulator behaviour through the public API.

use std::collections::VecDeque;
use std::io;
use std::time::Duration;

use ecudash::render::ClassRates;
use ecudash::schema::{BusLayout, StreamLayout};
use ecudash::{
    BusFrameDecoder, DisplayBindings, ElementId, PollError, RedrawRate, RenderScheduler, SignalId,
    SignalSimulator, SignalValue, SimulatorMode, StreamPollDecoder, StreamTransport,
    TelemetrySnapshot, TransportFrame,
};
use tokio::time::Instant;

/// Serial line preloaded with raw bytes; requests are ignored.
struct Line(VecDeque<u8>);

impl Line {
    fn reply(payload: &[u8], advertised: u8) -> Self {
        let mut bytes = VecDeque::from(vec![b'n', 0x32, advertised]);
        bytes.extend(payload.iter().copied());
        Self(bytes)
    }
}

impl StreamTransport for Line {
    fn write(&mut self, _byte: u8) -> io::Result<()> {
        Ok(())
    }

    fn available_count(&mut self) -> io::Result<usize> {
        Ok(self.0.len())
    }

    fn read(&mut self, buf: &mut [u8], max: usize) -> io::Result<usize> {
        let count = max.min(buf.len()).min(self.0.len());
        for (slot, byte) in buf.iter_mut().zip(self.0.drain(..count)) {
            *slot = byte;
        }
        Ok(count)
    }

    fn set_timeout(&mut self, _timeout: Duration) {}
}

#[test]
fn repeated_bus_frame_is_idempotent_but_versioned() {
    let mut decoder = BusFrameDecoder::new();
    let mut snapshot = TelemetrySnapshot::new();
    let frame = TransportFrame::new(0x360, &[0x17, 0x70, 0x02, 0x58, 0x00, 0xC8, 0, 0]).unwrap();

    assert!(decoder.decode(&frame, &mut snapshot));
    let first = snapshot.clone();
    assert!(decoder.decode(&frame, &mut snapshot));

    assert_eq!(snapshot.version(), first.version() + 1);
    for id in [SignalId::Rpm, SignalId::ManifoldPressure, SignalId::ThrottlePosition] {
        assert_eq!(snapshot.value(id), first.value(id));
    }
    assert_eq!(snapshot.number(SignalId::Rpm), 6000.0);
    assert_eq!(decoder.frames_decoded(), 2);
}

#[tokio::test(start_paused = true)]
async fn stream_reply_decodes_documented_offsets() {
    let mut payload = vec![0u8; 64];
    payload[14] = 0x1D;
    payload[15] = 0x4C;
    payload[7] = 0x5A;
    let mut line = Line::reply(&payload, 64);

    let mut decoder = StreamPollDecoder::new();
    let mut snapshot = TelemetrySnapshot::new();
    decoder.poll(&mut line, Duration::from_millis(30)).await.unwrap();
    assert!(decoder.extract(&mut snapshot));

    assert_eq!(snapshot.number(SignalId::Rpm), 19485.0);
    assert_eq!(snapshot.number(SignalId::CoolantTemp), 50.0);
}

#[tokio::test(start_paused = true)]
async fn oversized_stream_reply_leaves_snapshot_unchanged() {
    let mut line = Line::reply(&[0xFF; 16], 200);
    let mut decoder = StreamPollDecoder::new();
    let mut snapshot = TelemetrySnapshot::new();

    let err = decoder.poll(&mut line, Duration::from_millis(30)).await.unwrap_err();
    assert!(matches!(err, PollError::Overflow { length: 200, capacity: 128 }));
    assert!(!decoder.extract(&mut snapshot));
    assert_eq!(snapshot, TelemetrySnapshot::new());
}

#[test]
fn collision_audit_matches_known_tables() {
    let bus = BusLayout::standard().collisions();
    assert!(!bus.is_empty());
    assert!(bus.iter().all(|(identifier, _)| *identifier == 0x3E4));
    assert!(StreamLayout::standard().collisions().is_empty());
}

#[test]
fn rate_limit_bounds_intents_and_draws_final_value() {
    let rates = ClassRates { primary_gauge: RedrawRate::MaxHz(10), ..ClassRates::default() };
    let mut scheduler = RenderScheduler::new(&rates, 100.0);
    let bindings = DisplayBindings::empty();
    let mut snapshot = TelemetrySnapshot::new();
    let start = Instant::now();

    scheduler.compute_draw_intents(&snapshot, &bindings, start);

    let mut rpm_draws = 0;
    for tick in 1..=100u64 {
        let now = start + Duration::from_millis(tick * 10);
        snapshot.apply([(SignalId::Rpm, SignalValue::Number(1000.0 + tick as f64))], now);
        rpm_draws += scheduler
            .compute_draw_intents(&snapshot, &bindings, now)
            .iter()
            .filter(|intent| intent.element == ElementId::Rpm)
            .count();
    }
    assert!(rpm_draws <= 10, "{} draws", rpm_draws);

    // value written at the final tick is drawn on the next eligible tick
    let last = start + Duration::from_millis(1000);
    snapshot.apply([(SignalId::Rpm, SignalValue::Number(4321.0))], last);
    let later = scheduler.compute_draw_intents(&snapshot, &bindings, last + Duration::from_millis(100));
    assert_eq!(later.len(), 1);
    assert_eq!(later[0].element, ElementId::Rpm);
}

#[test]
fn idle_simulation_is_reproducible_without_noise() {
    let run = |seed| {
        let mut simulator = SignalSimulator::with_seed(seed).without_noise().with_mode(SimulatorMode::Idle);
        let mut snapshot = TelemetrySnapshot::new();
        let start = Instant::now();
        (0..25u64)
            .map(|step| {
                simulator.tick(&mut snapshot, start + Duration::from_millis(step * 100));
                snapshot.number(SignalId::Rpm)
            })
            .collect::<Vec<_>>()
    };

    assert_eq!(run(1), run(99));
}
