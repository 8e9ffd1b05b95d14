//! Benchmarks for the hot decode and scheduling paths
//!
//! Measures:
//! - Bus frame decode into the snapshot
//! - Stream reply extraction (fast fields only and fast + slow)
//! - Draw intent computation with and without pending changes
//!
//! Platform: Cross-platform (scripted transports, CI-safe)

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use ecudash::test_utils::{ScriptedStream, stream_payload};
use ecudash::{
    BusFrameDecoder, DisplayBindings, RenderScheduler, SignalId, SignalValue, StreamPollDecoder,
    TelemetrySnapshot, TransportFrame,
};
use ecudash::render::ClassRates;
use std::hint::black_box;
use std::time::Duration;
use tokio::time::Instant;

fn bench_bus_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("bus_decode");

    let frames = [
        ("engine_core", TransportFrame::new(0x360, &[0x0B, 0xB8, 0x03, 0xE8, 0x01, 0xF4, 0, 0])),
        ("indicators", TransportFrame::new(0x3E4, &[0xFF, 0x0F, 0x24, 0x09, 0xC0, 0, 0, 0])),
        ("unknown", TransportFrame::new(0x123, &[0; 8])),
    ];

    for (name, frame) in frames {
        let frame = frame.expect("valid frame");
        let mut decoder = BusFrameDecoder::new();
        let mut snapshot = TelemetrySnapshot::new();
        group.bench_with_input(BenchmarkId::new("decode", name), &frame, |b, frame| {
            b.iter(|| black_box(decoder.decode(black_box(frame), &mut snapshot)))
        });
    }

    group.finish();
}

fn bench_stream_extract(c: &mut Criterion) {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .expect("runtime");

    let mut group = c.benchmark_group("stream_extract");

    for (name, slow_interval) in [("fast_only", Duration::from_secs(3600)), ("fast_and_slow", Duration::ZERO)] {
        let mut stream = ScriptedStream::new();
        let mut decoder = StreamPollDecoder::new().with_slow_interval(slow_interval);
        let mut snapshot = TelemetrySnapshot::new();
        let payload = stream_payload(128, &[(14, 0xB8), (15, 0x0B), (7, 0x5A), (31, 0x80)]);

        group.bench_function(name, |b| {
            b.iter(|| {
                stream.queue_payload(&payload);
                runtime
                    .block_on(decoder.poll(&mut stream, Duration::from_millis(30)))
                    .expect("poll");
                black_box(decoder.extract(&mut snapshot))
            })
        });
    }

    group.finish();
}

fn bench_draw_intents(c: &mut Criterion) {
    let mut group = c.benchmark_group("draw_intents");
    let bindings = DisplayBindings::default();

    group.bench_function("no_change", |b| {
        let mut scheduler = RenderScheduler::new(&ClassRates::default(), 50.0);
        let snapshot = TelemetrySnapshot::new();
        let now = Instant::now();
        scheduler.compute_draw_intents(&snapshot, &bindings, now);
        b.iter(|| black_box(scheduler.compute_draw_intents(&snapshot, &bindings, now)))
    });

    group.bench_function("every_signal_changed", |b| {
        let mut scheduler = RenderScheduler::new(&ClassRates::default(), 50.0);
        let mut snapshot = TelemetrySnapshot::new();
        let start = Instant::now();
        let mut step = 0u64;
        b.iter(|| {
            step += 1;
            let now = start + Duration::from_secs(step);
            let updates = SignalId::ALL.iter().map(|&id| {
                let value = if id.is_flag() {
                    SignalValue::Flag(step % 2 == 0)
                } else {
                    SignalValue::Number(step as f64)
                };
                (id, value)
            });
            snapshot.apply(updates, now);
            black_box(scheduler.compute_draw_intents(&snapshot, &bindings, now))
        })
    });

    group.finish();
}

criterion_group!(benches, bench_bus_decode, bench_stream_extract, bench_draw_intents);
criterion_main!(benches);
