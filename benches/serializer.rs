//! Benchmarks for recording persistence
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use keymacro_rs::config::StorageSettings;
use keymacro_rs::session::serializer;
use keymacro_rs::{EventLog, KeyEvent};

const KEYS: [&str; 8] = ["a", "s", "d", "f", "shift", "space", "enter", "backspace"];

/// A typing session of `taps` keystrokes, 80ms apart
fn typing_log(taps: usize) -> EventLog {
    let mut events = Vec::with_capacity(taps * 2);
    for i in 0..taps {
        let key = KEYS[i % KEYS.len()];
        let at = i as f64 * 0.08;
        events.push(KeyEvent::press(key, at));
        events.push(KeyEvent::release(key, at + 0.035));
    }
    EventLog::from_events(events).expect("typing log is ordered")
}

fn bench_serialize(c: &mut Criterion) {
    let mut group = c.benchmark_group("serialize");

    for taps in [100, 1_000, 10_000].iter() {
        let log = typing_log(*taps);
        group.throughput(Throughput::Elements(log.len() as u64));

        group.bench_with_input(BenchmarkId::new("envelope_pretty", taps), &log, |b, log| {
            let settings = StorageSettings::default();
            b.iter(|| black_box(serializer::to_string(log, &settings)));
        });

        group.bench_with_input(BenchmarkId::new("bare_compact", taps), &log, |b, log| {
            let settings = StorageSettings {
                write_envelope: false,
                pretty: false,
            };
            b.iter(|| black_box(serializer::to_string(log, &settings)));
        });
    }

    group.finish();
}

fn bench_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse");

    for taps in [100, 1_000, 10_000].iter() {
        let log = typing_log(*taps);
        let text = serializer::to_string(&log, &StorageSettings::default())
            .expect("typing log serializes");

        group.throughput(Throughput::Bytes(text.len() as u64));
        group.bench_with_input(BenchmarkId::new("from_str", taps), &text, |b, text| {
            b.iter(|| black_box(serializer::from_str(text)));
        });
    }

    group.finish();
}

fn bench_validate(c: &mut Criterion) {
    let log = typing_log(10_000);
    c.bench_function("validate_20k_events", |b| {
        b.iter(|| black_box(EventLog::validate(log.events())));
    });
}

criterion_group!(benches, bench_serialize, bench_parse, bench_validate);
criterion_main!(benches);
