//! Benchmarks for message classification and normalization

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use colis_core::Timestamp;
use colis_test::{jpeg_frame, NoiseConfig, StreamFuzzer};
use colis_wire::{classify, normalize_batch, Classified, InboundMessage};

const SINGLE: &str =
    r#"{"type":"dimensions","id":12,"length_cm":61.5,"width_cm":40.2,"height_cm":30.0,"length_px":246,"width_px":160}"#;

const BATCH: &str = r#"{"detected_objects":[
    {"id":"1","length_cm":10,"width_cm":20,"height_cm":30},
    {"id":2,"length":11,"width":21},
    {"length_cm":12,"width_cm":22,"height_cm":32},
    {"id":"4","length_cm":"n/a","length":13,"width_cm":23,"height_cm":33}
]}"#;

fn bench_classify_single(c: &mut Criterion) {
    c.bench_function("classify_single_object", |b| {
        b.iter(|| black_box(classify(InboundMessage::text(black_box(SINGLE)))))
    });
}

fn bench_classify_batch(c: &mut Criterion) {
    c.bench_function("classify_batch_4", |b| {
        b.iter(|| black_box(classify(InboundMessage::text(black_box(BATCH)))))
    });
}

fn bench_classify_frame(c: &mut Criterion) {
    let frame = jpeg_frame(640, 480);

    c.bench_function("classify_frame", |b| {
        b.iter(|| black_box(classify(InboundMessage::Binary(frame.clone()))))
    });
}

fn bench_normalize_batch(c: &mut Criterion) {
    let Classified::Telemetry(batch) = classify(InboundMessage::text(BATCH)) else {
        return;
    };
    let arrival = Timestamp::from_millis(1_700_000_000_000);

    c.bench_function("normalize_batch_4", |b| {
        b.iter(|| black_box(normalize_batch(black_box(&batch), arrival)))
    });
}

fn bench_classify_noisy_stream(c: &mut Criterion) {
    let (messages, _) = StreamFuzzer::new(NoiseConfig::default()).generate();

    c.bench_function("classify_noisy_stream_500", |b| {
        b.iter(|| {
            for message in messages.iter().cloned() {
                black_box(classify(message));
            }
        })
    });
}

criterion_group!(
    benches,
    bench_classify_single,
    bench_classify_batch,
    bench_classify_frame,
    bench_normalize_batch,
    bench_classify_noisy_stream,
);
criterion_main!(benches);
