// benches/emg_benchmarks.rs
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use emg_capture::acquisition::CaptureSession;
use emg_capture::link::simulator::{ActivationPattern, SimulatorConfig};
use emg_capture::link::RawFrame;
use emg_capture::processing::{decode, decode_frame, Classifier};

const FRAME_SHAPES: &[(&str, &str)] = &[
    ("bare", "351"),
    ("prefixed", "EMG:351"),
    ("suffixed", "EMG:351mv\r\n"),
    ("no_digits", "EMG:--"),
    ("long_prefix", "sensor-channel-a/raw/value=351;"),
];

const SESSION_LENGTHS: &[usize] = &[10, 100, 1000];

fn benchmark_frame_decoding(c: &mut Criterion) {
    let mut group = c.benchmark_group("frame_decoding");
    group.throughput(Throughput::Elements(1));

    for &(name, text) in FRAME_SHAPES {
        group.bench_with_input(BenchmarkId::new("decode", name), text.as_bytes(), |b, bytes| {
            b.iter(|| decode(black_box(bytes)));
        });

        let frame = RawFrame::from(text);
        group.bench_with_input(BenchmarkId::new("decode_frame", name), &frame, |b, frame| {
            b.iter(|| decode_frame(black_box(frame)));
        });
    }

    group.finish();
}

fn benchmark_classification(c: &mut Criterion) {
    let classifier = Classifier::default();
    let values: Vec<u64> = (300..=400).collect();

    let mut group = c.benchmark_group("classification");
    group.throughput(Throughput::Elements(values.len() as u64));
    group.bench_function("threshold_bands", |b| {
        b.iter(|| {
            for &value in &values {
                black_box(classifier.classify(black_box(value)));
            }
        });
    });
    group.finish();
}

fn benchmark_session_ingest(c: &mut Criterion) {
    let mut group = c.benchmark_group("session_ingest");

    for &length in SESSION_LENGTHS {
        let frames: Vec<RawFrame> = (0..length)
            .map(|i| RawFrame::from(format!("EMG:{}", 320 + (i % 60)).as_str()))
            .collect();

        group.throughput(Throughput::Elements(length as u64));
        group.bench_with_input(BenchmarkId::from_parameter(length), &frames, |b, frames| {
            b.iter(|| {
                let mut session = CaptureSession::new(10, Classifier::default());
                session.start();
                for frame in frames {
                    black_box(session.on_reading(decode_frame(frame)));
                }
                session.current_status()
            });
        });
    }

    group.finish();
}

fn benchmark_simulator_magnitude(c: &mut Criterion) {
    let patterns = [
        ("constant", ActivationPattern::Constant),
        ("sinusoidal", ActivationPattern::Sinusoidal { frequency_hz: 1.0 }),
        (
            "burst",
            ActivationPattern::Burst {
                burst_duration_ms: 500,
                rest_duration_ms: 1500,
            },
        ),
        ("ramp", ActivationPattern::Ramp { ramp_duration_ms: 2000 }),
        ("random", ActivationPattern::Random),
    ];

    let mut group = c.benchmark_group("simulator_magnitude");
    group.throughput(Throughput::Elements(1000));

    for (name, pattern) in patterns {
        let config = SimulatorConfig {
            pattern,
            ..Default::default()
        };
        group.bench_with_input(BenchmarkId::from_parameter(name), &config, |b, config| {
            b.iter(|| {
                for sequence in 0..1000u64 {
                    black_box(config.magnitude(sequence, 0.25));
                }
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    benchmark_frame_decoding,
    benchmark_classification,
    benchmark_session_ingest,
    benchmark_simulator_magnitude
);

criterion_main!(benches);
