//! Benchmarks for the audio ring hot path

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rb_audio::audio_ring;
use rb_core::AudioFrame;

fn bench_push_pop(c: &mut Criterion) {
    let mut group = c.benchmark_group("push_pop");

    // 44.1 kHz / 48 kHz stereo at ~60 fps
    for frame_len in [1470usize, 1600].iter() {
        group.throughput(Throughput::Elements(*frame_len as u64));

        group.bench_with_input(BenchmarkId::new("frame", frame_len), frame_len, |b, &len| {
            let (mut tx, mut rx) = audio_ring(6, len, 2);
            let input = AudioFrame {
                frame_index: 0,
                channels: 2,
                samples: vec![0x1234; len],
            };
            let mut output = AudioFrame::silent(len, 2);

            b.iter(|| {
                tx.push(black_box(&input));
                black_box(rx.pop(&mut output));
            });
        });

        group.bench_with_input(BenchmarkId::new("fill", frame_len), frame_len, |b, &len| {
            let (mut tx, mut rx) = audio_ring(6, len, 2);
            let input = AudioFrame {
                frame_index: 0,
                channels: 2,
                samples: vec![0x1234; len],
            };
            // Typical device callback size
            let mut output = vec![0i16; 512];

            b.iter(|| {
                tx.push(black_box(&input));
                while rx.queued() > 0 {
                    black_box(rx.fill(&mut output));
                }
            });
        });
    }

    group.finish();
}

fn bench_overrun(c: &mut Criterion) {
    c.bench_function("push_full_ring", |b| {
        let (mut tx, _rx) = audio_ring(6, 1600, 2);
        let input = AudioFrame {
            frame_index: 0,
            channels: 2,
            samples: vec![0; 1600],
        };
        for _ in 0..6 {
            tx.push(&input);
        }

        b.iter(|| black_box(tx.push(black_box(&input))));
    });
}

criterion_group!(benches, bench_push_pop, bench_overrun);
criterion_main!(benches);
