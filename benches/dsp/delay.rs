//! Benchmarks for the multi-tap echo line.

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion};
use keysynth::dsp::delay::EchoLine;

use crate::{BLOCK_SIZES, SAMPLE_RATE};

pub fn bench_echo(c: &mut Criterion) {
    let mut group = c.benchmark_group("dsp/echo");

    // (repeats, spacing in seconds)
    let settings: &[(usize, f32)] = &[
        (1, 0.2),  // slapback
        (6, 0.2),  // default patch
        (20, 0.05), // dense
    ];

    for &size in BLOCK_SIZES {
        // Generate a test signal
        let input: Vec<f32> = (0..size).map(|i| (i as f32 * 0.1).sin()).collect();

        for &(amount, spacing) in settings {
            let spacing = (spacing * SAMPLE_RATE) as usize;
            let mut line = EchoLine::new(spacing, spacing, amount, 0.7);
            let mut buffer = input.clone();
            group.bench_with_input(
                BenchmarkId::new(format!("repeats_{amount}"), size),
                &size,
                |b, _| {
                    b.iter(|| {
                        buffer.copy_from_slice(&input);
                        line.render(black_box(&mut buffer));
                    })
                },
            );
        }
    }

    group.finish();
}
