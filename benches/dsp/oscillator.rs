//! Benchmarks for oscillator waveform generation.

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion};
use keysynth::dsp::{Oscillator, Waveform};

use crate::{BLOCK_SIZES, SAMPLE_RATE};

pub fn bench_oscillator(c: &mut Criterion) {
    let mut group = c.benchmark_group("dsp/oscillator");

    for &size in BLOCK_SIZES {
        let mut buffer = vec![0.0f32; size];
        let silent = vec![0.0f32; size];
        // Vibrato-like FM input for the modulated case
        let fm: Vec<f32> = (0..size).map(|i| 0.01 * (i as f32 * 0.01).sin()).collect();

        // Closed-form shapes are cheap; the band-limited ones sum partials
        for waveform in [
            Waveform::Sine,
            Waveform::Triangle,
            Waveform::Square,
            Waveform::SquareH,
            Waveform::SawtoothH,
            Waveform::Pulse,
            Waveform::Noise,
        ] {
            let mut osc = Oscillator::new(waveform, 440.0);
            group.bench_with_input(BenchmarkId::new(waveform.name(), size), &size, |b, _| {
                b.iter(|| {
                    osc.render(
                        black_box(&mut buffer),
                        SAMPLE_RATE,
                        black_box(&silent),
                        black_box(&silent),
                    );
                })
            });
        }

        let mut osc = Oscillator::new(Waveform::Sine, 440.0);
        group.bench_with_input(BenchmarkId::new("sine_fm", size), &size, |b, _| {
            b.iter(|| {
                osc.render(black_box(&mut buffer), SAMPLE_RATE, black_box(&fm), &silent);
            })
        });
    }

    group.finish();
}
