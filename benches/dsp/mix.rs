//! Benchmarks for summing graph nodes.

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion};
use keysynth::graph::{
    mix::Mix,
    node::{GraphNode, RenderCtx},
    oscillator::OscNode,
};

use crate::{BLOCK_SIZES, SAMPLE_RATE};

pub fn bench_mix(c: &mut Criterion) {
    let mut group = c.benchmark_group("dsp/mix");

    for &size in BLOCK_SIZES {
        let mut buffer = vec![0.0f32; size];
        let ctx = RenderCtx::new(SAMPLE_RATE, size);

        // Chord sizes: single note, triad, seventh
        for voices in [1usize, 3, 4] {
            let mut mix = Mix::new(
                (0..voices)
                    .map(|i| {
                        Box::new(OscNode::sine(220.0 * (i + 1) as f32)) as Box<dyn GraphNode>
                    })
                    .collect(),
            );
            group.bench_with_input(
                BenchmarkId::new(format!("sines_{voices}"), size),
                &size,
                |b, _| {
                    b.iter(|| {
                        mix.render_block(black_box(&mut buffer), black_box(&ctx));
                    })
                },
            );
        }
    }

    group.finish();
}
