//! Benchmarks for signal amplification nodes.

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion};
use keysynth::graph::{
    envelope::EnvNode,
    extensions::NodeExt,
    node::{GraphNode, RenderCtx},
    oscillator::OscNode,
};

use crate::{BLOCK_SIZES, SAMPLE_RATE};

pub fn bench_amplify(c: &mut Criterion) {
    let mut group = c.benchmark_group("dsp/amplify");

    for &size in BLOCK_SIZES {
        let mut buffer = vec![0.0f32; size];
        let ctx = RenderCtx::new(SAMPLE_RATE, size);

        // Oscillator shaped by a held envelope (the per-slot envelope path)
        let mut shaped = OscNode::sine(440.0).amplify(EnvNode::adsr(0.001, 0.001, 60.0, 0.7, 0.1));
        group.bench_with_input(BenchmarkId::new("envelope", size), &size, |b, _| {
            b.iter(|| {
                shaped.render_block(black_box(&mut buffer), black_box(&ctx));
            })
        });

        // Oscillator times another oscillator (ring modulation)
        let mut ring = OscNode::sine(440.0).amplify(OscNode::sine(5.0));
        group.bench_with_input(BenchmarkId::new("ring", size), &size, |b, _| {
            b.iter(|| {
                ring.render_block(black_box(&mut buffer), black_box(&ctx));
            })
        });
    }

    group.finish();
}
