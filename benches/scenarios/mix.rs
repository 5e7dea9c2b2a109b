//! Benchmarks for the PCM mixer with several streamed voices.
//!
//! These simulate the audio callback with a handful of held keys, each voice
//! pulled through the streaming adapter and summed with saturation.

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion};
use keysynth::{
    graph::{build, BuildEnv},
    io::{AudioSink, Mixer, SinkSource, StreamSource, VoiceControl},
    patch::Patch,
};

use crate::{BLOCK_SIZES, SAMPLE_RATE};

const SAMPLE_WIDTH: u8 = 2;

fn mixer_with_voices(voices: usize, block_len: usize) -> Mixer {
    let patch = Patch::default();
    let mut mixer = Mixer::new(SAMPLE_RATE, block_len, SAMPLE_WIDTH);
    for i in 0..voices {
        let env = BuildEnv::new(SAMPLE_RATE, block_len).with_key(220.0 + 55.0 * i as f32);
        let node = build(&patch, env).unwrap();
        let stream =
            StreamSource::new(node, block_len, SAMPLE_WIDTH, None, VoiceControl::new()).unwrap();
        mixer.play(SinkSource::Stream(stream), 0.0).unwrap();
    }
    mixer
}

pub fn bench_mix(c: &mut Criterion) {
    let mut group = c.benchmark_group("scenarios/mix");

    for &size in BLOCK_SIZES {
        let mut out = vec![0i32; size];

        for voices in [1usize, 4, 10] {
            let mut mixer = mixer_with_voices(voices, size);
            group.bench_with_input(
                BenchmarkId::new(format!("voices_{voices}"), size),
                &size,
                |b, _| {
                    b.iter(|| {
                        mixer.mix_block(black_box(&mut out));
                    })
                },
            );
        }

        // Callback length that does not line up with the block length
        let mut mixer = mixer_with_voices(4, size);
        let mut uneven = vec![0i32; size * 3 / 2];
        group.bench_with_input(BenchmarkId::new("uneven_callback", size), &size, |b, _| {
            b.iter(|| {
                mixer.mix_block(black_box(&mut uneven));
            })
        });
    }

    group.finish();
}
