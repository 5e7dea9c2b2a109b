//! Benchmarks for complete patch-built voices.
//!
//! Each voice goes through the graph builder and the filter chain exactly as
//! a key press does, from a bare sine to a modulated chord with echo.

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion};
use keysynth::{
    graph::{BoundNode, BuildEnv, FilterChain, GraphBuilder},
    patch::Patch,
};

use crate::{BLOCK_SIZES, SAMPLE_RATE};

fn patch(assignments: &[(&str, &str)]) -> Patch {
    let mut patch = Patch::default();
    for (path, value) in assignments {
        patch
            .set_param(path, value)
            .unwrap_or_else(|err| panic!("{path}: {err}"));
    }
    patch
}

fn voice(patch: &Patch, env: BuildEnv, block_len: usize) -> BoundNode {
    let chain = FilterChain::from_patch(patch).unwrap();
    let node = GraphBuilder::new(patch, env).build().unwrap();
    BoundNode::new(chain.apply(node, SAMPLE_RATE), SAMPLE_RATE, block_len)
}

pub fn bench_voices(c: &mut Criterion) {
    let mut group = c.benchmark_group("scenarios/voices");

    // Vibrato: slot 4 is a slow sine feeding the FM input of slot 5
    let vibrato = [
        ("oscillator.4.follow_keys", "false"),
        ("oscillator.4.frequency", "6"),
        ("oscillator.4.amplitude", "0.02"),
        ("oscillator.5.fm", "osc 4"),
    ];

    let scenarios: Vec<(&str, Patch, bool)> = vec![
        // Baseline: one sine following the key
        ("sine", patch(&[]), false),
        // Band-limited sawtooth shaped by an envelope
        (
            "enveloped_saw",
            patch(&[
                ("oscillator.5.waveform", "sawtooth_h"),
                ("envelope.1.source", "osc 5"),
                ("envelope.1.sustain", "60"),
            ]),
            false,
        ),
        ("vibrato", patch(&vibrato), false),
        // Pulse with its width swept by slot 3
        (
            "pwm_pulse",
            patch(&[
                ("oscillator.5.waveform", "pulse"),
                ("oscillator.3.follow_keys", "false"),
                ("oscillator.3.frequency", "0.5"),
                ("oscillator.3.amplitude", "0.3"),
                ("oscillator.5.pwm", "osc 3"),
            ]),
            false,
        ),
        // Everything at once: vibrato triad through tremolo and echo
        (
            "chord_tremolo_echo",
            patch(
                &[
                    &vibrato[..],
                    &[
                        ("tremolo.waveform", "sine"),
                        ("tremolo.depth", "0.5"),
                        ("echo.enabled", "true"),
                    ][..],
                ]
                .concat(),
            ),
            true,
        ),
    ];

    for &size in BLOCK_SIZES {
        let mut buffer = vec![0.0f32; size];

        for (name, patch, chord) in &scenarios {
            let mut env = BuildEnv::new(SAMPLE_RATE, size).with_key(220.0);
            if *chord {
                env = env.with_chord(vec![220.0, 277.18, 329.63]);
            }
            let mut node = voice(patch, env, size);

            group.bench_with_input(BenchmarkId::new(*name, size), &size, |b, _| {
                b.iter(|| {
                    node.next_block(black_box(&mut buffer));
                })
            });
        }
    }

    group.finish();
}
