//! Real-world scenario benchmarks.
//!
//! These benchmarks model what a key press actually costs: patch-built
//! voices through the filter chain, and the mixer pulling several of them.

mod mix;
mod voices;

pub use mix::bench_mix;
pub use voices::bench_voices;
