//! Composable building blocks for constructing audio-processing graphs.
//!
//! Graph nodes wrap the low-level DSP primitives with what a playing voice
//! needs: note release, per-sample modulation and block-based rendering. The
//! `builder` module turns a `Patch` into a composed node; `extensions` adds
//! fluent helpers so graphs can also be wired by hand.

/// Multiply two signals together (envelopes and tremolo).
pub mod amplify;
/// Cycle-checked composition of patch slots into one voice.
pub mod builder;
/// Post-processing order: envelope, tremolo, echo.
pub mod chain;
/// Multi-tap echo with a known tail.
pub mod delay;
/// Envelope generator node exposing ADSR state.
pub mod envelope;
/// Fluent combinators (`.amplify()`, `.mix()`, etc.).
pub mod extensions;
/// Modulation sources shared by several consumers.
pub mod lfo;
/// Unscaled sum of parallel graphs.
pub mod mix;
/// Connect modulation sources to node parameters.
pub mod modulate;
/// Core traits shared by all graph nodes.
pub mod node;
/// Waveform generators as graph leaves.
pub mod oscillator;
/// Serial chaining of two nodes (source → effect).
pub mod through;

pub use builder::{build, BuildEnv, GraphBuilder};
pub use chain::FilterChain;
pub use node::{BoundNode, GraphNode, RenderCtx};
