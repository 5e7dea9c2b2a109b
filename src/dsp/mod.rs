//! Low-level DSP primitives used by the higher level graph nodes.
//!
//! These components know nothing about blocks, modulation routing or note
//! lifecycles. They stay focused on the per-sample math so graph nodes can
//! layer orchestration on top.

/// Multi-tap echo line.
pub mod delay;
/// Timed attack/decay/sustain/release envelope.
pub mod envelope;
/// Waveform generators and noise sources.
pub mod oscillator;

pub use envelope::EnvelopeState;
pub use oscillator::{Harmonic, LinearRamp, Oscillator, Waveform};
