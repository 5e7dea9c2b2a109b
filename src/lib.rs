pub mod config;
pub mod dsp;
pub mod error;
pub mod graph; // Composable audio graph nodes
pub mod io; // PCM conversion, streaming and sinks
pub mod patch; // Oscillator slots, envelopes, effects
pub mod sequencing; // Notes, chords and arpeggios
pub mod synth; // Voice scheduling

pub use error::{Result, SynthError};

pub const MAX_BLOCK_SIZE: usize = 2048;
