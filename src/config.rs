//! Engine-wide settings: sample format, tuning and key timing.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{
    error::{Result, SynthError},
    MAX_BLOCK_SIZE,
};

/// How single notes are handed to the audio sink.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenderMode {
    /// Pull blocks lazily for as long as the key is held.
    #[default]
    Stream,
    /// Render a bounded buffer up front and play it as a finished sample.
    Render,
}

impl std::str::FromStr for RenderMode {
    type Err = SynthError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "stream" => Ok(Self::Stream),
            "render" => Ok(Self::Render),
            other => Err(SynthError::invalid("rendering", other)),
        }
    }
}

impl std::fmt::Display for RenderMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Stream => "stream",
            Self::Render => "render",
        })
    }
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Frames per second.
    pub sample_rate: u32,
    /// Frames per block, shared by every node and the sink.
    pub block_len: usize,
    /// Bytes per output sample (1..=4).
    pub sample_width: u8,
    /// Frequency of A4 in Hz.
    pub a4_tuning: f32,
    /// Presses of the same key closer together than this (seconds) are
    /// treated as keyboard auto-repeat.
    pub debounce: f32,
    /// Delay (seconds) before a key-up is confirmed.
    pub release_confirm: f32,
    pub rendering: RenderMode,
    /// Upper bound (seconds) for rendered notes.
    pub render_max: f32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44_100,
            block_len: 512,
            sample_width: 2,
            a4_tuning: 440.0,
            debounce: 0.8,
            release_confirm: 0.4,
            rendering: RenderMode::Stream,
            render_max: 4.0,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 {
            return Err(SynthError::config("sample rate must be positive"));
        }
        if self.block_len == 0 || self.block_len > MAX_BLOCK_SIZE {
            return Err(SynthError::config(format!(
                "block length must be within 1..={MAX_BLOCK_SIZE}, got {}",
                self.block_len
            )));
        }
        if !(1..=4).contains(&self.sample_width) {
            return Err(SynthError::config(format!(
                "sample width must be 1..=4 bytes, got {}",
                self.sample_width
            )));
        }
        if !(self.a4_tuning > 0.0) {
            return Err(SynthError::config("a4 tuning must be positive"));
        }
        if self.debounce < 0.0 || self.release_confirm < 0.0 || !(self.render_max > 0.0) {
            return Err(SynthError::config("key timings must not be negative"));
        }
        Ok(())
    }

    pub fn sample_rate_f32(&self) -> f32 {
        self.sample_rate as f32
    }
}
