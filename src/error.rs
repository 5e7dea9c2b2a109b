//! Error types shared by the graph builder, the streaming adapter and the
//! voice scheduler.

/// Errors raised while building or starting a voice.
///
/// None of these tear down voices that are already playing; they abort only
/// the press, preview or parameter change that triggered them.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SynthError {
    /// Missing or out-of-range field, bad routing target, invalid engine setting.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The node renders blocks of a different length than the sink pulls.
    #[error("block size mismatch: node renders {node} frames, sink expects {sink}")]
    BlockSizeMismatch { node: usize, sink: usize },

    /// An oscillator names itself, directly or through other slots, as its
    /// own FM/PWM source.
    #[error("cyclic modulation through oscillator {slot}")]
    CyclicModulation { slot: usize },

    /// No oscillator is routed to the audio output.
    #[error("no oscillators connected to speaker output")]
    Routing,

    #[error("unknown parameter '{0}'")]
    UnknownParam(String),

    #[error("invalid value '{value}' for {path}")]
    InvalidValue { path: String, value: String },
}

impl SynthError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub(crate) fn invalid(path: impl Into<String>, value: impl Into<String>) -> Self {
        Self::InvalidValue {
            path: path.into(),
            value: value.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, SynthError>;

/// PCM scaling produced values outside the range of the output sample width.
///
/// Recoverable: the offending block is narrowed to the target width and
/// playback continues in degraded form.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverflowCondition {
    /// Output sample width in bytes.
    pub sample_width: u8,
    /// Largest magnitude seen before narrowing.
    pub peak: i64,
}

impl std::fmt::Display for OverflowCondition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} bit overflow! (peak {}), output clipped",
            self.sample_width as u32 * 8,
            self.peak
        )
    }
}
