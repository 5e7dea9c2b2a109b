//! The owned parameter model of the synthesizer.
//!
//! A [`Patch`] holds everything a player can change: the oscillator slots, the
//! envelope bindings, tremolo, echo and the arpeggiator. Host events mutate it
//! through the path-based accessors in [`fields`]; the graph builder and the
//! voice scheduler only ever read it.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{
    dsp::{delay::audible_repeats, Harmonic, LinearRamp, Waveform},
    error::{Result, SynthError},
    sequencing::chord::ChordMode,
};

pub mod fields;

/// Oscillator slots in a default patch.
pub const DEFAULT_SLOTS: usize = 5;
/// Envelope generators in a default patch.
pub const DEFAULT_ENVELOPES: usize = 3;

/// Where an oscillator takes a modulation input from.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SourceRef {
    #[default]
    None,
    /// Zero-based oscillator slot.
    Osc(usize),
}

impl SourceRef {
    pub fn slot(self) -> Option<usize> {
        match self {
            SourceRef::None => None,
            SourceRef::Osc(slot) => Some(slot),
        }
    }
}

impl From<Option<usize>> for SourceRef {
    fn from(slot: Option<usize>) -> Self {
        slot.map_or(SourceRef::None, SourceRef::Osc)
    }
}

impl std::fmt::Display for SourceRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceRef::None => f.write_str("<none>"),
            SourceRef::Osc(slot) => write!(f, "osc {}", slot + 1),
        }
    }
}

impl std::str::FromStr for SourceRef {
    type Err = SynthError;

    /// Accepts `<none>`, `none`, an empty string, `osc N` or `N` (1-based).
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() || s == "<none>" || s.eq_ignore_ascii_case("none") {
            return Ok(SourceRef::None);
        }
        let number = s.strip_prefix("osc").unwrap_or(s).trim();
        match number.parse::<usize>() {
            Ok(n) if n >= 1 => Ok(SourceRef::Osc(n - 1)),
            _ => Err(SynthError::invalid("source", s)),
        }
    }
}

/// Static description of one oscillator slot.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
#[derive(Debug, Clone, PartialEq)]
pub struct OscillatorSpec {
    pub waveform: Waveform,
    /// Hz. Absent for the linear ramp.
    pub frequency: Option<f32>,
    pub amplitude: f32,
    /// Start position within the cycle, [0, 1).
    pub phase: f32,
    pub bias: f32,
    /// Duty cycle for `Waveform::Pulse`.
    pub pulse_width: Option<f32>,
    /// Partials for `Waveform::Harmonics`.
    pub harmonics: Vec<Harmonic>,
    pub ramp: LinearRamp,
    pub fm: SourceRef,
    pub pwm: SourceRef,
    /// Take the frequency from the pressed key instead of `frequency`.
    pub follow_keys: bool,
    /// Multiplier applied to the key frequency when following keys.
    pub key_ratio: f32,
}

impl Default for OscillatorSpec {
    fn default() -> Self {
        Self {
            waveform: Waveform::Sine,
            frequency: Some(440.0),
            amplitude: 0.5,
            phase: 0.0,
            bias: 0.0,
            pulse_width: Some(0.1),
            harmonics: (1..=8)
                .map(|order| Harmonic {
                    order,
                    weight: 1.0 / order as f32,
                })
                .collect(),
            ramp: LinearRamp::default(),
            fm: SourceRef::None,
            pwm: SourceRef::None,
            follow_keys: true,
            key_ratio: 1.0,
        }
    }
}

impl OscillatorSpec {
    pub fn new(waveform: Waveform, frequency: f32) -> Self {
        Self {
            waveform,
            frequency: if waveform == Waveform::Linear {
                None
            } else {
                Some(frequency)
            },
            follow_keys: false,
            ..Default::default()
        }
    }

    pub fn with_amplitude(mut self, amplitude: f32) -> Self {
        self.amplitude = amplitude;
        self
    }

    pub fn with_fm(mut self, source: SourceRef) -> Self {
        self.fm = source;
        self
    }

    pub fn with_pwm(mut self, source: SourceRef) -> Self {
        self.pwm = source;
        self
    }

    pub fn following_keys(mut self, ratio: f32) -> Self {
        self.follow_keys = true;
        self.key_ratio = ratio;
        self
    }

    /// Switch waveform, keeping the frequency field consistent with it.
    pub fn set_waveform(&mut self, waveform: Waveform) {
        if waveform == Waveform::Linear {
            self.frequency = None;
        } else if self.frequency.is_none() {
            self.frequency = Some(440.0);
        }
        self.waveform = waveform;
    }
}

/// Parse additive partials written as `order,weight` pairs.
///
/// Weights may be fractions: `"1,1 2,1/2 3,1/3"`.
pub fn parse_harmonics(text: &str) -> Result<Vec<Harmonic>> {
    text.split_whitespace()
        .map(|pair| {
            let bad = || SynthError::invalid("harmonics", pair);
            let (order, weight) = pair.split_once(',').ok_or_else(bad)?;
            let order: u32 = order.parse().map_err(|_| bad())?;
            let weight = match weight.split_once('/') {
                Some((num, den)) => {
                    let num: f32 = num.parse().map_err(|_| bad())?;
                    let den: f32 = den.parse().map_err(|_| bad())?;
                    if den == 0.0 {
                        return Err(bad());
                    }
                    num / den
                }
                None => weight.parse().map_err(|_| bad())?,
            };
            Ok(Harmonic { order, weight })
        })
        .collect()
}

pub fn format_harmonics(harmonics: &[Harmonic]) -> String {
    harmonics
        .iter()
        .map(|h| format!("{},{}", h.order, h.weight))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Timed ADSR bound to at most one oscillator slot.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
#[derive(Debug, Clone, PartialEq)]
pub struct EnvelopeConfig {
    /// Zero-based slot the envelope shapes. `None` leaves the envelope unused.
    pub source: Option<usize>,
    pub attack: f32,
    pub decay: f32,
    pub sustain: f32,
    pub sustain_level: f32,
    pub release: f32,
    /// End the voice once the release completes.
    pub stop_at_end: bool,
}

impl Default for EnvelopeConfig {
    fn default() -> Self {
        Self {
            source: None,
            attack: 0.05,
            decay: 0.5,
            sustain: 0.6,
            sustain_level: 0.5,
            release: 0.6,
            stop_at_end: false,
        }
    }
}

impl EnvelopeConfig {
    /// Total length in seconds, zero for an unbound envelope.
    pub fn duration(&self) -> f32 {
        if self.source.is_none() {
            return 0.0;
        }
        self.attack + self.decay + self.sustain + self.release
    }
}

/// Waveforms available to the tremolo modulator.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TremoloWave {
    #[default]
    Off,
    Sine,
    Triangle,
    Sawtooth,
    Square,
}

impl TremoloWave {
    pub fn name(self) -> &'static str {
        match self {
            TremoloWave::Off => "off",
            TremoloWave::Sine => "sine",
            TremoloWave::Triangle => "triangle",
            TremoloWave::Sawtooth => "sawtooth",
            TremoloWave::Square => "square",
        }
    }
}

impl std::str::FromStr for TremoloWave {
    type Err = SynthError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "off" | "<off>" | "<none>" | "" => Ok(TremoloWave::Off),
            "sine" => Ok(TremoloWave::Sine),
            "triangle" => Ok(TremoloWave::Triangle),
            "sawtooth" => Ok(TremoloWave::Sawtooth),
            "square" => Ok(TremoloWave::Square),
            other => Err(SynthError::invalid("tremolo.waveform", other)),
        }
    }
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
#[derive(Debug, Clone, PartialEq)]
pub struct TremoloConfig {
    pub waveform: TremoloWave,
    /// Hz.
    pub rate: f32,
    /// 0..=1; the gain swings over `[1 - depth, 1]`.
    pub depth: f32,
}

impl Default for TremoloConfig {
    fn default() -> Self {
        Self {
            waveform: TremoloWave::Off,
            rate: 5.0,
            depth: 0.8,
        }
    }
}

impl TremoloConfig {
    pub fn is_identity(&self) -> bool {
        self.waveform == TremoloWave::Off || self.rate == 0.0 || self.depth == 0.0
    }
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
#[derive(Debug, Clone, PartialEq)]
pub struct EchoConfig {
    pub enabled: bool,
    /// Seconds before the first echo.
    pub after: f32,
    /// Number of repeats.
    pub amount: usize,
    /// Seconds between repeats.
    pub delay: f32,
    /// Gain of each repeat relative to the previous one.
    pub decay: f32,
}

impl Default for EchoConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            after: 0.0,
            amount: 6,
            delay: 0.2,
            decay: 0.7,
        }
    }
}

impl EchoConfig {
    /// Repeats loud enough to be rendered.
    pub fn repeats(&self) -> usize {
        audible_repeats(self.amount, self.decay)
    }

    /// Seconds the echo keeps sounding after its input stops.
    pub fn tail(&self) -> f32 {
        if !self.enabled || self.repeats() == 0 {
            return 0.0;
        }
        self.after + self.repeats() as f32 * self.delay
    }
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
#[derive(Debug, Clone, PartialEq)]
pub struct ArpeggioConfig {
    pub mode: ChordMode,
    /// Seconds per arpeggio step.
    pub rate: f32,
    /// Percentage of each step the note sounds, 1..=100.
    pub ratio: u32,
}

impl Default for ArpeggioConfig {
    fn default() -> Self {
        Self {
            mode: ChordMode::Off,
            rate: 0.2,
            ratio: 100,
        }
    }
}

impl ArpeggioConfig {
    /// A zero or negative step would repeat rounds without time passing.
    pub fn validate(&self) -> Result<()> {
        if !(self.rate > 0.0 && self.rate.is_finite()) {
            return Err(SynthError::config(format!(
                "arpeggio rate must be a positive number of seconds, got {}",
                self.rate
            )));
        }
        if !(1..=100).contains(&self.ratio) {
            return Err(SynthError::config(format!(
                "arpeggio ratio must be within 1..=100, got {}",
                self.ratio
            )));
        }
        Ok(())
    }
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
#[derive(Debug, Clone, PartialEq)]
pub struct Patch {
    pub oscillators: Vec<OscillatorSpec>,
    pub envelopes: Vec<EnvelopeConfig>,
    pub tremolo: TremoloConfig,
    pub echo: EchoConfig,
    pub arpeggio: ArpeggioConfig,
    /// Zero-based slots routed to the audio output.
    pub to_speaker: Vec<usize>,
}

impl Default for Patch {
    fn default() -> Self {
        Self {
            oscillators: vec![OscillatorSpec::default(); DEFAULT_SLOTS],
            envelopes: vec![EnvelopeConfig::default(); DEFAULT_ENVELOPES],
            tremolo: TremoloConfig::default(),
            echo: EchoConfig::default(),
            arpeggio: ArpeggioConfig::default(),
            to_speaker: vec![DEFAULT_SLOTS - 1],
        }
    }
}

impl Patch {
    /// A patch with a single oscillator routed to the output.
    pub fn single(spec: OscillatorSpec) -> Self {
        Self {
            oscillators: vec![spec],
            envelopes: Vec::new(),
            to_speaker: vec![0],
            ..Default::default()
        }
    }

    /// Longest bound envelope, in seconds.
    pub fn envelope_duration(&self) -> f32 {
        self.envelopes
            .iter()
            .map(EnvelopeConfig::duration)
            .fold(0.0, f32::max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_refs_parse_one_based() {
        assert_eq!("osc 2".parse::<SourceRef>(), Ok(SourceRef::Osc(1)));
        assert_eq!("3".parse::<SourceRef>(), Ok(SourceRef::Osc(2)));
        assert_eq!("<none>".parse::<SourceRef>(), Ok(SourceRef::None));
        assert!("osc 0".parse::<SourceRef>().is_err());
        assert_eq!(SourceRef::Osc(1).to_string(), "osc 2");
    }

    #[test]
    fn harmonics_accept_fractions() {
        let parsed = parse_harmonics("1,1   3,1/3\n5,0.2").unwrap();
        assert_eq!(parsed.len(), 3);
        assert_eq!(parsed[1].order, 3);
        assert!((parsed[1].weight - 1.0 / 3.0).abs() < 1e-6);
        assert!((parsed[2].weight - 0.2).abs() < 1e-6);
        assert!(parse_harmonics("1;1").is_err());
        assert!(parse_harmonics("1,1/0").is_err());
    }

    #[test]
    fn harmonics_format_parses_back() {
        let spec = OscillatorSpec::default();
        let text = format_harmonics(&spec.harmonics);
        assert_eq!(parse_harmonics(&text).unwrap(), spec.harmonics);
    }

    #[test]
    fn unbound_envelopes_have_no_duration() {
        let mut patch = Patch::default();
        assert_eq!(patch.envelope_duration(), 0.0);
        patch.envelopes[1].source = Some(0);
        assert!((patch.envelope_duration() - 1.75).abs() < 1e-6);
    }

    #[test]
    fn echo_tail_counts_start_delay() {
        let echo = EchoConfig {
            enabled: true,
            after: 0.5,
            amount: 3,
            delay: 0.2,
            decay: 0.5,
        };
        assert!((echo.tail() - 1.1).abs() < 1e-6);
        assert_eq!(EchoConfig::default().tail(), 0.0);
    }

    #[test]
    fn linear_waveform_drops_frequency() {
        let mut spec = OscillatorSpec::default();
        spec.set_waveform(Waveform::Linear);
        assert_eq!(spec.frequency, None);
        spec.set_waveform(Waveform::Sine);
        assert_eq!(spec.frequency, Some(440.0));
    }
}
