#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use rand::{rngs::StdRng, Rng, SeedableRng};
use std::f64::consts::TAU;

use crate::error::SynthError;

/*
Waveform Generators
===================

Every generator is a phase accumulator: `phase` counts cycles in [0, 1) and
advances by `frequency * (1 + fm) / sample_rate` per sample. The waveform is a
function of the phase, then scaled and shifted:

    out = amplitude * wave(phase) + bias

Frequency modulation multiplies the frequency, so an FM input of 0.0 leaves
the accumulator untouched. Pulse-width modulation adds to the configured
width, so a PWM input of 0.0 leaves the duty cycle untouched. A generator fed
an all-zero modulation buffer therefore produces exactly the same samples as
one fed nothing at all.

  Sine        smooth, fundamental only
  Triangle    odd harmonics falling off as 1/n²
  Square      odd harmonics falling off as 1/n
  SquareH     square built from a finite sum of odd sines (band-limited)
  Sawtooth    all harmonics falling off as 1/n
  SawtoothH   sawtooth from a finite sine sum
  Pulse       square with adjustable duty cycle
  Harmonics   user-weighted sum of sines (may exceed [-1, 1])
  Semicircle  half circles, rounder than sine
  Pointy      inverted half circles, spikier than triangle
  Noise       random values held for one period (sample & hold at `frequency`)
  Linear      ramp from `start` by `increment` per sample, held within [min, max]

The linear ramp has no frequency, amplitude or bias. It is meant as a slow
control signal (for example a rising FM depth), not as audio.
*/

/// Harmonics summed by the band-limited square and sawtooth shapes.
pub const DEFAULT_HARMONIC_COUNT: u32 = 16;

/// Pulse widths are kept this far away from 0 and 1.
const MIN_PULSE_WIDTH: f32 = 0.001;

const NOISE_SEED: u64 = 0x5EED_ACE1;

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Waveform {
    Sine,
    Triangle,
    Square,
    SquareH,
    Sawtooth,
    SawtoothH,
    Pulse,
    Harmonics,
    Semicircle,
    Pointy,
    Noise,
    Linear,
}

impl Waveform {
    pub const ALL: [Waveform; 12] = [
        Waveform::Sine,
        Waveform::Triangle,
        Waveform::Square,
        Waveform::SquareH,
        Waveform::Sawtooth,
        Waveform::SawtoothH,
        Waveform::Pulse,
        Waveform::Harmonics,
        Waveform::Semicircle,
        Waveform::Pointy,
        Waveform::Noise,
        Waveform::Linear,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Waveform::Sine => "sine",
            Waveform::Triangle => "triangle",
            Waveform::Square => "square",
            Waveform::SquareH => "square_h",
            Waveform::Sawtooth => "sawtooth",
            Waveform::SawtoothH => "sawtooth_h",
            Waveform::Pulse => "pulse",
            Waveform::Harmonics => "harmonics",
            Waveform::Semicircle => "semicircle",
            Waveform::Pointy => "pointy",
            Waveform::Noise => "noise",
            Waveform::Linear => "linear",
        }
    }
}

impl std::fmt::Display for Waveform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for Waveform {
    type Err = SynthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Waveform::ALL
            .into_iter()
            .find(|w| w.name() == s)
            .ok_or_else(|| SynthError::invalid("waveform", s))
    }
}

/// One partial of an additive waveform.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Harmonic {
    /// Multiple of the fundamental (1 = fundamental).
    pub order: u32,
    /// Relative amplitude.
    pub weight: f32,
}

/// Parameters of the linear ramp generator.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearRamp {
    pub start: f32,
    pub increment: f32,
    pub min: f32,
    pub max: f32,
}

impl Default for LinearRamp {
    fn default() -> Self {
        Self {
            start: 0.0,
            increment: 0.00002,
            min: -1.0,
            max: 1.0,
        }
    }
}

enum Shape {
    Sine,
    Triangle,
    Square,
    SquareH(u32),
    Sawtooth,
    SawtoothH(u32),
    Pulse,
    Harmonics(Vec<Harmonic>),
    Semicircle,
    Pointy,
    Noise { rng: StdRng, held: f32 },
    Linear { value: f32, ramp: LinearRamp },
}

/// A single waveform generator.
pub struct Oscillator {
    shape: Shape,
    frequency: f32,
    amplitude: f32,
    bias: f32,
    pulse_width: f32,
    /// Position within the current cycle, [0, 1).
    phase: f64,
}

impl Oscillator {
    /// Create a generator for `waveform` at `frequency` Hz with unit amplitude.
    ///
    /// `Waveform::Linear` starts from `LinearRamp::default()`; use
    /// [`Oscillator::linear`] to configure it.
    pub fn new(waveform: Waveform, frequency: f32) -> Self {
        let shape = match waveform {
            Waveform::Sine => Shape::Sine,
            Waveform::Triangle => Shape::Triangle,
            Waveform::Square => Shape::Square,
            Waveform::SquareH => Shape::SquareH(DEFAULT_HARMONIC_COUNT),
            Waveform::Sawtooth => Shape::Sawtooth,
            Waveform::SawtoothH => Shape::SawtoothH(DEFAULT_HARMONIC_COUNT),
            Waveform::Pulse => Shape::Pulse,
            Waveform::Harmonics => Shape::Harmonics(vec![Harmonic {
                order: 1,
                weight: 1.0,
            }]),
            Waveform::Semicircle => Shape::Semicircle,
            Waveform::Pointy => Shape::Pointy,
            Waveform::Noise => {
                let mut rng = StdRng::seed_from_u64(NOISE_SEED);
                let held = rng.gen_range(-1.0..=1.0);
                Shape::Noise { rng, held }
            }
            Waveform::Linear => {
                let ramp = LinearRamp::default();
                Shape::Linear {
                    value: ramp.start,
                    ramp,
                }
            }
        };

        Self {
            shape,
            frequency,
            amplitude: 1.0,
            bias: 0.0,
            pulse_width: 0.5,
            phase: 0.0,
        }
    }

    pub fn linear(ramp: LinearRamp) -> Self {
        let mut osc = Self::new(Waveform::Linear, 0.0);
        osc.shape = Shape::Linear {
            value: ramp.start.max(ramp.min).min(ramp.max),
            ramp,
        };
        osc
    }

    pub fn with_amplitude(mut self, amplitude: f32) -> Self {
        self.amplitude = amplitude;
        self
    }

    pub fn with_bias(mut self, bias: f32) -> Self {
        self.bias = bias;
        self
    }

    /// Start position within the cycle, [0, 1).
    pub fn with_phase(mut self, phase: f32) -> Self {
        self.phase = (phase as f64).rem_euclid(1.0);
        self
    }

    pub fn with_pulse_width(mut self, width: f32) -> Self {
        self.pulse_width = width;
        self
    }

    /// Replace the partials of a `Harmonics` generator; ignored by other shapes.
    pub fn with_harmonics(mut self, harmonics: Vec<Harmonic>) -> Self {
        if let Shape::Harmonics(partials) = &mut self.shape {
            *partials = harmonics;
        }
        self
    }

    /// Number of partials for `SquareH`/`SawtoothH`; ignored by other shapes.
    pub fn with_harmonic_count(mut self, count: u32) -> Self {
        match &mut self.shape {
            Shape::SquareH(n) | Shape::SawtoothH(n) => *n = count.max(1),
            _ => {}
        }
        self
    }

    pub fn frequency(&self) -> f32 {
        self.frequency
    }

    /// Produce one sample and advance.
    ///
    /// `fm` scales the frequency by `1 + fm`, `pwm` offsets the pulse width.
    #[inline]
    pub fn next_sample(&mut self, sample_rate: f32, fm: f32, pwm: f32) -> f32 {
        let t = self.phase;
        let wave = match &mut self.shape {
            Shape::Linear { value, ramp } => {
                let out = *value;
                *value = (*value + ramp.increment).max(ramp.min).min(ramp.max);
                return out;
            }
            Shape::Sine => (TAU * t).sin() as f32,
            Shape::Triangle => {
                let shifted = (t - 0.25).rem_euclid(1.0);
                (4.0 * (shifted - 0.5).abs() - 1.0) as f32
            }
            Shape::Square => {
                if t < 0.5 {
                    1.0
                } else {
                    -1.0
                }
            }
            Shape::SquareH(count) => {
                let mut sum = 0.0;
                for k in 0..*count {
                    let n = (2 * k + 1) as f64;
                    sum += (TAU * n * t).sin() / n;
                }
                (sum * 4.0 / std::f64::consts::PI) as f32
            }
            Shape::Sawtooth => (2.0 * (t + 0.5).rem_euclid(1.0) - 1.0) as f32,
            Shape::SawtoothH(count) => {
                let mut sum = 0.0;
                for k in 1..=*count {
                    let n = k as f64;
                    let sign = if k % 2 == 1 { 1.0 } else { -1.0 };
                    sum += sign * (TAU * n * t).sin() / n;
                }
                (sum * 2.0 / std::f64::consts::PI) as f32
            }
            Shape::Pulse => {
                let width = (self.pulse_width + pwm).clamp(MIN_PULSE_WIDTH, 1.0 - MIN_PULSE_WIDTH);
                if t < width as f64 {
                    1.0
                } else {
                    -1.0
                }
            }
            Shape::Harmonics(partials) => partials
                .iter()
                .map(|h| h.weight as f64 * (TAU * h.order as f64 * t).sin())
                .sum::<f64>() as f32,
            Shape::Semicircle => {
                if t < 0.5 {
                    (1.0 - (4.0 * t - 1.0).powi(2)).max(0.0).sqrt() as f32
                } else {
                    -(1.0 - (4.0 * t - 3.0).powi(2)).max(0.0).sqrt() as f32
                }
            }
            Shape::Pointy => {
                let (half, sign) = if t < 0.5 { (t, 1.0) } else { (t - 0.5, -1.0) };
                let x = 1.0 - (4.0 * half - 1.0).abs();
                (sign * (1.0 - (1.0 - x * x).max(0.0).sqrt())) as f32
            }
            Shape::Noise { held, .. } => *held,
        };

        let step = self.frequency as f64 * (1.0 + fm as f64) / sample_rate as f64;
        let next = t + step;
        let wrapped = !(0.0..1.0).contains(&next);
        self.phase = next - next.floor();

        if wrapped {
            if let Shape::Noise { rng, held } = &mut self.shape {
                *held = rng.gen_range(-1.0..=1.0);
            }
        }

        self.amplitude * wave + self.bias
    }

    /// Fill `out`, reading per-sample modulation from `fm` and `pwm`.
    ///
    /// Both modulation slices must be at least as long as `out`.
    pub fn render(&mut self, out: &mut [f32], sample_rate: f32, fm: &[f32], pwm: &[f32]) {
        debug_assert!(fm.len() >= out.len() && pwm.len() >= out.len());
        for ((sample, &f), &p) in out.iter_mut().zip(fm).zip(pwm) {
            *sample = self.next_sample(sample_rate, f, p);
        }
    }
}
