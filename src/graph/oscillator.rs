use crate::{
    dsp::{Oscillator, Waveform},
    graph::node::{GraphNode, Modulatable, RenderCtx},
    patch::OscillatorSpec,
    MAX_BLOCK_SIZE,
};

/*
Oscillator Node
===============

The graph-level wrapper around a single waveform generator. It is the leaf
of every voice: the sound sources, the LFOs that modulate them and the
tremolo modulator are all OscNodes.

Frequency and Pulse-Width Modulation:
-------------------------------------

An OscNode accepts two per-sample modulation inputs through `Modulatable`:

  OscParam::Frequency   instantaneous frequency = f × (1 + fm[n])
  OscParam::PulseWidth  duty cycle = pulse_width + pwm[n]   (pulse only)

Both inputs are cleared after every block. A block rendered without a
modulation input behaves exactly as if an all-zero input had been supplied,
so wiring a silent LFO into a node never changes its output.

  // FM: a 5 Hz sine wobbling a 440 Hz carrier by ±10%
  let lfo = OscNode::new(Oscillator::new(Waveform::Sine, 5.0).with_amplitude(0.1));
  let carrier = OscNode::new(Oscillator::new(Waveform::Sine, 440.0))
      .modulate(lfo, OscParam::Frequency, 1.0);

Note Lifecycle:
---------------

Oscillators are infinite. `note_off()` gates the node: from then on it
renders silence and reports itself inactive, which lets effects further
down the chain (echo tails) ring out and end on their own.

Nodes built by the graph builder remember the `OscillatorSpec` they came
from, so every field can be read back from a built node.
*/

pub struct OscNode {
    osc: Oscillator,
    spec: Option<OscillatorSpec>,
    fm: Vec<f32>,
    pwm: Vec<f32>,
    gate: bool,
}

/// Parameters that can be modulated on an oscillator
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OscParam {
    /// Relative frequency offset, `f × (1 + value)`
    Frequency,
    /// Additive pulse width offset
    PulseWidth,
}

impl OscNode {
    pub fn new(osc: Oscillator) -> Self {
        Self {
            osc,
            spec: None,
            fm: vec![0.0; MAX_BLOCK_SIZE],
            pwm: vec![0.0; MAX_BLOCK_SIZE],
            gate: true,
        }
    }

    /// Materialize `spec` at `frequency` Hz.
    ///
    /// `frequency` is the resolved pitch (key tracking and chord voicing
    /// already applied); `spec.frequency` is not consulted. No
    /// validation happens here, see `graph::builder` for that.
    pub fn from_spec(spec: &OscillatorSpec, frequency: f32) -> Self {
        let osc = match spec.waveform {
            Waveform::Linear => Oscillator::linear(spec.ramp),
            waveform => Oscillator::new(waveform, frequency)
                .with_amplitude(spec.amplitude)
                .with_bias(spec.bias)
                .with_phase(spec.phase)
                .with_pulse_width(spec.pulse_width.unwrap_or(0.5))
                .with_harmonics(spec.harmonics.clone()),
        };

        Self {
            spec: Some(spec.clone()),
            ..Self::new(osc)
        }
    }

    pub fn sine(frequency: f32) -> Self {
        Self::new(Oscillator::new(Waveform::Sine, frequency))
    }

    /// The `OscillatorSpec` this node was built from, if it came from one.
    pub fn spec(&self) -> Option<&OscillatorSpec> {
        self.spec.as_ref()
    }

    pub fn frequency(&self) -> f32 {
        self.osc.frequency()
    }
}

impl GraphNode for OscNode {
    fn render_block(&mut self, out: &mut [f32], ctx: &RenderCtx) {
        let len = out.len();
        if !self.gate {
            out.fill(0.0);
            return;
        }

        self.osc
            .render(out, ctx.sample_rate, &self.fm[..len], &self.pwm[..len]);

        // Modulation only holds for the block it was set for.
        self.fm[..len].fill(0.0);
        self.pwm[..len].fill(0.0);
    }

    fn note_off(&mut self) {
        self.gate = false;
    }

    fn is_active(&self) -> bool {
        self.gate
    }
}

impl Modulatable for OscNode {
    type Param = OscParam;

    fn set_modulation(&mut self, param: Self::Param, values: &[f32]) {
        let target = match param {
            OscParam::Frequency => &mut self.fm,
            OscParam::PulseWidth => &mut self.pwm,
        };
        let len = values.len().min(target.len());
        target[..len].copy_from_slice(&values[..len]);
    }
}
