use crate::{
    graph::node::{GraphNode, Modulatable, RenderCtx},
    MAX_BLOCK_SIZE,
};

/*
Modulate Node
=============

Connects a modulation source (usually another oscillator acting as an LFO)
to a parameter on another node. The source is rendered first, every block,
and its samples are handed to the target as per-sample modulation input.

  // FM: oscillator 1 bends the pitch of oscillator 2
  let voice = carrier.modulate(lfo, OscParam::Frequency, 1.0);

  // PWM: a slow triangle sweeps the duty cycle of a pulse
  let pulse = pulse.modulate(sweep, OscParam::PulseWidth, 0.4);


Understanding Depth
-------------------

Depth scales the source before it reaches the parameter:

    modulation[n] = lfo[n] × depth

What the modulation means depends on the parameter. For an oscillator's
frequency it is relative (f × (1 + modulation)), for its pulse width it is
added to the configured width. See `graph/oscillator.rs`.


Stacking
--------

`Modulate` is itself `Modulatable`, forwarding to the node it wraps, so one
node can take several inputs:

  carrier
      .modulate(fm_source, OscParam::Frequency, 1.0)
      .modulate(pwm_source, OscParam::PulseWidth, 1.0)

The outer source is installed first, then the inner wrapper renders its own
source and installs that too, before the carrier finally renders.


Note Events
-----------

note_off() reaches only the modulated node. Modulation sources keep running,
which matters when one source is shared by several voices.
*/

pub struct Modulate<S, L>
where
    S: GraphNode + Modulatable,
    L: GraphNode,
{
    source: S,            // The node being modulated (e.g., OscNode)
    lfo: L,               // The modulation source
    param: S::Param,      // Which parameter to modulate (e.g., OscParam::Frequency)
    depth: f32,           // Modulation amount (scales LFO output)
    lfo_buffer: Vec<f32>, // Temp buffer for LFO output
}

impl<S, L> Modulate<S, L>
where
    S: GraphNode + Modulatable,
    L: GraphNode,
{
    pub fn new(source: S, lfo: L, param: S::Param, depth: f32) -> Self {
        Self {
            source,
            lfo,
            param,
            depth,
            lfo_buffer: vec![0.0; MAX_BLOCK_SIZE],
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }
}

impl<S, L> GraphNode for Modulate<S, L>
where
    S: GraphNode + Modulatable,
    L: GraphNode,
{
    fn render_block(&mut self, out: &mut [f32], ctx: &RenderCtx) {
        let len = out.len();
        let frames = &mut self.lfo_buffer[..len];

        self.lfo.render_block(frames, ctx);
        if self.depth != 1.0 {
            for sample in frames.iter_mut() {
                *sample *= self.depth;
            }
        }

        self.source.set_modulation(self.param, frames);
        self.source.render_block(out, ctx);
    }

    fn note_off(&mut self) {
        self.source.note_off();
    }

    fn is_active(&self) -> bool {
        self.source.is_active()
    }
}

impl<S, L> Modulatable for Modulate<S, L>
where
    S: GraphNode + Modulatable,
    L: GraphNode,
{
    type Param = S::Param;

    fn set_modulation(&mut self, param: Self::Param, values: &[f32]) {
        self.source.set_modulation(param, values);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        dsp::{Oscillator, Waveform},
        graph::{
            extensions::NodeExt,
            oscillator::{OscNode, OscParam},
        },
    };

    /// A constant signal, handy as a modulation source.
    struct Dc(f32);

    impl GraphNode for Dc {
        fn render_block(&mut self, out: &mut [f32], _ctx: &RenderCtx) {
            out.fill(self.0);
        }
    }

    fn render(node: &mut impl GraphNode, blocks: usize) -> Vec<f32> {
        let ctx = RenderCtx::new(1_000.0, 50);
        let mut all = Vec::new();
        let mut block = vec![0.0; 50];
        for _ in 0..blocks {
            node.render_block(&mut block, &ctx);
            all.extend_from_slice(&block);
        }
        all
    }

    fn wraps(samples: &[f32]) -> usize {
        samples.windows(2).filter(|w| w[1] < w[0]).count()
    }

    #[test]
    fn zero_source_is_identity() {
        let saw = || OscNode::new(Oscillator::new(Waveform::Sawtooth, 10.0));
        let mut plain = saw();
        let mut modulated = saw().modulate(Dc(0.0), OscParam::Frequency, 1.0);
        assert_eq!(render(&mut plain, 8), render(&mut modulated, 8));
    }

    #[test]
    fn frequency_modulation_scales_pitch() {
        let saw = || OscNode::new(Oscillator::new(Waveform::Sawtooth, 10.0));
        let mut plain = saw();
        let mut doubled = saw().modulate(Dc(1.0), OscParam::Frequency, 1.0);
        let a = wraps(&render(&mut plain, 20));
        let b = wraps(&render(&mut doubled, 20));
        assert_eq!(b, 2 * a);
    }

    #[test]
    fn depth_scales_source() {
        let saw = || OscNode::new(Oscillator::new(Waveform::Sawtooth, 10.0));
        let mut a = saw().modulate(Dc(0.5), OscParam::Frequency, 2.0);
        let mut b = saw().modulate(Dc(1.0), OscParam::Frequency, 1.0);
        assert_eq!(render(&mut a, 10), render(&mut b, 10));
    }

    #[test]
    fn stacked_inputs_both_apply() {
        let pulse = || {
            OscNode::new(Oscillator::new(Waveform::Pulse, 10.0).with_pulse_width(0.2))
        };
        let mut node = pulse()
            .modulate(Dc(0.0), OscParam::Frequency, 1.0)
            .modulate(Dc(0.3), OscParam::PulseWidth, 1.0);
        let high = render(&mut node, 20).iter().filter(|&&s| s > 0.0).count();
        assert!((490..=510).contains(&high), "high samples: {high}");
    }

    #[test]
    fn note_off_reaches_source_only() {
        let mut node = OscNode::sine(5.0).modulate(OscNode::sine(1.0), OscParam::Frequency, 1.0);
        assert!(node.is_active());
        node.note_off();
        assert!(!node.is_active());
    }
}
