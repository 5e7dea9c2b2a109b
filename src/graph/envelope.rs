use crate::{
    dsp::envelope::{Envelope, EnvelopeState},
    graph::node::{GraphNode, RenderCtx},
    patch::EnvelopeConfig,
};

/// Graph node producing the gain curve of a timed ADSR envelope.
///
/// Meant as the modulator of an `Amplify`: `osc.amplify(EnvNode::adsr(..))`.
/// The shape runs from the first rendered block; key release does not cut
/// it short.
pub struct EnvNode {
    env: Envelope,
}

impl EnvNode {
    pub fn adsr(attack: f32, decay: f32, sustain: f32, sustain_level: f32, release: f32) -> Self {
        Self {
            env: Envelope::adsr(attack, decay, sustain, sustain_level, release),
        }
    }

    pub fn from_config(config: &EnvelopeConfig) -> Self {
        Self::adsr(
            config.attack,
            config.decay,
            config.sustain,
            config.sustain_level,
            config.release,
        )
        .with_stop_at_end(config.stop_at_end)
    }

    pub fn with_stop_at_end(mut self, stop: bool) -> Self {
        self.env = self.env.with_stop_at_end(stop);
        self
    }

    pub fn duration(&self) -> f32 {
        self.env.duration()
    }

    pub fn state(&self) -> EnvelopeState {
        self.env.state()
    }
}

impl GraphNode for EnvNode {
    fn render_block(&mut self, out: &mut [f32], ctx: &RenderCtx) {
        self.env.render(out, ctx.sample_rate);
    }

    fn is_active(&self) -> bool {
        self.env.is_active()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn follows_config() {
        let config = EnvelopeConfig {
            source: Some(0),
            attack: 0.01,
            decay: 0.02,
            sustain: 0.03,
            sustain_level: 0.5,
            release: 0.04,
            stop_at_end: true,
        };
        let mut env = EnvNode::from_config(&config);
        assert!((env.duration() - 0.1).abs() < 1e-6);

        let ctx = RenderCtx::new(1_000.0, 50);
        let mut out = vec![0.0; 50];
        env.render_block(&mut out, &ctx);
        assert_eq!(out[10], 1.0);
        assert!((out[40] - 0.5).abs() < 1e-6);
        env.render_block(&mut out, &ctx);
        env.render_block(&mut out, &ctx);
        assert_eq!(env.state(), EnvelopeState::Done);
        assert!(!env.is_active());
    }

    #[test]
    fn held_envelope_stays_active() {
        let mut env = EnvNode::adsr(0.0, 0.0, 0.0, 1.0, 0.0);
        let mut out = vec![1.0; 8];
        env.render_block(&mut out, &RenderCtx::new(1_000.0, 8));
        assert!(out.iter().all(|&s| s == 0.0));
        assert!(env.is_active());
    }
}
