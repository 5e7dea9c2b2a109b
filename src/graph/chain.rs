use tracing::debug;

use crate::{
    dsp::{Oscillator, Waveform},
    error::{Result, SynthError},
    graph::{
        delay::EchoNode, envelope::EnvNode, extensions::NodeExt, node::GraphNode,
        oscillator::OscNode,
    },
    patch::{EchoConfig, EnvelopeConfig, Patch, TremoloConfig, TremoloWave},
};

/*
Filter Chain
============

Post-processing applied to a composed voice, always in this order:

    envelope  →  tremolo  →  echo

  envelope  per oscillator slot, applied by the graph builder to every node
            it materializes for that slot (see `apply_envelope`)
  tremolo   amplitude modulation by a biased low-frequency oscillator
  echo      multi-tap repeats, see `graph/delay.rs`

Stages that are switched off are not inserted at all, so an identity stage
costs nothing and cannot color the signal.

Tremolo Gain
------------

The modulator swings around a bias so the gain never leaves [1 - depth, 1]:

    gain[n] = depth/2 · lfo[n] + (1 - depth/2)

  depth 0.0  →  gain 1.0 (identity, stage omitted)
  depth 0.5  →  gain 0.5 .. 1.0
  depth 1.0  →  gain 0.0 .. 1.0 (full chop)

Sawtooth and square tremolo use 9-harmonic band-limited shapes so the
modulator itself does not click.
*/

/// Harmonics in the band-limited tremolo shapes.
pub const TREMOLO_HARMONICS: u32 = 9;

/// Longest echo line accepted, in seconds of buffered input.
pub const MAX_ECHO_SECONDS: f32 = 60.0;

/// Most repeats an echo may render.
pub const MAX_ECHO_REPEATS: usize = 1_000;

/// Tremolo and echo settings, validated on construction.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterChain {
    tremolo: TremoloConfig,
    echo: EchoConfig,
}

impl FilterChain {
    pub fn new(tremolo: TremoloConfig, echo: EchoConfig) -> Result<Self> {
        if !(0.0..=1.0).contains(&tremolo.depth) {
            return Err(SynthError::config(format!(
                "tremolo depth must be within 0..=1, got {}",
                tremolo.depth
            )));
        }
        if tremolo.rate < 0.0 {
            return Err(SynthError::config("tremolo rate must not be negative"));
        }
        if echo.enabled {
            if !(echo.after >= 0.0 && echo.delay >= 0.0 && echo.decay >= 0.0) {
                return Err(SynthError::config("echo timings must not be negative"));
            }
            let repeats = echo.repeats();
            if repeats > MAX_ECHO_REPEATS {
                return Err(SynthError::config(format!(
                    "echo amount must be at most {MAX_ECHO_REPEATS} audible repeats, got {repeats}"
                )));
            }
            // Input the line has to remember: up to the start of the last repeat.
            let reach = echo.after as f64 + repeats.saturating_sub(1) as f64 * echo.delay as f64;
            if !(reach <= MAX_ECHO_SECONDS as f64) {
                return Err(SynthError::config(format!(
                    "echo reaches {reach} s back, at most {MAX_ECHO_SECONDS} s supported"
                )));
            }
        }

        Ok(Self { tremolo, echo })
    }

    pub fn from_patch(patch: &Patch) -> Result<Self> {
        Self::new(patch.tremolo.clone(), patch.echo.clone())
    }

    /// Seconds the chain keeps sounding after its input stops.
    pub fn tail(&self) -> f32 {
        self.echo.tail()
    }

    /// Wrap `node` with the enabled stages.
    pub fn apply(&self, node: Box<dyn GraphNode>, sample_rate: f32) -> Box<dyn GraphNode> {
        let node = match self.tremolo_modulator() {
            Some(lfo) => {
                debug!(
                    waveform = self.tremolo.waveform.name(),
                    rate = self.tremolo.rate,
                    depth = self.tremolo.depth,
                    "tremolo stage"
                );
                node.amplify(lfo).boxed()
            }
            None => node,
        };

        if self.echo.enabled && self.echo.repeats() > 0 {
            let echo = EchoNode::new(
                sample_rate,
                self.echo.after,
                self.echo.amount,
                self.echo.delay,
                self.echo.decay,
            );
            debug!(tail = echo.tail(), "echo stage");
            node.through(echo).boxed()
        } else {
            node
        }
    }

    fn tremolo_modulator(&self) -> Option<OscNode> {
        if self.tremolo.is_identity() {
            return None;
        }

        let rate = self.tremolo.rate;
        let osc = match self.tremolo.waveform {
            TremoloWave::Off => return None,
            TremoloWave::Sine => Oscillator::new(Waveform::Sine, rate),
            TremoloWave::Triangle => Oscillator::new(Waveform::Triangle, rate),
            TremoloWave::Sawtooth => Oscillator::new(Waveform::SawtoothH, rate)
                .with_harmonic_count(TREMOLO_HARMONICS),
            TremoloWave::Square => {
                Oscillator::new(Waveform::SquareH, rate).with_harmonic_count(TREMOLO_HARMONICS)
            }
        };

        let amplitude = self.tremolo.depth / 2.0;
        Some(OscNode::new(
            osc.with_amplitude(amplitude).with_bias(1.0 - amplitude),
        ))
    }
}

/// Apply the envelope bound to `slot`, if any.
///
/// Two envelopes naming the same slot are a configuration error.
pub fn apply_envelope(
    node: Box<dyn GraphNode>,
    slot: usize,
    envelopes: &[EnvelopeConfig],
) -> Result<Box<dyn GraphNode>> {
    let mut bound = envelopes.iter().filter(|env| env.source == Some(slot));
    let Some(config) = bound.next() else {
        return Ok(node);
    };
    if bound.next().is_some() {
        return Err(SynthError::config(format!(
            "more than one envelope applied to oscillator {}",
            slot + 1
        )));
    }
    if !(0.0..=1.0).contains(&config.sustain_level) {
        return Err(SynthError::config(format!(
            "sustain level must be within 0..=1, got {}",
            config.sustain_level
        )));
    }
    if [config.attack, config.decay, config.sustain, config.release]
        .iter()
        .any(|&secs| secs < 0.0)
    {
        return Err(SynthError::config("envelope times must not be negative"));
    }

    Ok(node.amplify(EnvNode::from_config(config)).boxed())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::node::RenderCtx;

    const SR: f32 = 1_000.0;

    fn render(mut node: Box<dyn GraphNode>, blocks: usize) -> Vec<f32> {
        let mut ctx = RenderCtx::new(SR, 100);
        let mut out = Vec::new();
        let mut block = vec![0.0; 100];
        for _ in 0..blocks {
            node.render_block(&mut block, &ctx);
            out.extend_from_slice(&block);
            ctx.frame += 1;
        }
        out
    }

    fn tone() -> Box<dyn GraphNode> {
        OscNode::sine(50.0).boxed()
    }

    #[test]
    fn identity_stages_leave_signal_untouched() {
        let reference = render(tone(), 5);
        for tremolo in [
            TremoloConfig {
                depth: 0.0,
                waveform: TremoloWave::Sine,
                ..Default::default()
            },
            TremoloConfig {
                rate: 0.0,
                waveform: TremoloWave::Square,
                ..Default::default()
            },
            TremoloConfig::default(),
        ] {
            let chain = FilterChain::new(tremolo, EchoConfig::default()).unwrap();
            assert_eq!(chain.tail(), 0.0);
            assert_eq!(render(chain.apply(tone(), SR), 5), reference);
        }
    }

    #[test]
    fn tremolo_gain_stays_in_range() {
        let tremolo = TremoloConfig {
            waveform: TremoloWave::Sine,
            rate: 5.0,
            depth: 0.5,
        };
        let chain = FilterChain::new(tremolo, EchoConfig::default()).unwrap();
        struct Ones;
        impl GraphNode for Ones {
            fn render_block(&mut self, out: &mut [f32], _ctx: &RenderCtx) {
                out.fill(1.0);
            }
        }
        let gains = render(chain.apply(Box::new(Ones), SR), 4);
        assert!(gains.iter().all(|&g| (0.5 - 1e-6..=1.0 + 1e-6).contains(&g)));
        assert!(gains.iter().any(|&g| g < 0.55));
        assert!(gains.iter().any(|&g| g > 0.95));
    }

    #[test]
    fn echo_reports_tail() {
        let echo = EchoConfig {
            enabled: true,
            after: 0.1,
            amount: 4,
            delay: 0.05,
            decay: 0.5,
        };
        let chain = FilterChain::new(TremoloConfig::default(), echo).unwrap();
        assert!((chain.tail() - 0.3).abs() < 1e-6);

        let mut node = chain.apply(tone(), SR);
        let mut block = vec![0.0; 100];
        node.render_block(&mut block, &RenderCtx::new(SR, 100));
        node.note_off();
        assert!(node.is_active(), "echo tail should keep the chain alive");
    }

    #[test]
    fn rejects_unbounded_echo_lines() {
        let endless = EchoConfig {
            enabled: true,
            amount: usize::MAX,
            decay: 1.0,
            ..Default::default()
        };
        assert!(matches!(
            FilterChain::new(TremoloConfig::default(), endless.clone()),
            Err(SynthError::Configuration(_))
        ));

        let too_long = EchoConfig {
            amount: 500,
            delay: 1.0,
            ..endless.clone()
        };
        assert!(FilterChain::new(TremoloConfig::default(), too_long).is_err());

        // Fading repeats are capped before the bounds apply.
        let fading = EchoConfig {
            decay: 0.5,
            ..endless.clone()
        };
        assert!(FilterChain::new(TremoloConfig::default(), fading).is_ok());

        // A disabled echo is never built.
        let disabled = EchoConfig {
            enabled: false,
            ..endless
        };
        assert!(FilterChain::new(TremoloConfig::default(), disabled).is_ok());
    }

    #[test]
    fn rejects_bad_depth() {
        let tremolo = TremoloConfig {
            depth: 1.5,
            ..Default::default()
        };
        assert!(FilterChain::new(tremolo, EchoConfig::default()).is_err());
    }

    #[test]
    fn envelope_only_for_bound_slot() {
        let envelopes = vec![EnvelopeConfig {
            source: Some(1),
            ..Default::default()
        }];
        let reference = render(tone(), 2);
        let untouched = apply_envelope(tone(), 0, &envelopes).unwrap();
        assert_eq!(render(untouched, 2), reference);

        let shaped = apply_envelope(tone(), 1, &envelopes).unwrap();
        assert_ne!(render(shaped, 2), reference);
    }

    #[test]
    fn double_binding_is_rejected() {
        let env = EnvelopeConfig {
            source: Some(0),
            ..Default::default()
        };
        let result = apply_envelope(tone(), 0, &[env.clone(), env]);
        assert!(matches!(result, Err(SynthError::Configuration(_))));
    }
}
