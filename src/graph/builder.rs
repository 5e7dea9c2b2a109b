use tracing::debug;

use crate::{
    dsp::Waveform,
    error::{Result, SynthError},
    graph::{
        chain::apply_envelope,
        extensions::NodeExt,
        lfo::SharedLfo,
        mix::Mix,
        node::{BoundNode, GraphNode},
        oscillator::{OscNode, OscParam},
    },
    patch::{OscillatorSpec, Patch, SourceRef},
    MAX_BLOCK_SIZE,
};

/*
Graph Builder
=============

Turns the oscillator slots of a `Patch` into one composed node per key
press. Slots routed to the output are materialized as sound sources; slots
named as FM or PWM sources are materialized as shared modulators.

    slot 1 (sine 5 Hz) ──fm──┐
                             ├──→ slot 5 (pulse, output) ──→ out
    slot 2 (tri 0.5 Hz) ─pwm─┘

Build State
-----------

Every slot moves through three states during a single build pass:

  Unbuilt         not reached yet
  Building        on the current resolution path
  Built(shared)   finished; later references reuse the same SharedLfo

Reaching a slot that is still `Building` means the slot modulates itself,
directly or through other slots, and the build fails with
`CyclicModulation`. Nothing is cached between passes, so a shared modulator
never outlives the voice it was built for.

Frequencies
-----------

A slot with `follow_keys` plays `key × key_ratio`; otherwise it plays its
fixed `frequency`. With a chord in the environment, each output slot is
instantiated once per chord note:

    f_i = f_slot × chord[i] / chord[0]

and every copy is scaled by 1/n so the chord peaks no louder than a single
note. The copies share their modulators, so a vibrato LFO moves the whole
chord in lockstep.

Several output slots are summed without scaling.
*/

/// Everything a build pass needs besides the patch itself.
#[derive(Debug, Clone, PartialEq)]
pub struct BuildEnv {
    pub sample_rate: f32,
    pub block_len: usize,
    /// Frequency of the pressed key; `None` for previews.
    pub key_frequency: Option<f32>,
    /// Chord notes, root first. Empty for single notes.
    pub chord: Vec<f32>,
}

impl BuildEnv {
    pub fn new(sample_rate: f32, block_len: usize) -> Self {
        Self {
            sample_rate,
            block_len,
            key_frequency: None,
            chord: Vec::new(),
        }
    }

    pub fn with_key(mut self, frequency: f32) -> Self {
        self.key_frequency = Some(frequency);
        self
    }

    pub fn with_chord(mut self, frequencies: Vec<f32>) -> Self {
        self.chord = frequencies;
        self
    }

    /// Key driving `follow_keys` slots: the pressed key, else the chord root.
    fn key(&self) -> Option<f32> {
        self.key_frequency.or_else(|| self.chord.first().copied())
    }
}

enum BuildState {
    Unbuilt,
    Building,
    Built(SharedLfo),
}

pub struct GraphBuilder<'a> {
    patch: &'a Patch,
    env: BuildEnv,
    states: Vec<BuildState>,
}

impl<'a> GraphBuilder<'a> {
    pub fn new(patch: &'a Patch, env: BuildEnv) -> Self {
        let states = patch
            .oscillators
            .iter()
            .map(|_| BuildState::Unbuilt)
            .collect();
        Self { patch, env, states }
    }

    /// Compose every slot routed to the output.
    pub fn build(&mut self) -> Result<Box<dyn GraphNode>> {
        self.check_env()?;
        if self.patch.to_speaker.is_empty() {
            return Err(SynthError::Routing);
        }

        let mut outputs = Vec::with_capacity(self.patch.to_speaker.len());
        for &slot in &self.patch.to_speaker {
            outputs.push(self.output(slot)?);
        }

        debug!(outputs = outputs.len(), chord = self.env.chord.len(), "graph built");
        Ok(if outputs.len() == 1 {
            outputs.remove(0)
        } else {
            Mix::new(outputs).boxed()
        })
    }

    /// Compose a single slot as if it were the only output.
    pub fn build_slot(&mut self, slot: usize) -> Result<Box<dyn GraphNode>> {
        self.check_env()?;
        self.output(slot)
    }

    /// The bare oscillator for `slot`, validated, without its modulators.
    pub fn oscillator(&self, slot: usize) -> Result<OscNode> {
        let spec = self.spec(slot)?;
        validate(spec, slot)?;
        Ok(OscNode::from_spec(spec, self.base_frequency(spec, slot)?))
    }

    fn check_env(&self) -> Result<()> {
        if self.env.block_len == 0 || self.env.block_len > MAX_BLOCK_SIZE {
            return Err(SynthError::config(format!(
                "block length must be within 1..={MAX_BLOCK_SIZE}, got {}",
                self.env.block_len
            )));
        }
        if !(self.env.sample_rate > 0.0) {
            return Err(SynthError::config("sample rate must be positive"));
        }
        Ok(())
    }

    fn spec(&self, slot: usize) -> Result<&'a OscillatorSpec> {
        self.patch.oscillators.get(slot).ok_or_else(|| {
            SynthError::config(format!("osc {} does not exist", slot + 1))
        })
    }

    fn base_frequency(&self, spec: &OscillatorSpec, slot: usize) -> Result<f32> {
        if spec.waveform == Waveform::Linear {
            return Ok(0.0);
        }

        let frequency = match (spec.follow_keys, self.env.key()) {
            (true, Some(key)) => key * spec.key_ratio,
            _ => spec.frequency.ok_or_else(|| {
                SynthError::config(format!("osc {}: frequency is required", slot + 1))
            })?,
        };
        if !(frequency > 0.0 && frequency.is_finite()) {
            return Err(SynthError::config(format!(
                "osc {}: frequency must be positive, got {frequency}",
                slot + 1
            )));
        }
        Ok(frequency)
    }

    fn output(&mut self, slot: usize) -> Result<Box<dyn GraphNode>> {
        let spec = self.spec(slot)?;
        if spec.waveform == Waveform::Linear {
            return Err(SynthError::config(format!(
                "cannot output linear osc {} to speakers",
                slot + 1
            )));
        }

        self.states[slot] = BuildState::Building;
        let node = self.voiced(slot, spec);
        // An output slot may still be reached later as someone's modulator;
        // that use gets its own instance.
        self.states[slot] = BuildState::Unbuilt;
        node
    }

    fn voiced(&mut self, slot: usize, spec: &OscillatorSpec) -> Result<Box<dyn GraphNode>> {
        validate(spec, slot)?;
        let base = self.base_frequency(spec, slot)?;
        let (fm, pwm) = self.sources(slot, spec)?;

        let frequencies: Vec<f32> = match self.env.chord.first() {
            Some(&root) if self.env.chord.len() > 1 => {
                if !(root > 0.0) {
                    return Err(SynthError::config("chord root must be positive"));
                }
                self.env.chord.iter().map(|&f| base * f / root).collect()
            }
            _ => vec![base],
        };

        if frequencies.len() == 1 {
            let node = compose(OscNode::from_spec(spec, base), fm, pwm);
            return apply_envelope(node, slot, &self.patch.envelopes);
        }

        let mut voice = spec.clone();
        voice.amplitude /= frequencies.len() as f32;
        let mut copies = Vec::with_capacity(frequencies.len());
        for frequency in frequencies {
            let node = compose(
                OscNode::from_spec(&voice, frequency),
                fm.clone(),
                pwm.clone(),
            );
            copies.push(apply_envelope(node, slot, &self.patch.envelopes)?);
        }
        debug!(slot = slot + 1, voices = copies.len(), "chord voiced");
        Ok(Mix::new(copies).boxed())
    }

    fn sources(
        &mut self,
        slot: usize,
        spec: &OscillatorSpec,
    ) -> Result<(Option<SharedLfo>, Option<SharedLfo>)> {
        let fm = match spec.fm {
            SourceRef::Osc(source) if matches!(spec.waveform, Waveform::Noise | Waveform::Linear) => {
                self.spec(source)?;
                debug!(slot = slot + 1, waveform = %spec.waveform, "fm ignored");
                None
            }
            SourceRef::Osc(source) => Some(self.modulator(source)?),
            SourceRef::None => None,
        };
        let pwm = match spec.pwm {
            SourceRef::Osc(source) if spec.waveform != Waveform::Pulse => {
                self.spec(source)?;
                debug!(slot = slot + 1, waveform = %spec.waveform, "pwm ignored");
                None
            }
            SourceRef::Osc(source) => Some(self.modulator(source)?),
            SourceRef::None => None,
        };
        Ok((fm, pwm))
    }

    fn modulator(&mut self, slot: usize) -> Result<SharedLfo> {
        let spec = self.spec(slot)?;
        match &self.states[slot] {
            BuildState::Built(lfo) => return Ok(lfo.clone()),
            BuildState::Building => return Err(SynthError::CyclicModulation { slot }),
            BuildState::Unbuilt => {}
        }

        self.states[slot] = BuildState::Building;
        validate(spec, slot)?;
        let (fm, pwm) = self.sources(slot, spec)?;
        let node = compose(
            OscNode::from_spec(spec, self.base_frequency(spec, slot)?),
            fm,
            pwm,
        );
        let lfo = SharedLfo::new(apply_envelope(node, slot, &self.patch.envelopes)?);
        debug!(slot = slot + 1, waveform = %spec.waveform, "modulator built");

        self.states[slot] = BuildState::Built(lfo.clone());
        Ok(lfo)
    }
}

/// Build `patch` for one key press and bind it to the environment's
/// sample rate and block length. No filters beyond envelopes are applied.
pub fn build(patch: &Patch, env: BuildEnv) -> Result<BoundNode> {
    let (sample_rate, block_len) = (env.sample_rate, env.block_len);
    let node = GraphBuilder::new(patch, env).build()?;
    Ok(BoundNode::new(node, sample_rate, block_len))
}

fn compose(
    osc: OscNode,
    fm: Option<SharedLfo>,
    pwm: Option<SharedLfo>,
) -> Box<dyn GraphNode> {
    match (fm, pwm) {
        (None, None) => osc.boxed(),
        (Some(fm), None) => osc.modulate(fm, OscParam::Frequency, 1.0).boxed(),
        (None, Some(pwm)) => osc.modulate(pwm, OscParam::PulseWidth, 1.0).boxed(),
        (Some(fm), Some(pwm)) => osc
            .modulate(fm, OscParam::Frequency, 1.0)
            .modulate(pwm, OscParam::PulseWidth, 1.0)
            .boxed(),
    }
}

/// Per-kind field checks.
fn validate(spec: &OscillatorSpec, slot: usize) -> Result<()> {
    let fail = |msg: String| Err(SynthError::config(format!("osc {}: {msg}", slot + 1)));

    if !(0.0..=1.0).contains(&spec.amplitude) {
        return fail(format!("amplitude must be within 0..=1, got {}", spec.amplitude));
    }
    if !(0.0..1.0).contains(&spec.phase) {
        return fail(format!("phase must be within [0, 1), got {}", spec.phase));
    }
    if !(-1.0..=1.0).contains(&spec.bias) {
        return fail(format!("bias must be within -1..=1, got {}", spec.bias));
    }
    if spec.follow_keys && !(spec.key_ratio > 0.0) {
        return fail(format!("key ratio must be positive, got {}", spec.key_ratio));
    }

    match spec.waveform {
        Waveform::Linear => {
            if spec.frequency.is_some() {
                return fail("linear oscillator takes no frequency".into());
            }
            if spec.ramp.min > spec.ramp.max {
                return fail(format!(
                    "ramp min {} exceeds max {}",
                    spec.ramp.min, spec.ramp.max
                ));
            }
        }
        Waveform::Pulse => match spec.pulse_width {
            Some(width) if width > 0.0 && width < 1.0 => {}
            Some(width) => return fail(format!("pulse width must be within (0, 1), got {width}")),
            None => return fail("pulse width is required".into()),
        },
        Waveform::Harmonics => {
            if spec.harmonics.is_empty() {
                return fail("harmonics list is empty".into());
            }
            if let Some(h) = spec.harmonics.iter().find(|h| h.order == 0) {
                return fail(format!("harmonic order must be at least 1, got {}", h.order));
            }
        }
        _ => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        dsp::{Harmonic, Oscillator},
        graph::node::RenderCtx,
        patch::EnvelopeConfig,
    };

    const SR: f32 = 1_000.0;
    const BLOCK: usize = 100;

    fn env() -> BuildEnv {
        BuildEnv::new(SR, BLOCK)
    }

    fn render(mut bound: BoundNode, blocks: usize) -> Vec<f32> {
        let mut out = Vec::new();
        let mut block = vec![0.0; BLOCK];
        for _ in 0..blocks {
            assert!(bound.next_block(&mut block));
            out.extend_from_slice(&block);
        }
        out
    }

    fn render_node(mut node: impl GraphNode, blocks: usize) -> Vec<f32> {
        let mut ctx = RenderCtx::new(SR, BLOCK);
        let mut out = Vec::new();
        let mut block = vec![0.0; BLOCK];
        for _ in 0..blocks {
            node.render_block(&mut block, &ctx);
            out.extend_from_slice(&block);
            ctx.frame += 1;
        }
        out
    }

    fn assert_close(a: &[f32], b: &[f32]) {
        assert_eq!(a.len(), b.len());
        for (i, (x, y)) in a.iter().zip(b).enumerate() {
            assert!((x - y).abs() < 1e-5, "sample {i}: {x} vs {y}");
        }
    }

    fn two_slots(modulator: OscillatorSpec, carrier: OscillatorSpec) -> Patch {
        Patch {
            oscillators: vec![modulator, carrier],
            envelopes: Vec::new(),
            to_speaker: vec![1],
            ..Default::default()
        }
    }

    #[test]
    fn silent_modulator_is_neutral() {
        let silent = OscillatorSpec::new(Waveform::Sine, 3.0).with_amplitude(0.0);
        let plain = OscillatorSpec::new(Waveform::Pulse, 50.0).with_amplitude(0.8);
        let modulated = plain
            .clone()
            .with_fm(SourceRef::Osc(0))
            .with_pwm(SourceRef::Osc(0));

        let reference = render(build(&two_slots(silent.clone(), plain), env()).unwrap(), 4);
        let result = render(build(&two_slots(silent, modulated), env()).unwrap(), 4);
        assert_eq!(result, reference);
    }

    #[test]
    fn self_modulation_is_a_cycle() {
        let patch = Patch::single(OscillatorSpec::new(Waveform::Sine, 440.0).with_fm(SourceRef::Osc(0)));
        let result = build(&patch, env());
        assert!(matches!(result, Err(SynthError::CyclicModulation { slot: 0 })));
    }

    #[test]
    fn transitive_cycle_is_detected() {
        let sine = |source| OscillatorSpec::new(Waveform::Sine, 5.0).with_fm(SourceRef::Osc(source));
        let patch = Patch {
            oscillators: vec![sine(1), sine(2), sine(0)],
            envelopes: Vec::new(),
            to_speaker: vec![0],
            ..Default::default()
        };
        let result = build(&patch, env());
        assert!(matches!(result, Err(SynthError::CyclicModulation { .. })));
    }

    #[test]
    fn shared_modulator_is_not_a_cycle() {
        let lfo = OscillatorSpec::new(Waveform::Sine, 2.0).with_amplitude(0.1);
        let carrier = OscillatorSpec::new(Waveform::Pulse, 50.0)
            .with_fm(SourceRef::Osc(0))
            .with_pwm(SourceRef::Osc(0));
        assert!(build(&two_slots(lfo, carrier), env()).is_ok());
    }

    #[test]
    fn unknown_source_slot() {
        let patch = Patch::single(OscillatorSpec::new(Waveform::Sine, 440.0).with_fm(SourceRef::Osc(7)));
        assert!(matches!(build(&patch, env()), Err(SynthError::Configuration(_))));
    }

    #[test]
    fn empty_routing() {
        let patch = Patch {
            to_speaker: Vec::new(),
            ..Default::default()
        };
        assert!(matches!(build(&patch, env()), Err(SynthError::Routing)));
    }

    #[test]
    fn linear_cannot_reach_the_output() {
        let patch = Patch::single(OscillatorSpec::new(Waveform::Linear, 0.0));
        match build(&patch, env()) {
            Err(SynthError::Configuration(msg)) => assert!(msg.contains("linear")),
            other => panic!("unexpected {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn rejects_out_of_range_fields() {
        let cases = [
            OscillatorSpec::new(Waveform::Sine, 440.0).with_amplitude(1.5),
            OscillatorSpec {
                phase: 1.0,
                ..OscillatorSpec::new(Waveform::Sine, 440.0)
            },
            OscillatorSpec {
                pulse_width: Some(1.0),
                ..OscillatorSpec::new(Waveform::Pulse, 440.0)
            },
            OscillatorSpec {
                harmonics: Vec::new(),
                ..OscillatorSpec::new(Waveform::Harmonics, 440.0)
            },
            OscillatorSpec {
                frequency: None,
                ..OscillatorSpec::new(Waveform::Sine, 440.0)
            },
            OscillatorSpec::new(Waveform::Sine, -1.0),
        ];
        for spec in cases {
            let patch = Patch::single(spec.clone());
            assert!(
                matches!(build(&patch, env()), Err(SynthError::Configuration(_))),
                "{spec:?} should be rejected"
            );
        }
    }

    #[test]
    fn built_node_remembers_its_spec() {
        let spec = OscillatorSpec {
            phase: 0.25,
            bias: -0.1,
            harmonics: vec![Harmonic {
                order: 3,
                weight: 0.5,
            }],
            ..OscillatorSpec::new(Waveform::Harmonics, 330.0).with_amplitude(0.7)
        };
        let patch = Patch::single(spec.clone());
        let builder = GraphBuilder::new(&patch, env());
        let node = builder.oscillator(0).unwrap();
        assert_eq!(node.spec(), Some(&spec));
        assert_eq!(node.frequency(), 330.0);
    }

    #[test]
    fn follows_the_pressed_key() {
        let patch = Patch {
            oscillators: vec![
                OscillatorSpec::new(Waveform::Sine, 100.0).following_keys(2.0),
                OscillatorSpec::new(Waveform::Sine, 100.0),
            ],
            ..Default::default()
        };
        let builder = GraphBuilder::new(&patch, env().with_key(220.0));
        assert_eq!(builder.oscillator(0).unwrap().frequency(), 440.0);
        assert_eq!(builder.oscillator(1).unwrap().frequency(), 100.0);
    }

    #[test]
    fn chord_copies_share_amplitude_and_modulator() {
        let lfo = OscillatorSpec::new(Waveform::Sine, 7.0).with_amplitude(0.2);
        let carrier = OscillatorSpec::new(Waveform::Sine, 100.0)
            .with_amplitude(0.9)
            .following_keys(1.0)
            .with_fm(SourceRef::Osc(0));
        let chord = vec![100.0, 125.0, 150.0];
        let patch = two_slots(lfo.clone(), carrier.clone());
        let result = render(build(&patch, env().with_chord(chord.clone())).unwrap(), 3);

        // One private modulator per copy, advanced exactly as the shared one is.
        let copies: Vec<Box<dyn GraphNode>> = chord
            .iter()
            .map(|&f| {
                let lfo = OscNode::from_spec(&lfo, 7.0);
                OscNode::new(Oscillator::new(Waveform::Sine, f).with_amplitude(0.3))
                    .modulate(lfo, OscParam::Frequency, 1.0)
                    .boxed()
            })
            .collect();
        let expected = render_node(Mix::new(copies), 3);

        assert_close(&result, &expected);
        assert!(result.iter().all(|s| s.abs() <= 0.9 + 1e-5));
    }

    #[test]
    fn fixed_slots_transpose_with_the_chord() {
        let patch = Patch::single(OscillatorSpec::new(Waveform::Sine, 200.0).with_amplitude(0.5));
        let result = render(
            build(&patch, env().with_key(440.0).with_chord(vec![100.0, 150.0])).unwrap(),
            2,
        );
        let expected = render_node(
            OscNode::new(Oscillator::new(Waveform::Sine, 200.0).with_amplitude(0.25))
                .mix(OscNode::new(Oscillator::new(Waveform::Sine, 300.0).with_amplitude(0.25))),
            2,
        );
        assert_close(&result, &expected);
    }

    #[test]
    fn output_slots_sum_unscaled() {
        let quarter = OscillatorSpec::new(Waveform::Sine, 50.0).with_amplitude(0.25);
        let patch = Patch {
            oscillators: vec![quarter.clone(), quarter],
            envelopes: Vec::new(),
            to_speaker: vec![0, 1],
            ..Default::default()
        };
        let half = Patch::single(OscillatorSpec::new(Waveform::Sine, 50.0).with_amplitude(0.5));
        assert_close(
            &render(build(&patch, env()).unwrap(), 2),
            &render(build(&half, env()).unwrap(), 2),
        );
    }

    #[test]
    fn pwm_on_sine_is_ignored() {
        let lfo = OscillatorSpec::new(Waveform::Sine, 3.0);
        let sine = OscillatorSpec::new(Waveform::Sine, 50.0);
        let reference = render(build(&two_slots(lfo.clone(), sine.clone()), env()).unwrap(), 2);
        let result = render(
            build(&two_slots(lfo, sine.with_pwm(SourceRef::Osc(0))), env()).unwrap(),
            2,
        );
        assert_eq!(result, reference);
    }

    #[test]
    fn envelope_shapes_bound_slot() {
        let mut patch = Patch::single(OscillatorSpec::new(Waveform::Sine, 50.0));
        patch.envelopes = vec![EnvelopeConfig {
            source: Some(0),
            attack: 0.1,
            decay: 0.0,
            sustain: 0.1,
            sustain_level: 1.0,
            release: 0.0,
            stop_at_end: true,
        }];
        let mut bound = build(&patch, env()).unwrap();
        let mut block = vec![0.0; BLOCK];
        assert!(bound.next_block(&mut block));
        assert_eq!(block[0], 0.0);
        let mut blocks = 1;
        while bound.next_block(&mut block) && blocks < 10 {
            blocks += 1;
        }
        assert!(blocks < 10, "finite envelope ends the voice");
    }

    #[test]
    fn preview_builds_one_slot() {
        let patch = Patch::default();
        let mut builder = GraphBuilder::new(&patch, env());
        assert!(builder.build_slot(0).is_ok());
        assert!(builder.build_slot(9).is_err());
    }
}
