#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopeState {
    Attack,  // ramping 0 → 1
    Decay,   // ramping 1 → sustain level
    Sustain, // holding the sustain level for the sustain time
    Release, // ramping sustain level → 0
    Done,    // silent
}

/// Timed ADSR envelope.
///
/// Unlike a gated envelope the sustain phase has a fixed length, so the whole
/// shape is known up front and `duration()` can size rendered notes.
pub struct Envelope {
    // Shape (seconds, except the level)
    attack: f32,
    decay: f32,
    sustain: f32,
    sustain_level: f32,
    release: f32,
    /// When set, the envelope reports itself inactive once the release ends.
    stop_at_end: bool,

    // Runtime state
    stage: EnvelopeState,
    level: f32,
    elapsed: u32, // samples spent in the current stage
}

impl Envelope {
    pub fn adsr(attack: f32, decay: f32, sustain: f32, sustain_level: f32, release: f32) -> Self {
        Self {
            attack: attack.max(0.0),
            decay: decay.max(0.0),
            sustain: sustain.max(0.0),
            sustain_level: sustain_level.clamp(0.0, 1.0),
            release: release.max(0.0),
            stop_at_end: false,
            stage: EnvelopeState::Attack,
            level: 0.0,
            elapsed: 0,
        }
    }

    pub fn with_stop_at_end(mut self, stop: bool) -> Self {
        self.stop_at_end = stop;
        self
    }

    /// Total length of all four stages in seconds.
    pub fn duration(&self) -> f32 {
        self.attack + self.decay + self.sustain + self.release
    }

    fn stage_shape(&self, sample_rate: f32) -> Option<(u32, f32, f32, EnvelopeState)> {
        let samples = |secs: f32| (secs * sample_rate).round() as u32;
        let sl = self.sustain_level;
        match self.stage {
            EnvelopeState::Attack => Some((samples(self.attack), 0.0, 1.0, EnvelopeState::Decay)),
            EnvelopeState::Decay => Some((samples(self.decay), 1.0, sl, EnvelopeState::Sustain)),
            EnvelopeState::Sustain => Some((samples(self.sustain), sl, sl, EnvelopeState::Release)),
            EnvelopeState::Release => Some((samples(self.release), sl, 0.0, EnvelopeState::Done)),
            EnvelopeState::Done => None,
        }
    }

    /// Advance by one sample and return the gain for it.
    pub fn next_sample(&mut self, sample_rate: f32) -> f32 {
        // Zero-length stages are skipped without emitting a sample.
        while let Some((len, from, to, next)) = self.stage_shape(sample_rate) {
            if self.elapsed < len {
                let progress = self.elapsed as f32 / len as f32;
                self.level = from + (to - from) * progress;
                self.elapsed += 1;
                return self.level;
            }
            self.stage = next;
            self.elapsed = 0;
        }

        self.level = 0.0;
        self.level
    }

    pub fn render(&mut self, buffer: &mut [f32], sample_rate: f32) {
        for sample in buffer.iter_mut() {
            *sample = self.next_sample(sample_rate);
        }
    }

    pub fn is_active(&self) -> bool {
        !(self.stop_at_end && self.stage == EnvelopeState::Done)
    }

    pub fn reset(&mut self) {
        self.stage = EnvelopeState::Attack;
        self.level = 0.0;
        self.elapsed = 0;
    }

    pub fn level(&self) -> f32 {
        self.level
    }

    pub fn state(&self) -> EnvelopeState {
        self.stage
    }
}
