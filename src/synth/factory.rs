use tracing::debug;

use crate::{
    config::EngineConfig,
    error::Result,
    graph::{
        builder::{BuildEnv, GraphBuilder},
        chain::FilterChain,
        node::{BoundNode, GraphNode},
    },
    patch::Patch,
    sequencing::notes::Key,
};

/// Length of an oscillator preview, in seconds.
pub const PREVIEW_SECONDS: f32 = 1.0;

/// Render length used when no envelope bounds a note.
const UNSHAPED_NOTE_SECONDS: f32 = 1.0;

/// A voice graph ready to hand to the streaming adapter.
pub struct PreparedVoice {
    pub node: BoundNode,
    /// Seconds the filter chain keeps ringing after release.
    pub tail: f32,
}

/// Builds voice graphs from the current patch.
///
/// This is the "instrument design" layer: the patch says what a note sounds
/// like, the factory turns a key press into a bound, filtered graph.
pub struct VoiceFactory {
    config: EngineConfig,
}

impl VoiceFactory {
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn frequency(&self, key: Key) -> f32 {
        key.frequency(self.config.a4_tuning)
    }

    fn env(&self) -> BuildEnv {
        BuildEnv::new(self.config.sample_rate_f32(), self.config.block_len)
    }

    fn bind(&self, node: Box<dyn GraphNode>) -> BoundNode {
        BoundNode::new(node, self.config.sample_rate_f32(), self.config.block_len)
    }

    /// A single note, or a chord when `keys` holds more than one key, with
    /// the full filter chain.
    pub fn note(&self, patch: &Patch, keys: &[Key]) -> Result<PreparedVoice> {
        let chain = FilterChain::from_patch(patch)?;
        let mut env = self.env();
        if let Some(&root) = keys.first() {
            env = env.with_key(self.frequency(root));
        }
        if keys.len() > 1 {
            env = env.with_chord(keys.iter().map(|&key| self.frequency(key)).collect());
        }

        let node = GraphBuilder::new(patch, env).build()?;
        let node = chain.apply(node, self.config.sample_rate_f32());
        debug!(keys = keys.len(), tail = chain.tail(), "note voice built");

        Ok(PreparedVoice {
            node: self.bind(node),
            tail: chain.tail(),
        })
    }

    /// One arpeggio step. Envelopes apply; tremolo and echo do not.
    pub fn arpeggio_step(&self, patch: &Patch, key: Key) -> Result<BoundNode> {
        let env = self.env().with_key(self.frequency(key));
        let node = GraphBuilder::new(patch, env).build()?;
        Ok(self.bind(node))
    }

    /// One oscillator slot on its own, filtered like a note.
    pub fn preview(&self, patch: &Patch, slot: usize) -> Result<PreparedVoice> {
        let chain = FilterChain::from_patch(patch)?;
        let node = GraphBuilder::new(patch, self.env()).build_slot(slot)?;
        let node = chain.apply(node, self.config.sample_rate_f32());

        Ok(PreparedVoice {
            node: self.bind(node),
            tail: chain.tail(),
        })
    }

    /// Length of a rendered note: the longest envelope (or one second
    /// without one) plus the echo tail, capped at `render_max`.
    pub fn render_duration(&self, patch: &Patch, tail: f32) -> f32 {
        let shaped = patch.envelope_duration();
        let body = if shaped > 0.0 {
            shaped
        } else {
            UNSHAPED_NOTE_SECONDS
        };
        (body + tail).min(self.config.render_max)
    }
}
