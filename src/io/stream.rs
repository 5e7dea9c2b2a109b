use std::sync::{
    atomic::{AtomicBool, AtomicU8, Ordering},
    Arc,
};

use tracing::debug;

use crate::{
    error::{OverflowCondition, Result, SynthError},
    graph::node::BoundNode,
    io::converter::PcmConverter,
};

/*
Streaming Adapter
=================

Turns a bound graph into integer PCM for an audio sink, in one of two ways:

  StreamSource   lazy: one block per `pull()`, for as long as the voice plays
  render()       eager: a finite buffer of known length, with short fades

Block Contract
--------------

The graph renders blocks of exactly the length the sink pulls. A mismatch
is refused when the stream is created; there is no resampling or
re-blocking.

Voice Control
-------------

A `VoiceControl` is shared between the stream (owned by the sink) and the
scheduler (which keeps a clone). It is checked before every pull:

  Playing     render the next block
  Releasing   send note-off into the graph once, keep pulling; sources fall
              silent while echo tails ring out and the graph ends itself
  Stopped     end the stream; nothing further is rendered

The stream also ends when the graph is exhausted or the optional maximum
duration has elapsed. It never loops.
*/

/// Length of the fade applied at both ends of a rendered note.
pub const FADE_SECONDS: f32 = 0.05;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayState {
    Playing,
    Releasing,
    Stopped,
}

impl PlayState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => PlayState::Playing,
            1 => PlayState::Releasing,
            _ => PlayState::Stopped,
        }
    }
}

#[derive(Debug, Default)]
struct ControlState {
    state: AtomicU8,
    overflowed: AtomicBool,
}

/// Cancellation handle shared by a stream and whoever started it.
#[derive(Debug, Clone, Default)]
pub struct VoiceControl {
    inner: Arc<ControlState>,
}

impl VoiceControl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> PlayState {
        PlayState::from_u8(self.inner.state.load(Ordering::Acquire))
    }

    /// Ask the graph to release. Has no effect once stopped.
    pub fn release(&self) {
        let _ = self.inner.state.compare_exchange(
            PlayState::Playing as u8,
            PlayState::Releasing as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
    }

    pub fn stop(&self) {
        self.inner
            .state
            .store(PlayState::Stopped as u8, Ordering::Release);
    }

    pub fn is_stopped(&self) -> bool {
        self.state() == PlayState::Stopped
    }

    /// Whether the stream has hit a PCM overflow.
    pub fn overflowed(&self) -> bool {
        self.inner.overflowed.load(Ordering::Relaxed)
    }

    pub(crate) fn report_overflow(&self) {
        self.inner.overflowed.store(true, Ordering::Relaxed);
    }
}

/// Lazily rendered PCM blocks for one voice.
pub struct StreamSource {
    node: BoundNode,
    converter: PcmConverter,
    control: VoiceControl,
    float_block: Vec<f32>,
    pcm_block: Vec<i32>,
    max_blocks: Option<u64>,
    released: bool,
    finished: bool,
}

impl StreamSource {
    pub fn new(
        node: BoundNode,
        sink_block_len: usize,
        sample_width: u8,
        max_duration: Option<f32>,
        control: VoiceControl,
    ) -> Result<Self> {
        if node.block_len() != sink_block_len {
            return Err(SynthError::BlockSizeMismatch {
                node: node.block_len(),
                sink: sink_block_len,
            });
        }

        let max_blocks = max_duration.map(|secs| {
            (secs.max(0.0) * node.sample_rate() / sink_block_len as f32).ceil() as u64
        });

        Ok(Self {
            converter: PcmConverter::new(sample_width)?,
            float_block: vec![0.0; sink_block_len],
            pcm_block: vec![0; sink_block_len],
            node,
            control,
            max_blocks,
            released: false,
            finished: false,
        })
    }

    pub fn block_len(&self) -> usize {
        self.pcm_block.len()
    }

    pub fn sample_width(&self) -> u8 {
        self.converter.sample_width()
    }

    pub fn control(&self) -> &VoiceControl {
        &self.control
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Render the next block, or `None` once the stream has ended.
    pub fn pull(&mut self) -> Option<&[i32]> {
        if self.finished {
            return None;
        }

        match self.control.state() {
            PlayState::Stopped => return self.finish("stopped"),
            PlayState::Releasing if !self.released => {
                self.node.note_off();
                self.released = true;
            }
            _ => {}
        }

        if self
            .max_blocks
            .is_some_and(|max| self.node.frame() >= max)
        {
            return self.finish("duration elapsed");
        }
        if !self.node.next_block(&mut self.float_block) {
            return self.finish("graph exhausted");
        }

        if self
            .converter
            .convert(&self.float_block, &mut self.pcm_block)
            .is_some()
        {
            self.control.report_overflow();
        }
        Some(&self.pcm_block)
    }

    fn finish(&mut self, reason: &str) -> Option<&[i32]> {
        debug!(blocks = self.node.frame(), reason, "stream ended");
        self.finished = true;
        None
    }
}

/// A finite block of PCM samples.
#[derive(Debug, Clone, PartialEq)]
pub struct PcmBuffer {
    pub samples: Vec<i32>,
    pub sample_rate: f32,
    pub sample_width: u8,
    /// Set when conversion had to clip.
    pub overflow: Option<OverflowCondition>,
}

impl PcmBuffer {
    pub fn duration(&self) -> f32 {
        self.samples.len() as f32 / self.sample_rate
    }
}

/// Eagerly render `duration` seconds of `node`, faded in and out.
///
/// Rendering stops early if the graph is exhausted.
pub fn render(mut node: BoundNode, duration: f32, sample_width: u8) -> Result<PcmBuffer> {
    let mut converter = PcmConverter::new(sample_width)?;
    let block_len = node.block_len();
    let sample_rate = node.sample_rate();
    let blocks = (duration.max(0.0) * sample_rate / block_len as f32).ceil() as usize;

    let mut floats = vec![0.0; blocks * block_len];
    let mut rendered = 0;
    for block in floats.chunks_exact_mut(block_len) {
        if !node.next_block(block) {
            break;
        }
        rendered += block_len;
    }
    floats.truncate(rendered);
    apply_fades(&mut floats, (FADE_SECONDS * sample_rate) as usize);

    let mut samples = vec![0; floats.len()];
    let overflow = converter.convert(&floats, &mut samples);
    debug!(samples = samples.len(), duration, "rendered");

    Ok(PcmBuffer {
        samples,
        sample_rate,
        sample_width,
        overflow,
    })
}

fn apply_fades(samples: &mut [f32], fade_len: usize) {
    let fade_len = fade_len.min(samples.len() / 2);
    if fade_len == 0 {
        return;
    }
    let len = samples.len();
    for i in 0..fade_len {
        let gain = i as f32 / fade_len as f32;
        samples[i] *= gain;
        samples[len - 1 - i] *= gain;
    }
}
