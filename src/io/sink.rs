use tracing::debug;

use crate::{
    error::{Result, SynthError},
    io::stream::{PcmBuffer, StreamSource, VoiceControl},
};

/// Something a sink can play: a finished buffer or a pull stream.
pub enum SinkSource {
    Buffer(PcmBuffer),
    Stream(StreamSource),
}

/// Identifies one playback started on a sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PlaybackHandle(u64);

impl PlaybackHandle {
    /// For sinks outside this crate that mint their own handles.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn id(self) -> u64 {
        self.0
    }
}

/// Destination for rendered voices.
///
/// Sinks only pull; they never call back into the scheduler. `stop` on a
/// handle that already finished is a no-op.
pub trait AudioSink {
    /// Start `source` after `delay` seconds.
    fn play(&mut self, source: SinkSource, delay: f32) -> Result<PlaybackHandle>;
    fn stop(&mut self, handle: PlaybackHandle);
    fn is_playing(&self, handle: PlaybackHandle) -> bool;
    fn close(&mut self);
}

struct Track {
    handle: PlaybackHandle,
    stream: Option<StreamSource>,
    pending: Vec<i32>,
    cursor: usize,
    /// Samples of silence left before the source starts.
    delay: usize,
}

impl Track {
    /// Add this track into `acc`. Returns false once the source has ended.
    fn mix_into(&mut self, acc: &mut [i64]) -> bool {
        let skip = self.delay.min(acc.len());
        self.delay -= skip;
        let mut i = skip;

        while i < acc.len() {
            if self.cursor == self.pending.len() {
                let Some(block) = self.stream.as_mut().and_then(StreamSource::pull) else {
                    return false;
                };
                self.pending.clear();
                self.pending.extend_from_slice(block);
                self.cursor = 0;
            }

            let n = (acc.len() - i).min(self.pending.len() - self.cursor);
            for (a, &s) in acc[i..i + n]
                .iter_mut()
                .zip(&self.pending[self.cursor..self.cursor + n])
            {
                *a += s as i64;
            }
            i += n;
            self.cursor += n;
        }

        self.stream.is_some() || self.cursor < self.pending.len()
    }

    fn control(&self) -> Option<&VoiceControl> {
        self.stream.as_ref().map(StreamSource::control)
    }
}

/// Software sink summing every playing source into one mono signal.
///
/// Delays are honoured to the sample. The sum saturates at the limits of the
/// configured sample width instead of wrapping.
pub struct Mixer {
    sample_rate: f32,
    block_len: usize,
    sample_width: u8,
    tracks: Vec<Track>,
    accumulator: Vec<i64>,
    next_handle: u64,
    closed: bool,
}

impl Mixer {
    pub fn new(sample_rate: f32, block_len: usize, sample_width: u8) -> Self {
        Self {
            sample_rate,
            block_len,
            sample_width,
            tracks: Vec::new(),
            accumulator: Vec::new(),
            next_handle: 0,
            closed: false,
        }
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    pub fn block_len(&self) -> usize {
        self.block_len
    }

    /// Number of sources still playing or waiting on their delay.
    pub fn active(&self) -> usize {
        self.tracks.len()
    }

    /// Fill `out` with the next `out.len()` mixed samples.
    pub fn mix_block(&mut self, out: &mut [i32]) {
        self.accumulator.clear();
        self.accumulator.resize(out.len(), 0);

        let acc = &mut self.accumulator;
        self.tracks.retain_mut(|track| {
            let playing = track.mix_into(acc);
            if !playing {
                debug!(handle = track.handle.0, "playback finished");
            }
            playing
        });

        let max = (1i64 << (8 * self.sample_width as u32 - 1)) - 1;
        for (o, &a) in out.iter_mut().zip(self.accumulator.iter()) {
            *o = a.clamp(-max - 1, max) as i32;
        }
    }

    /// Magnitude of a full-scale sample at this sink's width, for
    /// converting mixed PCM back to floats.
    pub fn full_scale(&self) -> f32 {
        (1i64 << (8 * self.sample_width as u32 - 1)) as f32
    }
}

impl AudioSink for Mixer {
    fn play(&mut self, source: SinkSource, delay: f32) -> Result<PlaybackHandle> {
        if self.closed {
            return Err(SynthError::config("audio sink is closed"));
        }

        let (stream, pending) = match source {
            SinkSource::Stream(stream) => {
                if stream.block_len() != self.block_len {
                    return Err(SynthError::BlockSizeMismatch {
                        node: stream.block_len(),
                        sink: self.block_len,
                    });
                }
                (Some(stream), Vec::with_capacity(self.block_len))
            }
            SinkSource::Buffer(buffer) => {
                if buffer.sample_rate != self.sample_rate {
                    return Err(SynthError::config(format!(
                        "buffer sample rate {} does not match sink rate {}",
                        buffer.sample_rate, self.sample_rate
                    )));
                }
                (None, buffer.samples)
            }
        };

        let handle = PlaybackHandle(self.next_handle);
        self.next_handle += 1;
        let delay = (delay.max(0.0) * self.sample_rate).round() as usize;
        debug!(handle = handle.0, delay, "playback scheduled");

        self.tracks.push(Track {
            handle,
            stream,
            pending,
            cursor: 0,
            delay,
        });
        Ok(handle)
    }

    fn stop(&mut self, handle: PlaybackHandle) {
        self.tracks.retain(|track| {
            if track.handle != handle {
                return true;
            }
            if let Some(control) = track.control() {
                control.stop();
            }
            debug!(handle = handle.0, "playback stopped");
            false
        });
    }

    fn is_playing(&self, handle: PlaybackHandle) -> bool {
        self.tracks.iter().any(|track| track.handle == handle)
    }

    fn close(&mut self) {
        for track in &self.tracks {
            if let Some(control) = track.control() {
                control.stop();
            }
        }
        self.tracks.clear();
        self.closed = true;
    }
}
