use crate::{
    io::{
        sink::{AudioSink, PlaybackHandle},
        stream::VoiceControl,
    },
    sequencing::notes::Key,
    synth::timer::TimerId,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoiceState {
    Playing,   // Key held, or a rendered note still sounding
    Releasing, // Key released, echo tail ringing out
}

/// One playing note (or chord) started by a key press.
pub struct Voice {
    key: Key,
    frequency: f32,
    state: VoiceState,
    handle: PlaybackHandle,
    /// Present for streamed voices; rendered buffers cannot be released softly.
    control: Option<VoiceControl>,
    /// Seconds the voice rings after release.
    tail: f32,
    overflow_reported: bool,
}

impl Voice {
    pub fn new(
        key: Key,
        frequency: f32,
        handle: PlaybackHandle,
        control: Option<VoiceControl>,
        tail: f32,
    ) -> Self {
        Self {
            key,
            frequency,
            state: VoiceState::Playing,
            handle,
            control,
            tail,
            overflow_reported: false,
        }
    }

    /// Release the voice.
    ///
    /// A streamed voice with an echo tail is released softly: its sources
    /// stop and the tail finishes on its own. Anything else is stopped.
    /// Returns true if the voice is gone.
    pub fn release(&mut self, sink: &mut impl AudioSink) -> bool {
        match &self.control {
            Some(control) if self.tail > 0.0 => {
                control.release();
                self.state = VoiceState::Releasing;
                false
            }
            _ => {
                self.stop(sink);
                true
            }
        }
    }

    pub fn stop(&mut self, sink: &mut impl AudioSink) {
        if let Some(control) = &self.control {
            control.stop();
        }
        sink.stop(self.handle);
    }

    pub fn is_playing(&self, sink: &impl AudioSink) -> bool {
        sink.is_playing(self.handle)
    }

    /// True the first time the stream is seen to overflow.
    pub fn take_overflow(&mut self) -> bool {
        let overflowed = self
            .control
            .as_ref()
            .is_some_and(VoiceControl::overflowed);
        if overflowed && !self.overflow_reported {
            self.overflow_reported = true;
            return true;
        }
        false
    }

    pub fn key(&self) -> Key {
        self.key
    }

    pub fn frequency(&self) -> f32 {
        self.frequency
    }

    pub fn state(&self) -> VoiceState {
        self.state
    }

    pub fn handle(&self) -> PlaybackHandle {
        self.handle
    }
}

/// A repeating arpeggio started by one key press.
///
/// Each round plays one short streamed voice per note, offset by the step
/// length, and schedules the next round when the last note's slot ends.
pub struct ArpeggioCycle {
    key: Key,
    keys: Vec<Key>,
    /// Seconds between note starts.
    step: f32,
    /// Percentage of the step each note sounds for.
    ratio: u32,
    timer: Option<TimerId>,
    /// Sub-voices in flight.
    notes: Vec<(PlaybackHandle, VoiceControl)>,
    overflowed: bool,
    overflow_reported: bool,
}

impl ArpeggioCycle {
    pub fn new(key: Key, keys: Vec<Key>, step: f32, ratio: u32) -> Self {
        Self {
            key,
            keys,
            step,
            ratio,
            timer: None,
            notes: Vec::new(),
            overflowed: false,
            overflow_reported: false,
        }
    }

    pub fn key(&self) -> Key {
        self.key
    }

    pub fn keys(&self) -> &[Key] {
        &self.keys
    }

    /// Sink delay of the note at `index` within a round.
    pub fn delay(&self, index: usize) -> f32 {
        self.step * index as f32
    }

    /// How long each note sounds.
    pub fn note_duration(&self) -> f32 {
        self.step * self.ratio as f32 / 100.0
    }

    /// Seconds from the start of one round to the next.
    pub fn period(&self) -> f32 {
        self.step * self.keys.len() as f32
    }

    pub fn timer(&self) -> Option<TimerId> {
        self.timer
    }

    pub fn set_timer(&mut self, timer: TimerId) {
        self.timer = Some(timer);
    }

    pub fn push_note(&mut self, handle: PlaybackHandle, control: VoiceControl) {
        self.notes.push((handle, control));
    }

    /// Forget sub-voices the sink has finished with, remembering whether
    /// any of them clipped.
    pub fn prune(&mut self, sink: &impl AudioSink) {
        self.note_overflow();
        self.notes.retain(|(handle, _)| sink.is_playing(*handle));
    }

    pub fn in_flight(&self) -> usize {
        self.notes.len()
    }

    fn note_overflow(&mut self) {
        self.overflowed |= self.notes.iter().any(|(_, control)| control.overflowed());
    }

    /// True the first time any sub-voice is seen to overflow.
    pub fn take_overflow(&mut self) -> bool {
        self.note_overflow();
        if self.overflowed && !self.overflow_reported {
            self.overflow_reported = true;
            return true;
        }
        false
    }

    /// Stop every sub-voice. The caller cancels the repeat timer.
    pub fn stop(&mut self, sink: &mut impl AudioSink) -> Option<TimerId> {
        for (handle, control) in self.notes.drain(..) {
            control.stop();
            sink.stop(handle);
        }
        self.timer.take()
    }
}
