use std::collections::HashMap;

use tracing::{debug, info, warn};

use crate::{
    config::{EngineConfig, RenderMode},
    error::{Result, SynthError},
    io::{
        sink::{AudioSink, SinkSource},
        stream::{render, StreamSource, VoiceControl},
    },
    patch::Patch,
    sequencing::{
        chord::{describe, expand},
        notes::Key,
    },
    synth::{
        factory::{VoiceFactory, PREVIEW_SECONDS},
        message::{HostEvent, MessageReceiver},
        timer::TimerQueue,
        voice::{ArpeggioCycle, Voice},
    },
};

/*
Voice Scheduler
===============

Owns the patch, the sink and every playing voice, and runs on a single
cooperative timeline: the host calls `tick(now)` regularly and feeds events
in between. Nothing here blocks or spawns.

Key Lifecycle
-------------

  idle ──press──→ pressed ──release──→ releasing ──tail done──→ idle
                     │                                          ↑
                     └────────── exhausted (reaped on tick) ────┘

  key_down   ignored when the same key was pressed less than `debounce`
             seconds ago (keyboard auto-repeat); every press refreshes the
             timestamp
  key_up     counted, then confirmed `release_confirm` seconds later; the
             release happens when the last pending confirmation fires, so a
             burst of auto-repeat ups releases only once
  release    immediate

At most one voice or arpeggio exists per key. A new press stops the old one.

Arpeggios
---------

One press in arpeggio mode plays a round of short streamed voices, one per
note, each delayed by `step × index` and lasting `step × ratio / 100`. A
timer repeats the round every `step × notes`. Release cancels the timer and
stops every sub-voice still in flight.

Failures
--------

A failed press, preview or parameter change leaves every playing voice
untouched; the error becomes the status line.
*/

enum TimerEvent {
    ConfirmRelease(Key),
    ArpeggioRound(Key),
}

enum KeyVoice {
    Note(Voice),
    Arpeggio(ArpeggioCycle),
}

pub struct VoiceScheduler<S: AudioSink> {
    sink: S,
    factory: VoiceFactory,
    patch: Patch,
    voices: HashMap<Key, KeyVoice>,
    last_press: HashMap<Key, f64>,
    pending_releases: HashMap<Key, u32>,
    timers: TimerQueue<TimerEvent>,
    status: String,
}

impl<S: AudioSink> VoiceScheduler<S> {
    pub fn new(sink: S, patch: Patch, config: EngineConfig) -> Result<Self> {
        Ok(Self {
            sink,
            factory: VoiceFactory::new(config)?,
            patch,
            voices: HashMap::new(),
            last_press: HashMap::new(),
            pending_releases: HashMap::new(),
            timers: TimerQueue::new(),
            status: String::from("ok"),
        })
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn patch(&self) -> &Patch {
        &self.patch
    }

    pub fn config(&self) -> &EngineConfig {
        self.factory.config()
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    /// Keys with a voice or arpeggio attached.
    pub fn active_keys(&self) -> Vec<Key> {
        let mut keys: Vec<Key> = self.voices.keys().copied().collect();
        keys.sort();
        keys
    }

    pub fn is_sounding(&self, key: Key) -> bool {
        self.voices.contains_key(&key)
    }

    /// Dispatch one host event.
    pub fn handle(&mut self, event: HostEvent, now: f64) -> Result<()> {
        match event {
            HostEvent::KeyDown(key) => self.key_down(key, now),
            HostEvent::KeyUp(key) => {
                self.key_up(key, now);
                Ok(())
            }
            HostEvent::Release(key) => {
                self.release(key);
                Ok(())
            }
            HostEvent::Preview { slot } => self.preview(slot),
            HostEvent::SetParam { path, value } => self.set_param(&path, &value),
            HostEvent::AllNotesOff => {
                self.all_notes_off();
                Ok(())
            }
        }
    }

    /// Drain every queued host event. Errors are already in the status line.
    pub fn drain(&mut self, events: &mut impl MessageReceiver, now: f64) {
        while let Some(event) = events.pop() {
            let _ = self.handle(event, now);
        }
    }

    /// A key went down on the host keyboard.
    pub fn key_down(&mut self, key: Key, now: f64) -> Result<()> {
        let previous = self.last_press.insert(key, now);
        if let Some(previous) = previous {
            if now - previous < self.config().debounce as f64 {
                debug!(%key, "auto-repeat ignored");
                return Ok(());
            }
        }
        self.press(key, now)
    }

    /// A key went up on the host keyboard; the release is confirmed later.
    pub fn key_up(&mut self, key: Key, now: f64) {
        *self.pending_releases.entry(key).or_default() += 1;
        let due = now + self.config().release_confirm as f64;
        self.timers.schedule(due, TimerEvent::ConfirmRelease(key));
    }

    /// Start a voice for `key` right away.
    pub fn press(&mut self, key: Key, now: f64) -> Result<()> {
        let result = self.try_press(key, now);
        if let Err(err) = &result {
            self.fail(err);
        }
        result
    }

    fn try_press(&mut self, key: Key, now: f64) -> Result<()> {
        if self.patch.to_speaker.is_empty() {
            return Err(SynthError::Routing);
        }

        let mode = self.patch.arpeggio.mode;
        let keys = expand(key, mode);
        if mode.is_arpeggio() {
            self.patch.arpeggio.validate()?;
            let mut cycle = ArpeggioCycle::new(
                key,
                keys,
                self.patch.arpeggio.rate,
                self.patch.arpeggio.ratio,
            );
            let round = self.prepare_round(&cycle)?;
            self.silence(key);
            self.play_round(&mut cycle, round)?;

            let period = cycle.period() as f64;
            self.status = format!(
                "playing ARP ({}) from note {} {}: {}",
                cycle.keys().len(),
                key.note,
                key.octave,
                describe(cycle.keys())
            );
            self.voices.insert(key, KeyVoice::Arpeggio(cycle));
            self.schedule_round(key, now + period);
            info!(%key, %mode, "arpeggio started");
            return Ok(());
        }

        let prepared = self.factory.note(&self.patch, &keys)?;
        let config = self.factory.config();
        let frequency = self.factory.frequency(key);
        let mut overflow = None;
        let (source, control, tail) = match config.rendering {
            RenderMode::Render => {
                let duration = self.factory.render_duration(&self.patch, prepared.tail);
                let buffer = render(prepared.node, duration, config.sample_width)?;
                overflow = buffer.overflow;
                (SinkSource::Buffer(buffer), None, 0.0)
            }
            RenderMode::Stream => {
                let control = VoiceControl::new();
                let stream = StreamSource::new(
                    prepared.node,
                    config.block_len,
                    config.sample_width,
                    None,
                    control.clone(),
                )?;
                (SinkSource::Stream(stream), Some(control), prepared.tail)
            }
        };

        // The old voice must be gone before the new one can be heard.
        self.silence(key);
        let handle = self.sink.play(source, 0.0)?;
        let voice = Voice::new(key, frequency, handle, control, tail);
        self.voices.insert(key, KeyVoice::Note(voice));

        self.status = match overflow {
            Some(condition) => condition.to_string(),
            None if keys.len() > 1 => format!("playing chord {}", describe(&keys)),
            None => format!("playing note {} {}", key.note, key.octave),
        };
        info!(%key, frequency, "voice started");
        Ok(())
    }

    /// Build every sub-voice of one round without starting any.
    fn prepare_round(&self, cycle: &ArpeggioCycle) -> Result<Vec<(StreamSource, VoiceControl)>> {
        let config = self.factory.config();
        let mut round = Vec::with_capacity(cycle.keys().len());
        for &key in cycle.keys() {
            let node = self.factory.arpeggio_step(&self.patch, key)?;
            let control = VoiceControl::new();
            let stream = StreamSource::new(
                node,
                config.block_len,
                config.sample_width,
                Some(cycle.note_duration()),
                control.clone(),
            )?;
            round.push((stream, control));
        }
        Ok(round)
    }

    /// Start a prepared round. If the sink refuses a note, every note of
    /// the cycle already started is stopped again.
    fn play_round(
        &mut self,
        cycle: &mut ArpeggioCycle,
        round: Vec<(StreamSource, VoiceControl)>,
    ) -> Result<()> {
        for (index, (stream, control)) in round.into_iter().enumerate() {
            match self
                .sink
                .play(SinkSource::Stream(stream), cycle.delay(index))
            {
                Ok(handle) => cycle.push_note(handle, control),
                Err(err) => {
                    if let Some(timer) = cycle.stop(&mut self.sink) {
                        self.timers.cancel(timer);
                    }
                    return Err(err);
                }
            }
        }
        Ok(())
    }

    fn schedule_round(&mut self, key: Key, due: f64) {
        let timer = self.timers.schedule(due, TimerEvent::ArpeggioRound(key));
        if let Some(KeyVoice::Arpeggio(cycle)) = self.voices.get_mut(&key) {
            cycle.set_timer(timer);
        }
    }

    fn next_round(&mut self, key: Key, due: f64) {
        let Some(KeyVoice::Arpeggio(mut cycle)) = self.voices.remove(&key) else {
            return;
        };
        cycle.prune(&self.sink);
        let started = self
            .prepare_round(&cycle)
            .and_then(|round| self.play_round(&mut cycle, round));
        match started {
            Ok(()) => {
                let next = due + cycle.period() as f64;
                self.voices.insert(key, KeyVoice::Arpeggio(cycle));
                self.schedule_round(key, next);
            }
            Err(err) => {
                cycle.stop(&mut self.sink);
                self.fail(&err);
            }
        }
    }

    /// Stop whatever `key` is playing.
    fn silence(&mut self, key: Key) {
        if let Some(old) = self.voices.remove(&key) {
            self.stop_voice(old);
        }
    }

    fn stop_voice(&mut self, voice: KeyVoice) {
        match voice {
            KeyVoice::Note(mut voice) => voice.stop(&mut self.sink),
            KeyVoice::Arpeggio(mut cycle) => {
                if let Some(timer) = cycle.stop(&mut self.sink) {
                    self.timers.cancel(timer);
                }
            }
        }
    }

    /// Release `key` immediately. Releasing a key that is not sounding does
    /// nothing.
    pub fn release(&mut self, key: Key) {
        match self.voices.remove(&key) {
            Some(KeyVoice::Note(mut voice)) => {
                if !voice.release(&mut self.sink) {
                    self.voices.insert(key, KeyVoice::Note(voice));
                }
                debug!(%key, "released");
            }
            Some(arpeggio @ KeyVoice::Arpeggio(_)) => {
                self.stop_voice(arpeggio);
                debug!(%key, "arpeggio stopped");
            }
            None => {}
        }
        self.status = String::from("ok");
    }

    /// Change one patch field. Voices already playing keep their graphs.
    pub fn set_param(&mut self, path: &str, value: &str) -> Result<()> {
        match self.patch.set_param(path, value) {
            Ok(()) => {
                self.status = format!("{path} = {value}");
                Ok(())
            }
            Err(err) => {
                self.fail(&err);
                Err(err)
            }
        }
    }

    /// Play one oscillator slot for a second, filtered like a note.
    pub fn preview(&mut self, slot: usize) -> Result<()> {
        let result = self.try_preview(slot);
        if let Err(err) = &result {
            self.fail(err);
        }
        result
    }

    fn try_preview(&mut self, slot: usize) -> Result<()> {
        let prepared = self.factory.preview(&self.patch, slot)?;
        let buffer = render(
            prepared.node,
            PREVIEW_SECONDS,
            self.factory.config().sample_width,
        )?;
        let overflow = buffer.overflow;
        self.sink.play(SinkSource::Buffer(buffer), 0.0)?;
        self.status = match overflow {
            Some(condition) => condition.to_string(),
            None => format!("playing osc {}", slot + 1),
        };
        Ok(())
    }

    pub fn all_notes_off(&mut self) {
        let voices: Vec<KeyVoice> = self.voices.drain().map(|(_, voice)| voice).collect();
        for voice in voices {
            self.stop_voice(voice);
        }
        self.timers.clear();
        self.pending_releases.clear();
        self.status = String::from("all notes off");
    }

    /// Fire due timers and forget voices the sink has finished.
    pub fn tick(&mut self, now: f64) {
        while let Some((due, event)) = self.timers.pop_due(now) {
            match event {
                TimerEvent::ConfirmRelease(key) => self.confirm_release(key),
                TimerEvent::ArpeggioRound(key) => self.next_round(key, due),
            }
        }

        let sink = &self.sink;
        let mut overflowed = None;
        self.voices.retain(|&key, voice| match voice {
            KeyVoice::Note(voice) => {
                if voice.take_overflow() {
                    overflowed = Some(key);
                }
                voice.is_playing(sink)
            }
            KeyVoice::Arpeggio(cycle) => {
                if cycle.take_overflow() {
                    overflowed = Some(key);
                }
                cycle.prune(sink);
                true
            }
        });
        if let Some(key) = overflowed {
            warn!(%key, "voice clipped");
            self.status = format!(
                "{} bit overflow! output clipped",
                self.factory.config().sample_width as u32 * 8
            );
        }
    }

    fn confirm_release(&mut self, key: Key) {
        let Some(count) = self.pending_releases.get_mut(&key) else {
            return;
        };
        *count = count.saturating_sub(1);
        if *count == 0 {
            self.pending_releases.remove(&key);
            self.release(key);
        }
    }

    fn fail(&mut self, err: &SynthError) {
        warn!(%err, "request failed");
        self.status = err.to_string();
    }

    /// Stop everything and close the sink.
    pub fn close(&mut self) {
        self.all_notes_off();
        self.sink.close();
    }
}
