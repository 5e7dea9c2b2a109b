#[cfg(feature = "rtrb")]
use rtrb::Consumer;

use crate::sequencing::notes::Key;

/// Events the host sends to the voice scheduler.
#[derive(Debug, Clone, PartialEq)]
pub enum HostEvent {
    /// A keyboard key went down (auto-repeat included).
    KeyDown(Key),
    /// A keyboard key went up; confirmed after a short delay.
    KeyUp(Key),
    /// Release without confirmation (mouse, UI button).
    Release(Key),
    /// Play one oscillator slot on its own.
    Preview { slot: usize },
    /// Change one field of the patch, e.g. `oscillator.2.waveform = pulse`.
    SetParam { path: String, value: String },
    AllNotesOff,
}

pub trait MessageReceiver {
    fn pop(&mut self) -> Option<HostEvent>;
}

#[cfg(feature = "rtrb")]
impl MessageReceiver for Consumer<HostEvent> {
    fn pop(&mut self) -> Option<HostEvent> {
        Consumer::pop(self).ok()
    }
}

impl MessageReceiver for std::collections::VecDeque<HostEvent> {
    fn pop(&mut self) -> Option<HostEvent> {
        self.pop_front()
    }
}
