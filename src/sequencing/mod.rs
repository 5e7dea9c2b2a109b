/// Chord and arpeggio note sets.
pub mod chord;
/// Pitch classes, keys and equal-tempered tuning.
pub mod notes;

pub use chord::{expand, ChordMode};
pub use notes::{note_freq, Key, Note};
