#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{Result, SynthError};

/*
Note Names and Tuning
=====================

Keys are addressed by pitch class and octave, the way a player reads them
off the keyboard: ("A", 4), ("C#", 5). Frequencies come from twelve-tone
equal temperament relative to a configurable A4 reference.

The MIDI formula: note_number = 12 * (octave + 1) + semitone
Where semitone: C=0, C#=1, D=2, D#=3, E=4, F=5, F#=6, G=7, G#=8, A=9, A#=10, B=11

    freq = a4 * 2^((note_number - 69) / 12)

So with the default A4 = 440 Hz:
    A4 → 440.00 Hz     C4 → 261.63 Hz     A5 → 880.00 Hz

Flats are accepted when parsing ("Bb" = "A#") but notes always print sharp.
*/

/// The twelve pitch classes, sharps only.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Note {
    C,
    Cs,
    D,
    Ds,
    E,
    F,
    Fs,
    G,
    Gs,
    A,
    As,
    B,
}

impl Note {
    pub const ALL: [Note; 12] = [
        Note::C,
        Note::Cs,
        Note::D,
        Note::Ds,
        Note::E,
        Note::F,
        Note::Fs,
        Note::G,
        Note::Gs,
        Note::A,
        Note::As,
        Note::B,
    ];

    /// Semitones above C.
    pub fn semitone(self) -> u8 {
        self as u8
    }

    pub fn from_semitone(semitone: u8) -> Self {
        Self::ALL[(semitone % 12) as usize]
    }

    pub fn name(self) -> &'static str {
        match self {
            Note::C => "C",
            Note::Cs => "C#",
            Note::D => "D",
            Note::Ds => "D#",
            Note::E => "E",
            Note::F => "F",
            Note::Fs => "F#",
            Note::G => "G",
            Note::Gs => "G#",
            Note::A => "A",
            Note::As => "A#",
            Note::B => "B",
        }
    }
}

impl std::fmt::Display for Note {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for Note {
    type Err = SynthError;

    fn from_str(s: &str) -> Result<Self> {
        let mut chars = s.trim().chars();
        let natural = match chars.next().map(|c| c.to_ascii_uppercase()) {
            Some('C') => 0,
            Some('D') => 2,
            Some('E') => 4,
            Some('F') => 5,
            Some('G') => 7,
            Some('A') => 9,
            Some('B') => 11,
            _ => return Err(SynthError::invalid("note", s)),
        };
        let semitone = match chars.as_str() {
            "" => natural,
            "#" | "s" => natural + 1,
            "b" => natural + 11,
            _ => return Err(SynthError::invalid("note", s)),
        };
        Ok(Note::from_semitone(semitone))
    }
}

/// A key on the keyboard: pitch class plus octave.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Key {
    pub note: Note,
    pub octave: i8,
}

impl Key {
    pub const fn new(note: Note, octave: i8) -> Self {
        Self { note, octave }
    }

    /// MIDI note number (C4 = 60, A4 = 69).
    pub fn midi(self) -> i32 {
        12 * (self.octave as i32 + 1) + self.note.semitone() as i32
    }

    pub fn from_midi(midi: i32) -> Self {
        let octave = midi.div_euclid(12) - 1;
        Self {
            note: Note::from_semitone(midi.rem_euclid(12) as u8),
            octave: octave as i8,
        }
    }

    /// The key `semitones` above this one.
    pub fn transpose(self, semitones: i32) -> Self {
        Self::from_midi(self.midi() + semitones)
    }

    pub fn frequency(self, a4: f32) -> f32 {
        note_freq(self.note, self.octave, a4)
    }
}

impl std::fmt::Display for Key {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", self.note, self.octave)
    }
}

/// Equal-tempered frequency of `note` in `octave`, relative to `a4` Hz.
pub fn note_freq(note: Note, octave: i8, a4: f32) -> f32 {
    let midi = Key::new(note, octave).midi();
    a4 * 2f32.powf((midi - 69) as f32 / 12.0)
}
